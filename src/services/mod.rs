//! Output and presentation services
//!
//! Encoding to the supported output formats, ZIP packaging for batch
//! downloads, and progress reporting hooks for frontends.

pub mod archive;
pub mod format;
pub mod progress;

pub use archive::{ArchiveBuilder, ARCHIVE_MIME};
pub use format::OutputEncoder;
pub use progress::{BatchProgress, ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter};
