//! Progress reporting for batch runs
//!
//! The batch loop invokes the reporter after every item, success or
//! failure, so a frontend sees `completed` rise monotonically from 1 to
//! `total` with no skipped updates.

use std::sync::Arc;
use tracing::{info, warn};

/// Progress snapshot emitted after each completed item
#[derive(Debug, Clone)]
pub struct BatchProgress {
    /// Items completed so far, including failures
    pub completed: usize,
    /// Total items in the batch
    pub total: usize,
    /// Name of the item just completed
    pub current_name: String,
}

impl BatchProgress {
    /// Completed fraction in `0.0..=1.0`
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// Receives progress updates from a batch run
///
/// Implementations must be cheap; the batch loop calls them synchronously
/// between items.
pub trait ProgressReporter: Send + Sync {
    /// Called after each item completes, successfully or not
    fn item_done(&self, progress: &BatchProgress);

    /// Called additionally when the completed item failed
    fn item_failed(&self, _progress: &BatchProgress, _error: &str) {}
}

/// Reporter that ignores all updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn item_done(&self, _progress: &BatchProgress) {}
}

/// Reporter that logs progress through `tracing`
pub struct ConsoleProgressReporter;

impl ProgressReporter for ConsoleProgressReporter {
    fn item_done(&self, progress: &BatchProgress) {
        info!(
            completed = progress.completed,
            total = progress.total,
            item = %progress.current_name,
            "processed"
        );
    }

    fn item_failed(&self, progress: &BatchProgress, error: &str) {
        warn!(
            completed = progress.completed,
            total = progress.total,
            item = %progress.current_name,
            error,
            "item failed"
        );
    }
}

/// Shared reporter handle used by the batch processor
pub type SharedReporter = Arc<dyn ProgressReporter>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    pub(crate) struct RecordingReporter {
        pub updates: Mutex<Vec<(usize, usize, String)>>,
    }

    impl RecordingReporter {
        pub fn new() -> Self {
            Self {
                updates: Mutex::new(Vec::new()),
            }
        }
    }

    impl ProgressReporter for RecordingReporter {
        fn item_done(&self, progress: &BatchProgress) {
            self.updates.lock().unwrap().push((
                progress.completed,
                progress.total,
                progress.current_name.clone(),
            ));
        }
    }

    #[test]
    fn test_fraction() {
        let progress = BatchProgress {
            completed: 1,
            total: 4,
            current_name: "a.png".to_owned(),
        };
        assert!((progress.fraction() - 0.25).abs() < f64::EPSILON);

        let empty = BatchProgress {
            completed: 0,
            total: 0,
            current_name: String::new(),
        };
        assert!((empty.fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recording_reporter_collects_updates() {
        let reporter = RecordingReporter::new();
        reporter.item_done(&BatchProgress {
            completed: 1,
            total: 2,
            current_name: "x.png".to_owned(),
        });
        assert_eq!(reporter.updates.lock().unwrap().len(), 1);
    }
}
