//! ZIP packaging for batch downloads

use crate::{
    error::{BgError, Result},
    types::ArchiveEntry,
};
use std::io::{Cursor, Write};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// MIME type of the produced archive
pub const ARCHIVE_MIME: &str = "application/zip";

/// Builds the flat ZIP archive of batch results
pub struct ArchiveBuilder;

impl ArchiveBuilder {
    /// Build a ZIP archive from the given entries, in order
    ///
    /// Entry names are already collision-free when they arrive here (the
    /// batch loop derives them); the builder writes them as a flat file
    /// list with no directories. An empty slice produces a valid empty
    /// archive.
    ///
    /// # Errors
    ///
    /// Returns `BgError::Encode` when an entry cannot be written.
    pub fn build(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in entries {
            writer
                .start_file(&entry.filename, options)
                .map_err(|e| BgError::encode(format!("zip entry '{}': {e}", entry.filename)))?;
            writer
                .write_all(&entry.bytes)
                .map_err(|e| BgError::encode(format!("zip entry '{}': {e}", entry.filename)))?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| BgError::encode(format!("finalizing zip archive: {e}")))?;
        Ok(cursor.into_inner())
    }
}
