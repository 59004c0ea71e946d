//! Ordered batch processing with partial-failure isolation
//!
//! Runs the single-image pipeline over every uploaded item in input order.
//! A failing item never stops the batch: it is recorded by name and the
//! loop moves on. After the loop the successes are PNG-encoded and packed
//! into one flat ZIP archive with deterministic, collision-free entry
//! names.

use crate::{
    error::Result,
    processor::BackgroundRemovalPipeline,
    services::{
        archive::ArchiveBuilder,
        format::file_stem,
        progress::{BatchProgress, NoOpProgressReporter, SharedReporter},
    },
    types::{ArchiveEntry, BatchOutcome, ProcessingResult, UploadedItem},
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Batch background removal runner
pub struct BatchProcessor {
    pipeline: BackgroundRemovalPipeline,
    reporter: SharedReporter,
}

impl BatchProcessor {
    /// Create a batch processor that reports no progress
    #[must_use]
    pub fn new(pipeline: BackgroundRemovalPipeline) -> Self {
        Self::with_reporter(pipeline, Arc::new(NoOpProgressReporter))
    }

    /// Create a batch processor with a progress reporter
    #[must_use]
    pub fn with_reporter(pipeline: BackgroundRemovalPipeline, reporter: SharedReporter) -> Self {
        Self { pipeline, reporter }
    }

    /// Access the wrapped pipeline
    #[must_use]
    pub fn pipeline(&self) -> &BackgroundRemovalPipeline {
        &self.pipeline
    }

    /// Process every item and package the successes into a ZIP archive
    ///
    /// Items are processed sequentially in input order; the reporter is
    /// invoked after every item. The advisory batch size limit only warns,
    /// it never rejects input.
    ///
    /// # Errors
    ///
    /// Returns `BgError` only for faults outside the per-item boundary,
    /// such as a backend that cannot be created at all. Per-item errors
    /// land in [`BatchOutcome::failed_names`].
    pub async fn process_all(&mut self, items: &[UploadedItem]) -> Result<BatchOutcome> {
        let total = items.len();
        let limit = self.pipeline.config().max_batch_size;
        if total > limit {
            warn!(
                total,
                limit, "batch exceeds the recommended size; processing anyway"
            );
        }

        // Fail fast when the removal capability is missing, before any
        // item is touched
        self.pipeline.initialize()?;

        let mut results = Vec::with_capacity(total);
        for (index, item) in items.iter().enumerate() {
            let result = self.pipeline.process_item(item).await;

            let progress = BatchProgress {
                completed: index + 1,
                total,
                current_name: item.name.clone(),
            };
            if let ProcessingResult::Failure { error, .. } = &result {
                self.reporter.item_failed(&progress, error);
            }
            self.reporter.item_done(&progress);

            results.push(result);
        }

        let outcome = Self::package(results);
        info!(
            total,
            succeeded = outcome.successes.len(),
            failed = outcome.failed_names.len(),
            "batch finished"
        );
        Ok(outcome)
    }

    /// Partition results in order and build the archive
    ///
    /// A success whose PNG encoding fails at this stage is demoted to a
    /// failure, so `successes + failed_names` always accounts for every
    /// item exactly once.
    fn package(results: Vec<ProcessingResult>) -> BatchOutcome {
        let total = results.len();
        let mut successes = Vec::new();
        let mut failed_names = Vec::new();
        let mut used_names = HashSet::new();

        for result in results {
            match result {
                ProcessingResult::Success(output) => match output.to_png_bytes() {
                    Ok(bytes) => {
                        let filename = archive_entry_name(&output.source_name, &mut used_names);
                        successes.push(ArchiveEntry { filename, bytes });
                    },
                    Err(error) => {
                        warn!(source = %output.source_name, error = %error, "encode failed");
                        failed_names.push(output.source_name);
                    },
                },
                ProcessingResult::Failure { source_name, .. } => {
                    failed_names.push(source_name);
                },
            }
        }

        // Zero successes on a non-empty batch is its own reportable
        // condition; an empty batch still gets a valid empty archive
        let archive = if successes.is_empty() && total > 0 {
            None
        } else {
            match ArchiveBuilder::build(&successes) {
                Ok(bytes) => Some(bytes),
                Err(error) => {
                    warn!(error = %error, "archive packaging failed");
                    None
                },
            }
        };

        BatchOutcome {
            successes,
            failed_names,
            archive,
        }
    }
}

/// Derive a deterministic, collision-free archive entry name
///
/// Base form is `no_bg_<stem>.png`; when two inputs share a stem (for
/// example `a.png` and `a.jpg`) later entries get `_1`, `_2` and so on,
/// assigned in input order.
fn archive_entry_name(source_name: &str, used: &mut HashSet<String>) -> String {
    let stem = file_stem(source_name);
    let base = format!("no_bg_{stem}.png");
    if used.insert(base.clone()) {
        return base;
    }

    let mut counter = 1usize;
    loop {
        let candidate = format!("no_bg_{stem}_{counter}.png");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_names_disambiguate_in_order() {
        let mut used = HashSet::new();
        assert_eq!(archive_entry_name("a.png", &mut used), "no_bg_a.png");
        assert_eq!(archive_entry_name("a.jpg", &mut used), "no_bg_a_1.png");
        assert_eq!(archive_entry_name("a.webp", &mut used), "no_bg_a_2.png");
        assert_eq!(archive_entry_name("b.png", &mut used), "no_bg_b.png");
    }

    #[test]
    fn test_entry_name_skips_taken_suffixes() {
        let mut used = HashSet::new();
        // An input literally named `a_1` claims the `_1` form first
        assert_eq!(archive_entry_name("a_1.png", &mut used), "no_bg_a_1.png");
        assert_eq!(archive_entry_name("a.png", &mut used), "no_bg_a.png");
        assert_eq!(archive_entry_name("a.jpg", &mut used), "no_bg_a_2.png");
    }

    #[test]
    fn test_package_empty_batch_yields_empty_archive() {
        let outcome = BatchProcessor::package(Vec::new());
        assert!(outcome.successes.is_empty());
        assert!(outcome.failed_names.is_empty());
        let archive = outcome.archive.expect("empty batch still gets an archive");
        let reader = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
        assert_eq!(reader.len(), 0);
    }

    #[test]
    fn test_package_all_failures_has_no_archive() {
        let results = vec![
            ProcessingResult::Failure {
                source_name: "a.png".to_owned(),
                error: "decode error".to_owned(),
            },
            ProcessingResult::Failure {
                source_name: "b.png".to_owned(),
                error: "removal error".to_owned(),
            },
        ];
        let outcome = BatchProcessor::package(results);
        assert!(outcome.archive.is_none());
        assert!(outcome.is_total_failure());
        assert_eq!(outcome.failed_names, ["a.png", "b.png"]);
    }
}
