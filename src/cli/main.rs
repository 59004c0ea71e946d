//! Batch background removal CLI
//!
//! Single inputs produce one output file in the chosen format; multiple
//! inputs (or `--zip`) run the batch pipeline and write one ZIP archive of
//! PNG results.

use super::config::CliConfigBuilder;
use crate::{
    batch::BatchProcessor,
    config::OutputFormat,
    processor::BackgroundRemovalPipeline,
    services::{
        format::OutputEncoder,
        progress::{BatchProgress, ProgressReporter},
    },
    tracing_config::TracingConfig,
    types::UploadedItem,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Name of the archive written for batch runs
const ARCHIVE_FILE_NAME: &str = "no_bg_images.zip";

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Background removal CLI tool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "nobg")]
pub struct Cli {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<String>,

    /// Output file (single input) or directory (batch processing)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format for single-image results
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// Segmentation model (u2net, u2netp, u2net_human_seg, u2net_cloth_seg)
    #[arg(short, long, default_value = "u2net")]
    pub model: String,

    /// Path to the model weights file or directory
    #[arg(long, value_name = "PATH")]
    pub model_path: Option<PathBuf>,

    /// Background color for JPEG output (#RRGGBB)
    #[arg(long, default_value = "#FFFFFF")]
    pub bg_color: String,

    /// JPEG quality (0-100)
    #[arg(long, default_value_t = 95)]
    pub jpeg_quality: u8,

    /// WebP quality (0-100)
    #[arg(long, default_value_t = 95)]
    pub webp_quality: u8,

    /// Disable mask smoothing after inference
    #[arg(long)]
    pub no_post_process: bool,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Always package results as a ZIP archive, even for a single input
    #[arg(long)]
    pub zip: bool,

    /// Per-image timeout in seconds; a timed-out image counts as failed
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Output format choices exposed on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliOutputFormat {
    /// PNG with transparency
    Png,
    /// JPEG composited onto the background color
    Jpeg,
    /// WebP with transparency
    Webp,
}

/// CLI entry point
///
/// # Errors
///
/// Returns an error for invalid arguments, a missing removal capability,
/// or a batch in which no image succeeded.
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .init()
        .context("failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("invalid arguments")?;
    let config = CliConfigBuilder::from_cli(&cli)?;

    let files = collect_input_files(&cli)?;
    if files.is_empty() {
        anyhow::bail!("no supported image files found in the provided inputs");
    }
    info!(count = files.len(), "found input image(s)");

    // A missing removal capability is fatal here, before any image is read
    let mut pipeline = BackgroundRemovalPipeline::new(config)?;
    pipeline
        .initialize()
        .context("background removal capability unavailable")?;

    let start = Instant::now();
    if files.len() == 1 && !cli.zip {
        process_single(&cli, pipeline, &files[0]).await?;
    } else {
        process_batch(&cli, pipeline, &files).await?;
    }
    info!(elapsed_s = start.elapsed().as_secs_f64(), "done");
    Ok(())
}

/// Collect input files from file and directory arguments, sorted for a
/// deterministic processing order
fn collect_input_files(cli: &Cli) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in &cli.input {
        let path = PathBuf::from(input);
        if path.is_file() {
            if is_image_file(&path) {
                files.push(path);
            } else {
                warn!(path = %path.display(), "skipping unsupported file");
            }
        } else if path.is_dir() {
            files.extend(find_image_files(&path, cli.recursive)?);
        } else {
            anyhow::bail!("input path does not exist: {}", path.display());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

fn find_image_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            if entry.file_type().is_file() && is_image_file(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file() && is_image_file(&path) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

async fn process_single(
    cli: &Cli,
    mut pipeline: BackgroundRemovalPipeline,
    path: &Path,
) -> Result<()> {
    let item = UploadedItem::from_file(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let output = pipeline
        .remove(&item)
        .await
        .with_context(|| format!("failed to process {}", path.display()))?;

    let format: OutputFormat = cli.format.into();
    let bytes = output.to_bytes(format, pipeline.config())?;
    let out_path = single_output_path(cli, &item.name, format);
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&out_path, bytes)
        .with_context(|| format!("failed to write {}", out_path.display()))?;

    info!(
        output = %out_path.display(),
        inference_ms = output.timings.inference_ms,
        "image written"
    );
    println!("{}", out_path.display());
    Ok(())
}

/// Resolve where a single-image result goes
///
/// An explicit `--output` that is not an existing directory is taken as the
/// full file path; otherwise the derived download name lands in the output
/// directory (or the current one).
fn single_output_path(cli: &Cli, source_name: &str, format: OutputFormat) -> PathBuf {
    let derived = OutputEncoder::output_file_name(source_name, format);
    match &cli.output {
        Some(output) => {
            let path = PathBuf::from(output);
            if path.is_dir() {
                path.join(derived)
            } else {
                path
            }
        },
        None => PathBuf::from(derived),
    }
}

async fn process_batch(
    cli: &Cli,
    pipeline: BackgroundRemovalPipeline,
    files: &[PathBuf],
) -> Result<()> {
    let mut items = Vec::with_capacity(files.len());
    for path in files {
        let item = UploadedItem::from_file(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        items.push(item);
    }

    let reporter = Arc::new(IndicatifReporter::new(items.len()));
    let mut batch = BatchProcessor::with_reporter(pipeline, reporter.clone());
    let outcome = batch.process_all(&items).await?;
    reporter.finish();

    for name in &outcome.failed_names {
        eprintln!("failed: {name}");
    }
    if outcome.is_total_failure() {
        anyhow::bail!(
            "no image could be processed ({} failed)",
            outcome.failed_names.len()
        );
    }

    let archive = outcome
        .archive
        .context("batch produced no archive")?;
    let archive_path = match &cli.output {
        Some(output) => {
            let path = PathBuf::from(output);
            if path.extension().is_some() && !path.is_dir() {
                path
            } else {
                std::fs::create_dir_all(&path)?;
                path.join(ARCHIVE_FILE_NAME)
            }
        },
        None => PathBuf::from(ARCHIVE_FILE_NAME),
    };
    std::fs::write(&archive_path, archive)
        .with_context(|| format!("failed to write {}", archive_path.display()))?;

    info!(
        archive = %archive_path.display(),
        succeeded = outcome.successes.len(),
        failed = outcome.failed_names.len(),
        "archive written"
    );
    println!("{}", archive_path.display());
    Ok(())
}

/// Progress reporter backed by an indicatif bar
struct IndicatifReporter {
    bar: ProgressBar,
}

impl IndicatifReporter {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for IndicatifReporter {
    fn item_done(&self, progress: &BatchProgress) {
        self.bar.set_message(progress.current_name.clone());
        self.bar.set_position(progress.completed as u64);
    }

    fn item_failed(&self, progress: &BatchProgress, error: &str) {
        self.bar
            .println(format!("failed: {} ({error})", progress.current_name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a.PNG")));
        assert!(is_image_file(Path::new("dir/b.jpeg")));
        assert!(!is_image_file(Path::new("c.gif")));
        assert!(!is_image_file(Path::new("noext")));
    }

    #[test]
    fn test_single_output_path_derivation() {
        let cli = Cli::try_parse_from(["nobg", "in.jpg"]).unwrap();
        assert_eq!(
            single_output_path(&cli, "in.jpg", OutputFormat::Png),
            PathBuf::from("no_bg_in.png")
        );

        let cli = Cli::try_parse_from(["nobg", "in.jpg", "-o", "out/result.jpg"]).unwrap();
        assert_eq!(
            single_output_path(&cli, "in.jpg", OutputFormat::Jpeg),
            PathBuf::from("out/result.jpg")
        );
    }
}
