//! Conversion from CLI arguments to the pipeline configuration

use super::main_impl::{Cli, CliOutputFormat};
use crate::config::{BackgroundColor, ModelId, OutputFormat, PipelineConfig};
use anyhow::{Context, Result};
use std::time::Duration;

/// Builds a [`PipelineConfig`] from parsed CLI arguments
pub struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Validate CLI arguments before any processing starts
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid argument.
    pub fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.jpeg_quality > 100 {
            anyhow::bail!("JPEG quality must be 0-100, got {}", cli.jpeg_quality);
        }
        if cli.webp_quality > 100 {
            anyhow::bail!("WebP quality must be 0-100, got {}", cli.webp_quality);
        }
        if cli.timeout == Some(0) {
            anyhow::bail!("--timeout must be at least 1 second");
        }
        cli.bg_color
            .parse::<BackgroundColor>()
            .with_context(|| format!("invalid background color '{}'", cli.bg_color))?;
        Ok(())
    }

    /// Convert CLI arguments to the unified pipeline configuration
    ///
    /// # Errors
    ///
    /// Returns an error when an argument cannot be parsed or the resulting
    /// configuration is invalid.
    pub fn from_cli(cli: &Cli) -> Result<PipelineConfig> {
        let model: ModelId = cli
            .model
            .parse()
            .with_context(|| format!("unknown model '{}'", cli.model))?;
        let background_color: BackgroundColor = cli
            .bg_color
            .parse()
            .with_context(|| format!("invalid background color '{}'", cli.bg_color))?;

        let mut builder = PipelineConfig::builder()
            .model(model)
            .background_color(background_color)
            .jpeg_quality(cli.jpeg_quality)
            .webp_quality(cli.webp_quality)
            .post_process_mask(!cli.no_post_process);

        if let Some(path) = &cli.model_path {
            builder = builder.model_path(path.clone());
        }
        if let Some(seconds) = cli.timeout {
            builder = builder.item_timeout(Duration::from_secs(seconds));
        }

        builder.build().context("invalid pipeline configuration")
    }
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Jpeg => Self::Jpeg,
            CliOutputFormat::Webp => Self::WebP,
        }
    }
}
