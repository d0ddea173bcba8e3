//! Configuration conversion utilities for CLI arguments

use crate::backends::CommandBackendConfig;
use crate::cli::main_impl::Cli;
use crate::config::{AlphaMode, PipelineConfig, PipelineConfigBuilder};
use crate::services::BatchOptions;
use anyhow::{Context, Result};

/// Convert CLI arguments into library configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build a `PipelineConfig` from the optional config file and CLI flags
    ///
    /// Flags that were given override values from the file.
    pub(crate) fn from_cli(cli: &Cli) -> Result<PipelineConfig> {
        let base = match &cli.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        let mut builder = PipelineConfigBuilder::from_config(base);
        if let Some(mode) = cli.mode {
            builder = builder.mode(mode.into());
        }
        if let Some([width, height]) = cli.output_size.as_deref() {
            builder = builder.output_size(*width, *height);
        }
        if let Some(threshold) = cli.color_threshold {
            builder = builder.color_threshold(threshold);
        }
        if let Some(threshold) = cli.boundary_threshold {
            builder = builder.boundary_color_threshold(threshold);
        }
        if let Some(radius) = cli.dilation_radius {
            builder = builder.dilation_radius(radius);
        }
        if let Some(width) = cli.edge_sample_width {
            builder = builder.edge_sample_width(width);
        }
        if let Some(ratio) = cli.margin_ratio {
            builder = builder.margin_ratio(ratio);
        }
        if let Some(threshold) = cli.white_threshold {
            builder = builder.white_threshold(threshold);
        }
        if cli.soft_alpha {
            builder = builder.alpha_mode(AlphaMode::Soft);
        }

        builder.build().context("Invalid pipeline configuration")
    }

    /// Batch settings from CLI arguments
    pub(crate) fn batch_options(cli: &Cli) -> BatchOptions {
        let mut options = BatchOptions::new(&cli.input_dir, &cli.output_dir)
            .with_prefix(cli.prefix.clone().unwrap_or_default())
            .with_reset_output_dir(!cli.keep_output);
        if cli.jobs > 0 {
            options = options.with_concurrency(cli.jobs);
        }
        options
    }

    /// External backend settings from CLI arguments
    pub(crate) fn backend_config(cli: &Cli) -> Result<CommandBackendConfig> {
        Ok(CommandBackendConfig::from_command_line(&cli.backend_command)
            .context("Invalid --backend-command")?
            .with_timeout(cli.backend_timeout)
            .with_retries(cli.backend_retries))
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(size) = &cli.output_size {
            if size.iter().any(|&extent| extent == 0) {
                anyhow::bail!(
                    "--output-size must be positive, got {}",
                    size.iter()
                        .map(u32::to_string)
                        .collect::<Vec<_>>()
                        .join("x")
                );
            }
        }
        if cli.backend_timeout == 0 {
            anyhow::bail!("--backend-timeout must be at least 1 second");
        }
        if cli.input_dir == cli.output_dir {
            anyhow::bail!(
                "Input and output directories must differ; the output directory is cleared before processing"
            );
        }
        Ok(())
    }
}
