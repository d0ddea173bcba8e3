//! bgcenter CLI tool
//!
//! Removes the background of every image in an input directory, centers the
//! subject on a transparent canvas and writes PNGs to an output directory.

use super::config::CliConfigBuilder;
use crate::{
    backends::CommandBackend,
    config::{BackgroundMode, PipelineConfig},
    processor::BackgroundRemovalProcessor,
    services::{validate_input_dir, BatchOptions, BatchProcessor, BatchSummary, ImageIOService},
    tracing_config::{events, init_cli_tracing, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Background removal and foreground centering for product images
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgcenter")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Output file name prefix; outputs are named PREFIX_N_NAME.png when set
    #[arg(value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Directory containing the images to process
    #[arg(long, default_value = "input")]
    pub input_dir: PathBuf,

    /// Directory receiving the processed PNGs (cleared first, .gitkeep kept)
    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Background removal mode [default: auto, or the config file's mode]
    #[arg(short, long, value_enum)]
    pub mode: Option<CliMode>,

    /// Output canvas size; defaults to each source image's size
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
    pub output_size: Option<Vec<u32>>,

    /// JSON file with pipeline settings; flags override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Max per-channel difference for a pixel to count as background
    #[arg(long)]
    pub color_threshold: Option<u8>,

    /// Mean channel difference under which boundary pixels are cleared
    #[arg(long)]
    pub boundary_threshold: Option<f32>,

    /// Boundary neighborhood radius in pixels
    #[arg(long)]
    pub dilation_radius: Option<u32>,

    /// Border band width sampled for the background color
    #[arg(long)]
    pub edge_sample_width: Option<u32>,

    /// Fraction of the canvas left empty around the subject, in [0, 1)
    #[arg(long)]
    pub margin_ratio: Option<f64>,

    /// Channel floor for near-white keying (white mode)
    #[arg(long)]
    pub white_threshold: Option<u8>,

    /// Give refined boundary pixels partial alpha instead of clearing them
    #[arg(long)]
    pub soft_alpha: bool,

    /// Command used for external segmentation; reads stdin, writes stdout
    #[arg(long, value_name = "COMMAND", default_value = "rembg i - -")]
    pub backend_command: String,

    /// Timeout for one external segmentation call, in seconds
    #[arg(long, default_value_t = 120)]
    pub backend_timeout: u64,

    /// Retries after a failed external segmentation call
    #[arg(long, default_value_t = 1)]
    pub backend_retries: u32,

    /// Number of images processed concurrently (0 = number of CPUs)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Keep existing files in the output directory
    #[arg(long)]
    pub keep_output: bool,

    /// Process the input directory recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Only process files matching this pattern (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Console)]
    pub log_format: LogFormat,
}

/// Log output format as accepted on the command line
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum LogFormat {
    /// Colored human-readable lines
    Console,
    /// Plain lines without colors, for CI logs
    Compact,
    /// One JSON object per event
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<LogFormat> for TracingFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Console => Self::Console,
            LogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            LogFormat::Json => Self::Json,
        }
    }
}

/// Background removal mode as accepted on the command line
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliMode {
    /// Sample the border color and key it out
    Auto,
    /// Key out near-white pixels
    White,
    /// Delegate to an external segmentation command
    #[value(alias = "rembg")]
    External,
}

impl From<CliMode> for BackgroundMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Auto => Self::Auto,
            CliMode::White => Self::White,
            CliMode::External => Self::External,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let options = CliConfigBuilder::batch_options(&cli);

    log_settings(&options, &config);

    let processor =
        Arc::new(create_processor(&cli, config.clone()).context("Failed to create processor")?);

    let inputs = collect_inputs(&cli)?;
    info!("Found {} image(s) to process", inputs.len());

    let batch = BatchProcessor::new(processor, options);
    let jobs = batch
        .prepare_with_inputs(inputs)
        .context("Failed to prepare output directory")?;

    let progress = if jobs.len() > 1 {
        let pb = ProgressBar::new(jobs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let summary = batch
        .run_jobs(jobs, |outcome| {
            if let Some(pb) = &progress {
                pb.set_message(outcome.job.input_path.display().to_string());
                pb.inc(1);
            }
        })
        .await;

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Completed! Processed: {}, Failed: {}",
            summary.processed(),
            summary.failed()
        ));
    }

    log_summary(&summary, batch.options(), &config);

    if summary.is_aborted() {
        anyhow::bail!(
            "Batch stopped early; {} image(s) were not processed",
            summary.skipped
        );
    }
    if summary.processed() == 0 {
        anyhow::bail!("No processable images were found");
    }
    Ok(())
}

fn create_processor(cli: &Cli, config: PipelineConfig) -> Result<BackgroundRemovalProcessor> {
    if config.mode == BackgroundMode::External {
        let backend_config = CliConfigBuilder::backend_config(cli)?;
        info!(
            "External backend: {} {}",
            backend_config.program,
            backend_config.args.join(" ")
        );
        let backend = Arc::new(CommandBackend::new(backend_config));
        return Ok(BackgroundRemovalProcessor::with_backend(config, backend)?);
    }
    Ok(BackgroundRemovalProcessor::new(config)?)
}

/// Inputs for the run, sorted
fn collect_inputs(cli: &Cli) -> Result<Vec<PathBuf>> {
    if !cli.recursive && cli.pattern.is_none() {
        return Ok(validate_input_dir(&cli.input_dir)?);
    }

    if !cli.input_dir.is_dir() {
        anyhow::bail!(
            "Input directory '{}' not found; create it and place the images to process there",
            cli.input_dir.display()
        );
    }
    let mut files = find_image_files(&cli.input_dir, cli.recursive, cli.pattern.as_deref())?;
    if files.is_empty() {
        anyhow::bail!(
            "No matching images found in '{}' (supported: .png, .jpg, .jpeg)",
            cli.input_dir.display()
        );
    }
    files.sort();
    Ok(files)
}

/// Find supported image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            if entry.file_type().is_file() {
                let path = entry.path();
                if ImageIOService::is_supported_format(path) && matches_pattern(path, pattern) {
                    files.push(path.to_path_buf());
                }
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if ImageIOService::is_supported_format(&path) && matches_pattern(&path, pattern) {
                    files.push(path);
                }
            }
        }
    }

    Ok(files)
}

/// Check if the file name matches the given glob pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}

fn describe_output_size(config: &PipelineConfig) -> String {
    config
        .output_size
        .map_or_else(|| "source image size".to_string(), |size| size.to_string())
}

fn log_settings(options: &BatchOptions, config: &PipelineConfig) {
    info!("=== Settings ===");
    info!("Input directory: {}", options.input_dir.display());
    info!("Output directory: {}", options.output_dir.display());
    info!("Mode: {}", config.mode);
    info!("Prefix: {}", options.prefix.as_deref().unwrap_or("(none)"));
    info!("Output size: {}", describe_output_size(config));
    debug!(
        color_threshold = config.color_threshold,
        boundary_color_threshold = config.boundary_color_threshold,
        dilation_radius = config.dilation_radius,
        edge_sample_width = config.edge_sample_width,
        margin_ratio = config.margin_ratio,
        concurrency = options.concurrency,
        "Pipeline settings"
    );
}

fn log_summary(summary: &BatchSummary, options: &BatchOptions, config: &PipelineConfig) {
    let output_dir = std::fs::canonicalize(&options.output_dir)
        .unwrap_or_else(|_| options.output_dir.clone());
    let elapsed = summary.elapsed.as_secs_f64();
    let processed = summary.processed();

    info!("📊 Batch processing summary:");
    info!("  ├─ Files processed: {}", processed);
    info!("  ├─ Files failed: {}", summary.failed());
    if summary.skipped > 0 {
        info!("  ├─ Files skipped: {}", summary.skipped);
    }
    if summary.empty_foreground() > 0 {
        info!("  ├─ Empty foreground: {}", summary.empty_foreground());
    }
    info!("  ├─ Output: {}", output_dir.display());
    info!("  ├─ Mode: {}", config.mode);
    info!("  ├─ Output size: {}", describe_output_size(config));
    info!("  ├─ Total time: {:.2}s", elapsed);
    info!(
        "  └─ Average per file: {:.2}s",
        if processed > 0 {
            elapsed / processed as f64
        } else {
            0.0
        }
    );

    if summary.failed() > 0 {
        warn!(
            "Some files failed to process. Processed: {}, Failed: {}",
            processed,
            summary.failed()
        );
        if config.mode == BackgroundMode::External {
            events::warning_with_recommendation(
                "External segmentation failed for some files",
                "check that the backend command is installed or raise --backend-timeout",
            );
        }
    }
}
