//! Batch orchestration over an input directory
//!
//! Jobs are planned from the sorted input listing before anything runs, so
//! each file's sequence number and output name are fixed up front. Jobs are
//! then driven concurrently and their outcomes reported in planned order.

use crate::{
    error::{BgCenterError, Result},
    processor::BackgroundRemovalProcessor,
    services::ImageIOService,
    tracing_config::spans,
    types::{CompositeOutcome, ProcessingMetadata},
};
use futures::stream::{self, StreamExt};
use instant::Instant;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Name of the placeholder file kept across output directory resets
pub const GITKEEP_FILE: &str = ".gitkeep";

/// Settings for one batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Directory scanned for `.png`/`.jpg`/`.jpeg` inputs
    pub input_dir: PathBuf,
    /// Directory receiving the PNG outputs
    pub output_dir: PathBuf,
    /// Output name prefix; empty or absent keeps the sanitized input name
    pub prefix: Option<String>,
    /// Number of images in flight at once
    pub concurrency: usize,
    /// Clear the output directory before writing (keeps `.gitkeep`)
    pub reset_output_dir: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            prefix: None,
            concurrency: std::thread::available_parallelism().map_or(1, usize::from),
            reset_output_dir: true,
        }
    }
}

impl BatchOptions {
    #[must_use]
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(input_dir: P, output_dir: Q) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_reset_output_dir(mut self, reset: bool) -> Self {
        self.reset_output_dir = reset;
        self
    }
}

/// Normalize an input file name into an output base name
///
/// Drops the extension and any non-ASCII characters, turns spaces into
/// underscores and lowercases the rest. Falls back to `"image"` when
/// nothing survives.
#[must_use]
pub fn sanitize_filename(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let sanitized: String = stem
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == ' ' { '_' } else { c.to_ascii_lowercase() })
        .collect();
    if sanitized.is_empty() {
        "image".to_string()
    } else {
        sanitized
    }
}

/// Output file name for the `sequence`-th input (1-based)
#[must_use]
pub fn output_file_name(prefix: Option<&str>, sequence: usize, base_name: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}_{}_{}.png", prefix, sequence, base_name),
        _ => format!("{}.png", base_name),
    }
}

/// Supported image files directly inside `dir`, sorted by file name
pub fn discover_inputs<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| BgCenterError::file_io_error("list input directory", dir, &e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| BgCenterError::file_io_error("list input directory", dir, &e))?;
        let path = entry.path();
        if path.is_file() && ImageIOService::is_supported_format(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Check that `dir` exists and holds at least one supported image
///
/// # Errors
/// - `InvalidConfig` if the directory is missing or has no images
pub fn validate_input_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(BgCenterError::invalid_config(format!(
            "Input directory '{}' not found; create it and place the images to process there",
            dir.display()
        )));
    }
    let files = discover_inputs(dir)?;
    if files.is_empty() {
        return Err(BgCenterError::invalid_config(format!(
            "No images found in '{}' (supported: .png, .jpg, .jpeg)",
            dir.display()
        )));
    }
    Ok(files)
}

/// Create the output directory, clearing it first when `reset` is set
///
/// A `.gitkeep` file present before the reset is restored with its
/// original content.
pub fn prepare_output_dir<P: AsRef<Path>>(dir: P, reset: bool) -> Result<()> {
    let dir = dir.as_ref();
    if reset && dir.exists() {
        let gitkeep_path = dir.join(GITKEEP_FILE);
        let gitkeep = if gitkeep_path.is_file() {
            Some(
                std::fs::read(&gitkeep_path)
                    .map_err(|e| BgCenterError::file_io_error("read", &gitkeep_path, &e))?,
            )
        } else {
            None
        };

        std::fs::remove_dir_all(dir)
            .map_err(|e| BgCenterError::file_io_error("clear output directory", dir, &e))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| BgCenterError::file_io_error("create output directory", dir, &e))?;

        if let Some(content) = gitkeep {
            std::fs::write(&gitkeep_path, content)
                .map_err(|e| BgCenterError::file_io_error("restore", &gitkeep_path, &e))?;
        }
        return Ok(());
    }

    std::fs::create_dir_all(dir)
        .map_err(|e| BgCenterError::file_io_error("create output directory", dir, &e))
}

/// One planned unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    /// 1-based position in sorted input order
    pub sequence: usize,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

/// Assign sequence numbers and output paths to `inputs` in the given order
#[must_use]
pub fn plan_jobs(inputs: &[PathBuf], output_dir: &Path, prefix: Option<&str>) -> Vec<BatchJob> {
    inputs
        .iter()
        .enumerate()
        .map(|(index, input_path)| {
            let sequence = index + 1;
            let file_name = input_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let base_name = sanitize_filename(&file_name);
            BatchJob {
                sequence,
                input_path: input_path.clone(),
                output_path: output_dir.join(output_file_name(prefix, sequence, &base_name)),
            }
        })
        .collect()
}

/// Result of one job
#[derive(Debug)]
pub struct FileOutcome {
    pub job: BatchJob,
    pub result: Result<ProcessingMetadata>,
}

impl FileOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregate results of a batch run
#[derive(Debug)]
pub struct BatchSummary {
    /// Outcomes in sorted input order
    pub outcomes: Vec<FileOutcome>,
    /// Jobs never started because an earlier failure stopped the run
    pub skipped: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    #[must_use]
    pub fn processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.processed()
    }

    /// Successful files whose foreground was empty
    #[must_use]
    pub fn empty_foreground(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                o.result
                    .as_ref()
                    .is_ok_and(|m| m.outcome == CompositeOutcome::EmptyForeground)
            })
            .count()
    }

    /// Whether a failure that affects every image stopped the run early
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.skipped > 0
    }

    /// Paths written during the run
    #[must_use]
    pub fn written_paths(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.job.output_path.as_path())
            .collect()
    }
}

/// Runs a processor over every image of a directory
pub struct BatchProcessor {
    processor: Arc<BackgroundRemovalProcessor>,
    options: BatchOptions,
}

impl BatchProcessor {
    #[must_use]
    pub fn new(processor: Arc<BackgroundRemovalProcessor>, options: BatchOptions) -> Self {
        Self { processor, options }
    }

    #[must_use]
    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Validate the input directory, prepare the output directory and plan
    /// jobs for every discovered image
    ///
    /// # Errors
    /// - `InvalidConfig` for a missing or empty input directory
    /// - `Io` if the output directory cannot be prepared
    pub fn prepare(&self) -> Result<Vec<BatchJob>> {
        let inputs = validate_input_dir(&self.options.input_dir)?;
        self.prepare_with_inputs(inputs)
    }

    /// Prepare the output directory and plan jobs for an explicit input list
    ///
    /// Inputs are sorted before sequence numbers are assigned.
    pub fn prepare_with_inputs(&self, mut inputs: Vec<PathBuf>) -> Result<Vec<BatchJob>> {
        inputs.sort();
        prepare_output_dir(&self.options.output_dir, self.options.reset_output_dir)?;
        Ok(plan_jobs(
            &inputs,
            &self.options.output_dir,
            self.options.prefix.as_deref(),
        ))
    }

    /// Prepare and run the whole batch
    pub async fn run(&self) -> Result<BatchSummary> {
        let jobs = self.prepare()?;
        Ok(self.run_jobs(jobs, |_| {}).await)
    }

    /// Run planned jobs, calling `on_complete` for each outcome in planned order
    ///
    /// Per-file failures are logged and recorded without stopping the batch.
    /// An error that is not [recoverable](BgCenterError::is_recoverable)
    /// stops dispatching; jobs not yet started are counted as skipped.
    pub async fn run_jobs<F>(&self, jobs: Vec<BatchJob>, mut on_complete: F) -> BatchSummary
    where
        F: FnMut(&FileOutcome),
    {
        let start = Instant::now();
        let total = jobs.len();
        let batch_span = spans::batch_processing(total);
        let concurrency = self.options.concurrency.max(1);

        let mut results = stream::iter(jobs.into_iter().map(|job| {
            let processor = Arc::clone(&self.processor);
            let span = spans::file_processing(&job.input_path, job.sequence);
            Self::process_job(processor, job).instrument(span)
        }))
        .buffered(concurrency);

        let mut outcomes = Vec::new();
        async {
            while let Some(outcome) = results.next().await {
                Self::log_outcome(&outcome);
                on_complete(&outcome);
                let fatal = outcome.result.as_ref().is_err_and(|e| !e.is_recoverable());
                outcomes.push(outcome);
                if fatal {
                    error!(
                        "Stopping batch: the error affects every remaining image ({} not started)",
                        total - outcomes.len()
                    );
                    break;
                }
            }
        }
        .instrument(batch_span)
        .await;

        BatchSummary {
            skipped: total - outcomes.len(),
            outcomes,
            elapsed: start.elapsed(),
        }
    }

    async fn process_job(processor: Arc<BackgroundRemovalProcessor>, job: BatchJob) -> FileOutcome {
        let result = Self::process_file(processor, &job).await;
        FileOutcome { job, result }
    }

    async fn process_file(
        processor: Arc<BackgroundRemovalProcessor>,
        job: &BatchJob,
    ) -> Result<ProcessingMetadata> {
        let bytes = tokio::fs::read(&job.input_path)
            .await
            .map_err(|e| BgCenterError::file_io_error("read input image", &job.input_path, &e))?;

        let result = processor.process_bytes(bytes).await?;
        debug!("{}: {}", job.input_path.display(), result.timing_summary());
        let metadata = result.metadata.clone();

        let output_path = job.output_path.clone();
        tokio::task::spawn_blocking(move || {
            let png = result.to_png_bytes()?;
            ImageIOService::write_bytes(&output_path, &png)
        })
        .await
        .map_err(|e| BgCenterError::internal(format!("Output task failed: {}", e)))??;

        Ok(metadata)
    }

    fn log_outcome(outcome: &FileOutcome) {
        let input_name = outcome
            .job
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match &outcome.result {
            Ok(metadata) => {
                let output_name = outcome
                    .job
                    .output_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if metadata.outcome == CompositeOutcome::EmptyForeground {
                    warn!("{}: no foreground found, written unchanged", input_name);
                }
                info!("✅ Processed: {} → {}", input_name, output_name);
            },
            Err(e) => {
                error!("❌ Failed to process {}: {}", input_name, e);
            },
        }
    }
}
