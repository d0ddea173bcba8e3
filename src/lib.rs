#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # bgcenter
//!
//! Background removal and foreground centering for product-style images.
//!
//! Each image goes through two phases:
//!
//! 1. **Segmentation** produces an alpha channel. Locally, the dominant
//!    border color is sampled, pixels close to it are keyed out and the
//!    foreground rim is cleaned of color fringing. Alternatively an
//!    external collaborator (such as `rembg`) computes the alpha.
//! 2. **Compositing** finds the bounding box of the opaque pixels, scales
//!    it to fill the canvas minus a margin and centers it on a transparent
//!    canvas.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgcenter::{center_foreground_from_bytes, PipelineConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::builder()
//!     .output_size(800, 800)
//!     .margin_ratio(0.1)
//!     .build()?;
//!
//! let bytes = tokio::fs::read("input/shoe.jpg").await?;
//! let result = center_foreground_from_bytes(bytes, &config).await?;
//! if result.is_empty_foreground() {
//!     eprintln!("nothing to center");
//! }
//! result.save_png("output/shoe.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Batch Processing
//!
//! ```rust,no_run
//! use bgcenter::{BackgroundRemovalProcessor, BatchOptions, BatchProcessor, PipelineConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let processor = Arc::new(BackgroundRemovalProcessor::new(PipelineConfig::default())?);
//! let options = BatchOptions::new("input", "output").with_prefix("item");
//! let summary = BatchProcessor::new(processor, options).run().await?;
//! println!("{} processed, {} failed", summary.processed(), summary.failed());
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface, progress bar and tracing
//!   subscriber setup
//! - `tracing-json`: JSON log output for the CLI (`--log-format json`)
//! - `test-utils`: scripted `MockBackend` for tests

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod processor;
pub mod segmentation;
pub mod services;
pub mod tracing_config;
pub mod types;

use std::sync::Arc;
use tokio::io::AsyncRead;

// Public API exports
#[cfg(any(test, feature = "test-utils"))]
pub use backends::MockBackend;
pub use backends::{CommandBackend, CommandBackendConfig, SegmentationBackend};
pub use compositor::{Composite, ForegroundCompositor};
pub use config::{AlphaMode, BackgroundMode, PipelineConfig, PipelineConfigBuilder};
pub use error::{BgCenterError, Result};
pub use processor::BackgroundRemovalProcessor;
pub use segmentation::{
    BackgroundColorSampler, BoundaryRefiner, ChromaKeyMasker, LocalSegmenter, RefinementParams,
    RefinementStats,
};
pub use services::{BatchOptions, BatchProcessor, BatchSummary, FileOutcome, ImageIOService};
pub use types::{
    BoundingBox, CanvasSize, Color, CompositeOutcome, Mask, PixelBuffer, ProcessingMetadata,
    ProcessingResult, ProcessingTimings, SegmentationReport,
};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
pub use tracing_config::{events, spans, TracingConfig, TracingFormat};

/// Segment and center an image provided as encoded bytes
///
/// Only the local modes are available here; use
/// [`center_foreground_with_backend`] for `External` mode.
///
/// # Errors
/// - `InvalidConfig` for `External` mode or an invalid configuration
/// - `Decode` if the bytes are not a decodable image
pub async fn center_foreground_from_bytes(
    image_bytes: Vec<u8>,
    config: &PipelineConfig,
) -> Result<ProcessingResult> {
    let processor = Arc::new(BackgroundRemovalProcessor::new(config.clone())?);
    processor.process_bytes(image_bytes).await
}

/// Segment and center an already decoded buffer
///
/// Runs on the calling thread.
pub fn center_foreground_from_image(
    image: PixelBuffer,
    config: &PipelineConfig,
) -> Result<ProcessingResult> {
    BackgroundRemovalProcessor::new(config.clone())?.process_image(image)
}

/// Segment through an external backend and center the result
///
/// The backend is only consulted when `config.mode` is `External`.
pub async fn center_foreground_with_backend(
    image_bytes: Vec<u8>,
    config: &PipelineConfig,
    backend: Arc<dyn SegmentationBackend>,
) -> Result<ProcessingResult> {
    let processor = Arc::new(BackgroundRemovalProcessor::with_backend(
        config.clone(),
        backend,
    )?);
    processor.process_bytes(image_bytes).await
}

/// Segment and center an image read from an async stream
pub async fn center_foreground_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    config: &PipelineConfig,
) -> Result<ProcessingResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer)
        .await
        .map_err(|e| BgCenterError::processing(format!("Failed to read from stream: {}", e)))?;

    center_foreground_from_bytes(buffer, config).await
}
