//! Unified background removal processor
//!
//! `BackgroundRemovalProcessor` runs one image through segmentation (local
//! keying or an external backend) and then the compositor. It is shared
//! read-only between concurrent tasks, so every method takes `&self`.

use crate::{
    backends::SegmentationBackend,
    compositor::ForegroundCompositor,
    config::{BackgroundMode, PipelineConfig},
    error::{BgCenterError, Result},
    segmentation::LocalSegmenter,
    services::ImageIOService,
    tracing_config::{events, spans},
    types::{PixelBuffer, ProcessingMetadata, ProcessingResult, ProcessingTimings},
};
use chrono::Utc;
use instant::Instant;
use log::{debug, info};
use std::sync::Arc;
use tracing::{debug as trace_debug, instrument, Instrument};

/// Processor that owns the pipeline configuration and optional backend
pub struct BackgroundRemovalProcessor {
    config: PipelineConfig,
    backend: Option<Arc<dyn SegmentationBackend>>,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("config", &self.config)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

impl BackgroundRemovalProcessor {
    /// Create a processor for the local modes
    ///
    /// # Errors
    ///
    /// Returns `BgCenterError` for:
    /// - Configuration validation failures
    /// - `External` mode, which needs [`Self::with_backend`]
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        if !config.mode.is_local() {
            return Err(BgCenterError::invalid_config(
                "External mode requires a segmentation backend",
            ));
        }
        Ok(Self {
            config,
            backend: None,
        })
    }

    /// Create a processor that delegates segmentation to `backend` in
    /// `External` mode
    ///
    /// # Errors
    /// - Configuration validation failures
    pub fn with_backend(
        config: PipelineConfig,
        backend: Arc<dyn SegmentationBackend>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend: Some(backend),
        })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Name of the attached backend, if any
    #[must_use]
    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_deref().map(|backend| backend.name())
    }

    /// Process a decoded buffer
    ///
    /// Local modes key and refine the buffer before compositing. In
    /// `External` mode the buffer's alpha is taken as already computed and
    /// only the compositor runs.
    ///
    /// # Errors
    /// - `DimensionMismatch` for an unusable canvas
    /// - `InvalidConfig` for an out-of-range margin
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn process_image(&self, mut image: PixelBuffer) -> Result<ProcessingResult> {
        let total_start = Instant::now();
        let source_dimensions = image.dimensions();

        let segmentation_start = Instant::now();
        let segmentation = if self.config.mode.is_local() {
            Some(LocalSegmenter::segment(&mut image, &self.config)?)
        } else {
            None
        };
        let segmentation_ms = segmentation_start.elapsed().as_millis() as u64;

        let mut result = self.composite(image, source_dimensions, total_start)?;
        result.metadata.segmentation = segmentation;
        result.metadata.timings.segmentation_ms = segmentation_ms;
        Ok(result)
    }

    /// Decode `bytes` and process them with the local stages
    ///
    /// # Errors
    /// - `Decode` if the bytes are not a decodable image
    /// - Any error from [`Self::process_image`]
    pub fn process_bytes_local(&self, bytes: &[u8]) -> Result<ProcessingResult> {
        let decode_start = Instant::now();
        let image = ImageIOService::load_from_bytes(bytes)?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(image)?;
        result.metadata.timings.decode_ms = decode_ms;
        result.metadata.timings.total_ms += decode_ms;
        Ok(result)
    }

    /// Decode a backend's output and composite it without local keying
    ///
    /// # Errors
    /// - `Decode` if the backend returned undecodable bytes
    pub fn process_segmented_bytes(
        &self,
        bytes: &[u8],
        backend_ms: u64,
    ) -> Result<ProcessingResult> {
        let total_start = Instant::now();
        let image = ImageIOService::load_from_bytes(bytes).map_err(|e| {
            BgCenterError::decode(format!("Backend returned an undecodable image: {}", e))
        })?;
        let decode_ms = total_start.elapsed().as_millis() as u64;
        let source_dimensions = image.dimensions();

        let mut result = self.composite(image, source_dimensions, total_start)?;
        result.metadata.timings.decode_ms = decode_ms;
        result.metadata.timings.segmentation_ms = backend_ms;
        result.metadata.timings.total_ms += backend_ms;
        Ok(result)
    }

    /// Process encoded bytes end to end, off the async executor
    ///
    /// CPU-bound stages run on the blocking pool. In `External` mode the
    /// backend is awaited first and its output composited.
    ///
    /// # Errors
    /// - `Backend` if the collaborator fails
    /// - `Decode` for undecodable input or backend output
    /// - `Internal` if a blocking task panics
    pub async fn process_bytes(self: Arc<Self>, bytes: Vec<u8>) -> Result<ProcessingResult> {
        match (self.config.mode, self.backend.clone()) {
            (BackgroundMode::External, Some(backend)) => {
                let backend_start = Instant::now();
                let segmented = backend
                    .remove_background(&bytes)
                    .instrument(spans::backend_call(backend.name(), bytes.len()))
                    .await?;
                let backend_ms = backend_start.elapsed().as_millis() as u64;
                trace_debug!(
                    backend = backend.name(),
                    backend_ms,
                    output_bytes = segmented.len(),
                    "Backend segmentation finished"
                );
                tokio::task::spawn_blocking(move || {
                    self.process_segmented_bytes(&segmented, backend_ms)
                })
                .await
                .map_err(|e| BgCenterError::internal(format!("Compositing task failed: {}", e)))?
            },
            (BackgroundMode::External, None) => Err(BgCenterError::invalid_config(
                "External mode requires a segmentation backend",
            )),
            _ => tokio::task::spawn_blocking(move || self.process_bytes_local(&bytes))
                .await
                .map_err(|e| BgCenterError::internal(format!("Processing task failed: {}", e)))?,
        }
    }

    fn composite(
        &self,
        image: PixelBuffer,
        source_dimensions: (u32, u32),
        total_start: Instant,
    ) -> Result<ProcessingResult> {
        let composite_start = Instant::now();
        let canvas = self.config.canvas_size_for(image.dimensions());
        let composite =
            ForegroundCompositor::composite(image, Some(canvas), self.config.margin_ratio)?;
        let composite_ms = composite_start.elapsed().as_millis() as u64;
        events::performance_metric("compositing", composite_ms);
        let output_dimensions = composite.image.dimensions();

        if let Some(bbox) = composite.bounding_box {
            debug!(
                "Foreground {} centered on {}x{} canvas",
                bbox, output_dimensions.0, output_dimensions.1
            );
        }

        let timings = ProcessingTimings {
            decode_ms: 0,
            segmentation_ms: 0,
            composite_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
        };
        let metadata = ProcessingMetadata {
            mode: self.config.mode,
            source_dimensions,
            output_dimensions,
            outcome: composite.outcome,
            bounding_box: composite.bounding_box,
            segmentation: None,
            timings,
            processed_at: Utc::now(),
        };
        info!(
            "Processed {}x{} -> {}x{} ({:?})",
            source_dimensions.0,
            source_dimensions.1,
            output_dimensions.0,
            output_dimensions.1,
            metadata.outcome
        );

        Ok(ProcessingResult::new(composite.image, metadata))
    }
}
