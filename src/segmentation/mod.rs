//! Local segmentation: background color sampling, chroma keying and
//! boundary refinement
//!
//! These stages turn a decoded RGBA buffer into one with a binary alpha
//! channel, in place. They are pure pixel transforms and never fail on a
//! well-formed buffer.

pub mod boundary;
pub mod chroma_key;
pub mod sampler;

pub use boundary::{BoundaryRefiner, RefinementParams, RefinementStats};
pub use chroma_key::ChromaKeyMasker;
pub use sampler::BackgroundColorSampler;

use crate::config::{BackgroundMode, PipelineConfig};
use crate::error::{BgCenterError, Result};
use crate::types::{PixelBuffer, SegmentationReport};
use log::debug;
use tracing::instrument;

/// Runs the local keying stages selected by the configured mode
pub struct LocalSegmenter;

impl LocalSegmenter {
    /// Compute alpha for `image` in place
    ///
    /// # Errors
    /// - `InvalidConfig` if the mode requires the external collaborator
    #[instrument(skip_all, fields(mode = %config.mode, width = image.width(), height = image.height()))]
    pub fn segment(image: &mut PixelBuffer, config: &PipelineConfig) -> Result<SegmentationReport> {
        match config.mode {
            BackgroundMode::Auto => Ok(Self::segment_auto(image, config)),
            BackgroundMode::White => Ok(Self::segment_white(image, config)),
            BackgroundMode::External => Err(BgCenterError::invalid_config(
                "External mode has no local segmentation; use a SegmentationBackend",
            )),
        }
    }

    fn segment_auto(image: &mut PixelBuffer, config: &PipelineConfig) -> SegmentationReport {
        let Some(reference) = BackgroundColorSampler::sample(image, config.edge_sample_width)
        else {
            return SegmentationReport::default();
        };
        log::info!("Detected background color: {}", reference);

        let background = ChromaKeyMasker::key(image, reference, config.color_threshold);
        let background_pixels = background.count();
        debug!(
            "Chroma key classified {} of {} pixels as background",
            background_pixels,
            image.width() as usize * image.height() as usize
        );

        let stats = BoundaryRefiner::refine(
            image,
            &background,
            &RefinementParams {
                reference,
                boundary_color_threshold: config.boundary_color_threshold,
                dilation_radius: config.dilation_radius,
                alpha_mode: config.alpha_mode,
            },
        );
        debug!(
            "Boundary refinement: {} boundary pixels, {} refined",
            stats.boundary_pixels, stats.refined_pixels
        );

        SegmentationReport {
            background_color: Some(reference),
            background_pixels,
            boundary_pixels: stats.boundary_pixels,
            refined_pixels: stats.refined_pixels,
        }
    }

    fn segment_white(image: &mut PixelBuffer, config: &PipelineConfig) -> SegmentationReport {
        let background = ChromaKeyMasker::white_mask(image, config.white_threshold);
        ChromaKeyMasker::apply(image, &background);
        let background_pixels = background.count();
        debug!("White key classified {} pixels as background", background_pixels);

        SegmentationReport {
            background_color: None,
            background_pixels,
            ..SegmentationReport::default()
        }
    }
}
