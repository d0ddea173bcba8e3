//! Configuration types for segmentation and compositing
//!
//! All stages receive an immutable [`PipelineConfig`]; nothing is read from
//! process-wide state.

use crate::error::{BgCenterError, Result};
use crate::types::CanvasSize;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default uniform per-channel bound for chroma keying
pub const DEFAULT_COLOR_THRESHOLD: u8 = 5;
/// Default mean-difference bound for boundary refinement
pub const DEFAULT_BOUNDARY_COLOR_THRESHOLD: f32 = 10.0;
/// Default boundary dilation radius in pixels
pub const DEFAULT_DILATION_RADIUS: u32 = 10;
/// Default width of the sampled border ring in pixels
pub const DEFAULT_EDGE_SAMPLE_WIDTH: u32 = 5;
/// Default fraction of the canvas left as margin
pub const DEFAULT_MARGIN_RATIO: f64 = 0.1;
/// Default per-channel floor above which a pixel counts as white
pub const DEFAULT_WHITE_THRESHOLD: u8 = 240;

/// Source of the alpha channel fed to the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// Border-sampled chroma key followed by boundary refinement
    #[default]
    Auto,
    /// Near-white pixels are keyed out
    White,
    /// An external segmentation collaborator computes the alpha
    External,
}

impl BackgroundMode {
    /// Whether this mode computes alpha locally
    #[must_use]
    pub fn is_local(self) -> bool {
        !matches!(self, Self::External)
    }
}

impl std::fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::White => write!(f, "white"),
            Self::External => write!(f, "external"),
        }
    }
}

impl std::str::FromStr for BackgroundMode {
    type Err = BgCenterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "white" => Ok(Self::White),
            // "rembg" is accepted for compatibility with existing scripts
            "external" | "rembg" => Ok(Self::External),
            other => Err(BgCenterError::invalid_config(format!(
                "Unknown background mode '{}'. Expected one of: auto, white, external",
                other
            ))),
        }
    }
}

/// How boundary refinement writes alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlphaMode {
    /// Refined pixels become fully transparent (0/255 alpha only)
    #[default]
    Binary,
    /// Refined pixels get alpha proportional to their distance from the reference
    Soft,
}

/// Immutable configuration consumed by every pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where the alpha channel comes from
    pub mode: BackgroundMode,

    /// Uniform per-channel bound for chroma keying
    pub color_threshold: u8,

    /// Mean per-channel difference bound for boundary refinement
    pub boundary_color_threshold: f32,

    /// Chebyshev radius of the boundary dilation (0 disables dilation)
    pub dilation_radius: u32,

    /// Width of the border ring sampled for the background color
    pub edge_sample_width: u32,

    /// Fraction of the canvas extent left empty on the limiting axis
    pub margin_ratio: f64,

    /// Explicit output size; source dimensions are used when absent
    pub output_size: Option<CanvasSize>,

    /// Alpha written by boundary refinement
    pub alpha_mode: AlphaMode,

    /// Per-channel floor for white keying
    pub white_threshold: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: BackgroundMode::Auto,
            color_threshold: DEFAULT_COLOR_THRESHOLD,
            boundary_color_threshold: DEFAULT_BOUNDARY_COLOR_THRESHOLD,
            dilation_radius: DEFAULT_DILATION_RADIUS,
            edge_sample_width: DEFAULT_EDGE_SAMPLE_WIDTH,
            margin_ratio: DEFAULT_MARGIN_RATIO,
            output_size: None,
            alpha_mode: AlphaMode::Binary,
            white_threshold: DEFAULT_WHITE_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// Load a configuration from a JSON file; missing keys take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BgCenterError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            BgCenterError::invalid_config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - `DimensionMismatch` when an explicit output size has a zero extent
    /// - `InvalidConfig` for out-of-range margin, threshold or sample width
    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.output_size {
            if size.width == 0 || size.height == 0 {
                return Err(BgCenterError::dimension_mismatch(format!(
                    "Output canvas must have positive extents, got {}",
                    size
                )));
            }
        }

        if !(0.0..1.0).contains(&self.margin_ratio) {
            return Err(BgCenterError::config_value_error(
                "margin_ratio",
                self.margin_ratio,
                "[0.0, 1.0)",
                Some(DEFAULT_MARGIN_RATIO),
            ));
        }

        if !self.boundary_color_threshold.is_finite() || self.boundary_color_threshold < 0.0 {
            return Err(BgCenterError::config_value_error(
                "boundary_color_threshold",
                self.boundary_color_threshold,
                "0.0-255.0",
                Some(DEFAULT_BOUNDARY_COLOR_THRESHOLD),
            ));
        }

        if self.edge_sample_width == 0 {
            return Err(BgCenterError::config_value_error(
                "edge_sample_width",
                self.edge_sample_width,
                ">= 1",
                Some(DEFAULT_EDGE_SAMPLE_WIDTH),
            ));
        }

        Ok(())
    }

    /// Canvas extents for a source image of the given dimensions
    #[must_use]
    pub fn canvas_size_for(&self, source: (u32, u32)) -> CanvasSize {
        self.output_size
            .unwrap_or_else(|| CanvasSize::new(source.0, source.1))
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    #[must_use]
    pub fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn mode(mut self, mode: BackgroundMode) -> Self {
        self.config.mode = mode;
        self
    }

    #[must_use]
    pub fn color_threshold(mut self, threshold: u8) -> Self {
        self.config.color_threshold = threshold;
        self
    }

    #[must_use]
    pub fn boundary_color_threshold(mut self, threshold: f32) -> Self {
        self.config.boundary_color_threshold = threshold;
        self
    }

    #[must_use]
    pub fn dilation_radius(mut self, radius: u32) -> Self {
        self.config.dilation_radius = radius;
        self
    }

    #[must_use]
    pub fn edge_sample_width(mut self, width: u32) -> Self {
        self.config.edge_sample_width = width;
        self
    }

    #[must_use]
    pub fn margin_ratio(mut self, ratio: f64) -> Self {
        self.config.margin_ratio = ratio;
        self
    }

    #[must_use]
    pub fn output_size(mut self, width: u32, height: u32) -> Self {
        self.config.output_size = Some(CanvasSize::new(width, height));
        self
    }

    #[must_use]
    pub fn alpha_mode(mut self, mode: AlphaMode) -> Self {
        self.config.alpha_mode = mode;
        self
    }

    #[must_use]
    pub fn white_threshold(mut self, threshold: u8) -> Self {
        self.config.white_threshold = threshold;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
