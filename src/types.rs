//! Core value types shared by the pipeline stages

use chrono::{DateTime, Utc};
use image::RgbaImage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::BackgroundMode;
use crate::error::Result;
use crate::services::ImageIOService;
use std::path::Path;

/// Width x height grid of RGBA samples, row-major with the origin top-left
pub type PixelBuffer = RgbaImage;

/// An sRGB color used as the chroma-key reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Color of an RGBA sample, ignoring alpha
    #[must_use]
    pub fn from_rgba(pixel: &image::Rgba<u8>) -> Self {
        let [r, g, b, _] = pixel.0;
        Self { r, g, b }
    }

    /// Per-channel absolute differences to `other`
    #[must_use]
    pub fn channel_diff(&self, other: &Self) -> [u8; 3] {
        [
            self.r.abs_diff(other.r),
            self.g.abs_diff(other.g),
            self.b.abs_diff(other.b),
        ]
    }

    /// Largest per-channel difference (L-infinity distance)
    #[must_use]
    pub fn max_channel_diff(&self, other: &Self) -> u8 {
        let [dr, dg, db] = self.channel_diff(other);
        dr.max(dg).max(db)
    }

    /// Mean of the three per-channel differences
    #[must_use]
    pub fn mean_channel_diff(&self, other: &Self) -> f32 {
        let [dr, dg, db] = self.channel_diff(other);
        (f32::from(dr) + f32::from(dg) + f32::from(db)) / 3.0
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RGB({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Per-pixel "is background" grid, indexed `[[y, x]]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    data: Array2<bool>,
}

impl Mask {
    /// All-false mask of the given dimensions
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: Array2::from_elem((height as usize, width as usize), false),
        }
    }

    /// Build a mask by evaluating `f(x, y)` for every pixel
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        Self {
            data: Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
                f(x as u32, y as u32)
            }),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.data.ncols() as u32
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.data.nrows() as u32
    }

    /// Value at `(x, y)`; out-of-bounds coordinates read as `false`
    #[must_use]
    pub fn get(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        self.data
            .get((y as usize, x as usize))
            .copied()
            .unwrap_or(false)
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if let Some(cell) = self.data.get_mut((y as usize, x as usize)) {
            *cell = value;
        }
    }

    /// Logical complement
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            data: self.data.mapv(|v| !v),
        }
    }

    /// Number of set pixels
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }

    #[must_use]
    pub fn as_array(&self) -> &Array2<bool> {
        &self.data
    }

    /// Iterate `(x, y, value)` in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, bool)> + '_ {
        self.data
            .indexed_iter()
            .map(|((y, x), &v)| (x as u32, y as u32, v))
    }
}

impl From<Array2<bool>> for Mask {
    fn from(data: Array2<bool>) -> Self {
        Self { data }
    }
}

/// Minimal rectangle containing all non-transparent pixels
///
/// Half-open: `right` and `bottom` are one past the last opaque column/row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Explicit output canvas extents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// What the compositor did with a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositeOutcome {
    /// Foreground was cropped, scaled and centered on a fresh canvas
    Composited,
    /// No opaque pixels were found; the input was returned unchanged
    EmptyForeground,
}

/// Statistics reported by the local segmentation stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentationReport {
    /// Reference color used for keying (absent for white keying)
    pub background_color: Option<Color>,
    /// Pixels classified as background by the keyer
    pub background_pixels: usize,
    /// Foreground pixels adjacent to the background
    pub boundary_pixels: usize,
    /// Foreground pixels made transparent by boundary refinement
    pub refined_pixels: usize,
}

/// Per-stage timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Decoding input bytes
    pub decode_ms: u64,
    /// Local keying/refinement or the external collaborator call
    pub segmentation_ms: u64,
    /// Bounding box, crop, resize and paste
    pub composite_ms: u64,
    /// Total end-to-end processing time
    pub total_ms: u64,
}

/// Metadata describing one pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub mode: BackgroundMode,
    pub source_dimensions: (u32, u32),
    pub output_dimensions: (u32, u32),
    pub outcome: CompositeOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<SegmentationReport>,
    pub timings: ProcessingTimings,
    pub processed_at: DateTime<Utc>,
}

/// Output of one pipeline invocation
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The composited canvas (or the unchanged input for an empty foreground)
    pub image: PixelBuffer,
    pub metadata: ProcessingMetadata,
}

impl ProcessingResult {
    #[must_use]
    pub fn new(image: PixelBuffer, metadata: ProcessingMetadata) -> Self {
        Self { image, metadata }
    }

    #[must_use]
    pub fn outcome(&self) -> CompositeOutcome {
        self.metadata.outcome
    }

    /// Whether the compositor found nothing to center
    #[must_use]
    pub fn is_empty_foreground(&self) -> bool {
        self.metadata.outcome == CompositeOutcome::EmptyForeground
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode the image as PNG with its alpha channel
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        ImageIOService::encode_png(&self.image)
    }

    /// Save the image as PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        ImageIOService::write_bytes(path, &self.to_png_bytes()?)
    }

    /// One-line summary for logs
    #[must_use]
    pub fn timing_summary(&self) -> String {
        let t = &self.metadata.timings;
        format!(
            "decode {}ms, segmentation {}ms, composite {}ms, total {}ms",
            t.decode_ms, t.segmentation_ms, t.composite_ms, t.total_ms
        )
    }
}
