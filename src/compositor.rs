//! Foreground compositing: crop to the subject, scale to fit, center on a
//! transparent canvas

use crate::error::{BgCenterError, Result};
use crate::types::{BoundingBox, CanvasSize, CompositeOutcome, PixelBuffer};
use image::imageops::{self, FilterType};
use log::warn;
use tracing::{debug, instrument};

/// Result of compositing one buffer
#[derive(Debug, Clone)]
pub struct Composite {
    /// The new canvas, or the untouched input for an empty foreground
    pub image: PixelBuffer,
    pub outcome: CompositeOutcome,
    pub bounding_box: Option<BoundingBox>,
}

/// Crops, scales and centers the non-transparent part of a buffer
pub struct ForegroundCompositor;

impl ForegroundCompositor {
    /// Minimal half-open rectangle containing every pixel with nonzero alpha
    #[must_use]
    pub fn bounding_box(image: &PixelBuffer) -> Option<BoundingBox> {
        let mut bbox: Option<BoundingBox> = None;
        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel.0[3] == 0 {
                continue;
            }
            bbox = Some(match bbox {
                None => BoundingBox::new(x, y, x + 1, y + 1),
                Some(b) => BoundingBox::new(
                    b.left.min(x),
                    b.top.min(y),
                    b.right.max(x + 1),
                    b.bottom.max(y + 1),
                ),
            });
        }
        bbox
    }

    /// Uniform scale that fits a `foreground` of the given size inside the
    /// canvas, leaving `margin_ratio` of the limiting axis empty
    #[must_use]
    pub fn scale_factor(canvas: CanvasSize, foreground: (u32, u32), margin_ratio: f64) -> f64 {
        let target_ratio = 1.0 - margin_ratio;
        let scale_w = f64::from(canvas.width) * target_ratio / f64::from(foreground.0);
        let scale_h = f64::from(canvas.height) * target_ratio / f64::from(foreground.1);
        scale_w.min(scale_h)
    }

    /// Integer size of the scaled foreground, truncated
    ///
    /// Each side is clamped to at least 1 pixel, so a subject thinner than
    /// `1 / scale` on one axis gets a slightly distorted aspect ratio instead
    /// of vanishing.
    #[must_use]
    pub fn scaled_dimensions(
        canvas: CanvasSize,
        foreground: (u32, u32),
        margin_ratio: f64,
    ) -> (u32, u32) {
        let scale = Self::scale_factor(canvas, foreground, margin_ratio);
        let new_w = (f64::from(foreground.0) * scale).floor() as u32;
        let new_h = (f64::from(foreground.1) * scale).floor() as u32;
        (new_w.clamp(1, canvas.width), new_h.clamp(1, canvas.height))
    }

    /// Composite the foreground of `image` onto a fresh transparent canvas
    ///
    /// The canvas is `canvas` if given, else the input's own size. When the
    /// input has no opaque pixels it is returned unchanged with
    /// [`CompositeOutcome::EmptyForeground`].
    ///
    /// # Errors
    /// - `DimensionMismatch` if the canvas has a zero extent
    /// - `InvalidConfig` if `margin_ratio` is outside `[0, 1)`
    #[instrument(skip(image), fields(width = image.width(), height = image.height()))]
    pub fn composite(
        image: PixelBuffer,
        canvas: Option<CanvasSize>,
        margin_ratio: f64,
    ) -> Result<Composite> {
        let canvas = canvas.unwrap_or_else(|| CanvasSize::new(image.width(), image.height()));
        if canvas.width == 0 || canvas.height == 0 {
            return Err(BgCenterError::dimension_mismatch(format!(
                "Canvas must have positive extents, got {}",
                canvas
            )));
        }
        if !(0.0..1.0).contains(&margin_ratio) {
            return Err(BgCenterError::config_value_error(
                "margin_ratio",
                margin_ratio,
                "[0.0, 1.0)",
                Some(crate::config::DEFAULT_MARGIN_RATIO),
            ));
        }

        let Some(bbox) = Self::bounding_box(&image) else {
            warn!("No foreground found; returning the image unchanged");
            return Ok(Composite {
                image,
                outcome: CompositeOutcome::EmptyForeground,
                bounding_box: None,
            });
        };

        let mut foreground =
            imageops::crop_imm(&image, bbox.left, bbox.top, bbox.width(), bbox.height()).to_image();
        let (new_w, new_h) =
            Self::scaled_dimensions(canvas, (bbox.width(), bbox.height()), margin_ratio);
        debug!(
            bbox = %bbox,
            new_width = new_w,
            new_height = new_h,
            "Scaling foreground"
        );

        // Keyed pixels still carry the background color; resampling in
        // premultiplied space keeps it out of the edge pixels
        premultiply(&mut foreground);
        let mut resized = imageops::resize(&foreground, new_w, new_h, FilterType::Lanczos3);
        unpremultiply(&mut resized);

        // Pasting onto a fully transparent canvas with the foreground's own
        // alpha as mask is a plain copy
        let mut output = PixelBuffer::new(canvas.width, canvas.height);
        let offset_x = (canvas.width - new_w) / 2;
        let offset_y = (canvas.height - new_h) / 2;
        imageops::replace(
            &mut output,
            &resized,
            i64::from(offset_x),
            i64::from(offset_y),
        );

        Ok(Composite {
            image: output,
            outcome: CompositeOutcome::Composited,
            bounding_box: Some(bbox),
        })
    }
}

/// Scale color channels by alpha
fn premultiply(image: &mut PixelBuffer) {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        let scale = |c: u8| ((u16::from(c) * alpha + 127) / 255) as u8;
        pixel.0 = [scale(r), scale(g), scale(b), a];
    }
}

/// Undo [`premultiply`]; fully transparent pixels become transparent black
fn unpremultiply(image: &mut PixelBuffer) {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            pixel.0 = [0, 0, 0, 0];
            continue;
        }
        let alpha = u32::from(a);
        let unscale = |c: u8| ((u32::from(c) * 255 + alpha / 2) / alpha).min(255) as u8;
        pixel.0 = [unscale(r), unscale(g), unscale(b), a];
    }
}
