//! Boundary refinement for halos left by hard chroma keying
//!
//! Anti-aliasing and compression leave a ring of pixels whose color sits
//! between subject and background. Those pixels survive the uniform-bound
//! key but are still close to the reference on average; this stage finds
//! them near the foreground edge and makes them transparent.

use crate::config::AlphaMode;
use crate::types::{Color, Mask, PixelBuffer};
use ndarray::Array2;

const NEIGHBORS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Parameters for one refinement pass
#[derive(Debug, Clone, Copy)]
pub struct RefinementParams {
    pub reference: Color,
    pub boundary_color_threshold: f32,
    pub dilation_radius: u32,
    pub alpha_mode: AlphaMode,
}

/// Counts reported by a refinement pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefinementStats {
    pub boundary_pixels: usize,
    pub refined_pixels: usize,
}

/// Erodes color fringing at the foreground/background transition
pub struct BoundaryRefiner;

impl BoundaryRefiner {
    /// Foreground pixels with at least one non-foreground 8-neighbor
    ///
    /// Neighbors outside the image count as non-foreground, so foreground
    /// pixels on the image edge are always boundary pixels.
    #[must_use]
    pub fn boundary_mask(foreground: &Mask) -> Mask {
        Mask::from_fn(foreground.width(), foreground.height(), |x, y| {
            let (xi, yi) = (i64::from(x), i64::from(y));
            foreground.get(xi, yi)
                && NEIGHBORS
                    .iter()
                    .any(|&(dx, dy)| !foreground.get(xi + dx, yi + dy))
        })
    }

    /// Square-window dilation with Chebyshev radius `radius`
    ///
    /// Computed as a horizontal pass followed by a vertical pass, which is
    /// equivalent to the full `(2r+1)^2` window. A radius of 0 returns the
    /// mask unchanged.
    #[must_use]
    pub fn dilate(mask: &Mask, radius: u32) -> Mask {
        if radius == 0 {
            return mask.clone();
        }
        let radius = radius as usize;
        let src = mask.as_array();
        let (rows, cols) = src.dim();

        let mut horizontal = Array2::from_elem((rows, cols), false);
        for (src_row, mut dst_row) in src.rows().into_iter().zip(horizontal.rows_mut()) {
            let line = dilate_line(&src_row.to_vec(), radius);
            for (dst, value) in dst_row.iter_mut().zip(line) {
                *dst = value;
            }
        }

        let mut dilated = Array2::from_elem((rows, cols), false);
        for (src_col, mut dst_col) in horizontal
            .columns()
            .into_iter()
            .zip(dilated.columns_mut())
        {
            let line = dilate_line(&src_col.to_vec(), radius);
            for (dst, value) in dst_col.iter_mut().zip(line) {
                *dst = value;
            }
        }

        Mask::from(dilated)
    }

    /// Refine the alpha channel around the keyed boundary
    ///
    /// `background` is the mask produced by the keyer. Foreground pixels that
    /// lie in the dilated boundary and whose mean channel difference to the
    /// reference is at most the threshold are made transparent (or, with
    /// [`AlphaMode::Soft`], partially transparent). All other pixels keep
    /// their alpha.
    pub fn refine(
        image: &mut PixelBuffer,
        background: &Mask,
        params: &RefinementParams,
    ) -> RefinementStats {
        let foreground = background.inverted();
        let boundary = Self::boundary_mask(&foreground);
        let boundary_pixels = boundary.count();
        if boundary_pixels == 0 {
            return RefinementStats::default();
        }
        let dilated = Self::dilate(&boundary, params.dilation_radius);

        let mut refined_pixels = 0;
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let (xi, yi) = (i64::from(x), i64::from(y));
            if !foreground.get(xi, yi) || !dilated.get(xi, yi) {
                continue;
            }
            let diff = Color::from_rgba(pixel).mean_channel_diff(&params.reference);
            if diff <= params.boundary_color_threshold {
                pixel.0[3] = match params.alpha_mode {
                    AlphaMode::Binary => 0,
                    AlphaMode::Soft => soft_alpha(diff, params.boundary_color_threshold),
                };
                refined_pixels += 1;
            }
        }

        RefinementStats {
            boundary_pixels,
            refined_pixels,
        }
    }
}

/// One-dimensional dilation using a running count of set cells
fn dilate_line(line: &[bool], radius: usize) -> Vec<bool> {
    let mut prefix = Vec::with_capacity(line.len() + 1);
    let mut running = 0usize;
    prefix.push(running);
    for &value in line {
        running += usize::from(value);
        prefix.push(running);
    }

    (0..line.len())
        .map(|i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius + 1).min(line.len());
            prefix[hi] > prefix[lo]
        })
        .collect()
}

/// Alpha proportional to how far a color is from the reference
fn soft_alpha(diff: f32, threshold: f32) -> u8 {
    if threshold <= 0.0 {
        return 0;
    }
    (255.0 * diff / threshold).round().clamp(0.0, 255.0) as u8
}
