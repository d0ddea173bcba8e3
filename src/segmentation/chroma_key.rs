//! Chroma-key masking by per-channel color distance

use crate::types::{Color, Mask, PixelBuffer};

/// Classifies pixels as background by closeness to a reference color
pub struct ChromaKeyMasker;

impl ChromaKeyMasker {
    /// Background mask under the uniform per-channel bound
    ///
    /// A pixel is background iff each of its R, G and B channels differs from
    /// `reference` by at most `threshold`. Alpha is not consulted.
    #[must_use]
    pub fn background_mask(image: &PixelBuffer, reference: Color, threshold: u8) -> Mask {
        let (width, height) = image.dimensions();
        Mask::from_fn(width, height, |x, y| {
            Color::from_rgba(image.get_pixel(x, y)).max_channel_diff(&reference) <= threshold
        })
    }

    /// Background mask for near-white backgrounds
    ///
    /// A pixel is background iff all of R, G and B are at least `floor`.
    #[must_use]
    pub fn white_mask(image: &PixelBuffer, floor: u8) -> Mask {
        let (width, height) = image.dimensions();
        Mask::from_fn(width, height, |x, y| {
            let [r, g, b, _] = image.get_pixel(x, y).0;
            r >= floor && g >= floor && b >= floor
        })
    }

    /// Write binary alpha: 0 where `background` is set, 255 elsewhere
    pub fn apply(image: &mut PixelBuffer, background: &Mask) {
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            pixel.0[3] = if background.get(i64::from(x), i64::from(y)) {
                0
            } else {
                255
            };
        }
    }

    /// Compute the background mask and write it into the alpha channel
    pub fn key(image: &mut PixelBuffer, reference: Color, threshold: u8) -> Mask {
        let mask = Self::background_mask(image, reference, threshold);
        Self::apply(image, &mask);
        mask
    }
}
