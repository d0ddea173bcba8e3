//! Background color inference from the image border

use crate::types::{Color, PixelBuffer};
use std::collections::HashMap;

/// Infers the chroma-key reference color from a border ring of the image
pub struct BackgroundColorSampler;

impl BackgroundColorSampler {
    /// Most frequent color in the border ring of width `sample_width`
    ///
    /// The ring is the left, right, top and bottom bands of the image. Corner
    /// pixels are counted once per band they fall into. Ties go to the color
    /// seen first in scan order: left columns top-to-bottom, then right
    /// columns, then top rows left-to-right, then bottom rows. Bands wider
    /// than the image are clamped to the pixels that exist.
    ///
    /// Returns `None` only for an empty buffer.
    #[must_use]
    pub fn sample(image: &PixelBuffer, sample_width: u32) -> Option<Color> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        let band = sample_width.max(1);
        let cols = band.min(width);
        let rows = band.min(height);

        // color -> (count, first scan position)
        let mut counts: HashMap<Color, (usize, usize)> = HashMap::new();
        let mut position = 0usize;
        let mut record = |x: u32, y: u32| {
            let color = Color::from_rgba(image.get_pixel(x, y));
            let entry = counts.entry(color).or_insert((0, position));
            entry.0 += 1;
            position += 1;
        };

        for x in 0..cols {
            for y in 0..height {
                record(x, y);
            }
        }
        for x in 0..cols {
            for y in 0..height {
                record(width - 1 - x, y);
            }
        }
        for y in 0..rows {
            for x in 0..width {
                record(x, y);
            }
        }
        for y in 0..rows {
            for x in 0..width {
                record(x, height - 1 - y);
            }
        }

        counts
            .into_iter()
            .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
                count_a.cmp(count_b).then(first_b.cmp(first_a))
            })
            .map(|(color, _)| color)
    }
}
