//! Property and scenario tests for the segmentation and compositing stages

use bgcenter::{
    BackgroundColorSampler, BackgroundRemovalProcessor, BoundaryRefiner, BoundingBox, CanvasSize,
    ChromaKeyMasker, Color, CompositeOutcome, ForegroundCompositor, LocalSegmenter, Mask,
    PipelineConfig, PixelBuffer,
};
use image::Rgba;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

fn image_with_square(size: u32, square: std::ops::Range<u32>, fill: Rgba<u8>) -> PixelBuffer {
    let mut image = PixelBuffer::from_pixel(size, size, WHITE);
    for y in square.clone() {
        for x in square.clone() {
            image.put_pixel(x, y, fill);
        }
    }
    image
}

fn alpha_at(image: &PixelBuffer, x: u32, y: u32) -> u8 {
    image.get_pixel(x, y).0[3]
}

/// Foreground pixels with a non-foreground 8-neighbor, computed the slow way
///
/// Positions outside the image are non-foreground.
fn brute_force_boundary(background: &Mask) -> Vec<(u32, u32)> {
    let foreground = background.inverted();
    let mut boundary = Vec::new();
    for (x, y, is_foreground) in foreground.iter() {
        if !is_foreground {
            continue;
        }
        let touches_outside = (-1i64..=1)
            .flat_map(|dy| (-1i64..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .any(|(dx, dy)| !foreground.get(i64::from(x) + dx, i64::from(y) + dy));
        if touches_outside {
            boundary.push((x, y));
        }
    }
    boundary
}

#[test]
fn red_square_on_white_is_keyed_and_centered() {
    let mut image = image_with_square(100, 45..55, RED);
    let config = PipelineConfig::default();

    assert_eq!(
        BackgroundColorSampler::sample(&image, config.edge_sample_width),
        Some(Color::new(255, 255, 255))
    );

    let report = LocalSegmenter::segment(&mut image, &config).unwrap();
    assert_eq!(report.background_color, Some(Color::new(255, 255, 255)));
    for (x, y, pixel) in image.enumerate_pixels() {
        let inside = (45..55).contains(&x) && (45..55).contains(&y);
        assert_eq!(pixel.0[3], if inside { 255 } else { 0 }, "alpha at ({x}, {y})");
    }

    let bbox = ForegroundCompositor::bounding_box(&image).unwrap();
    assert_eq!(bbox, BoundingBox::new(45, 45, 55, 55));
    assert_eq!(
        ForegroundCompositor::scaled_dimensions(CanvasSize::new(100, 100), (10, 10), 0.1),
        (90, 90)
    );

    let composite = ForegroundCompositor::composite(image, None, config.margin_ratio).unwrap();
    assert_eq!(composite.outcome, CompositeOutcome::Composited);
    assert_eq!(composite.image.dimensions(), (100, 100));
    assert_eq!(
        ForegroundCompositor::bounding_box(&composite.image),
        Some(BoundingBox::new(5, 5, 95, 95))
    );
    assert_eq!(composite.image.get_pixel(50, 50).0, [255, 0, 0, 255]);
    assert_eq!(alpha_at(&composite.image, 4, 50), 0);
    assert_eq!(alpha_at(&composite.image, 95, 50), 0);
}

#[test]
fn uniform_image_yields_empty_foreground() {
    let source = PixelBuffer::from_pixel(32, 24, Rgba([30, 60, 90, 255]));
    let processor = BackgroundRemovalProcessor::new(PipelineConfig::default()).unwrap();

    let result = processor.process_image(source.clone()).unwrap();
    assert!(result.is_empty_foreground());
    assert!(result.metadata.bounding_box.is_none());
    assert_eq!(result.dimensions(), (32, 24));
    for (x, y, pixel) in result.image.enumerate_pixels() {
        let original = source.get_pixel(x, y).0;
        assert_eq!(&pixel.0[..3], &original[..3]);
        assert_eq!(pixel.0[3], 0);
    }
}

#[test]
fn compositor_returns_transparent_input_unchanged() {
    let mut source = PixelBuffer::from_pixel(7, 5, Rgba([10, 20, 30, 0]));
    source.put_pixel(3, 2, Rgba([99, 99, 99, 0]));

    let composite =
        ForegroundCompositor::composite(source.clone(), Some(CanvasSize::new(50, 50)), 0.1)
            .unwrap();
    assert_eq!(composite.outcome, CompositeOutcome::EmptyForeground);
    assert_eq!(composite.image, source);
}

#[test]
fn checkerboard_boundary_without_dilation() {
    // 16x16 board of 4x4 cells; white cells are background
    let board = PixelBuffer::from_fn(16, 16, |x, y| {
        if ((x / 4) + (y / 4)) % 2 == 0 {
            WHITE
        } else {
            Rgba([0, 0, 0, 255])
        }
    });
    let background = ChromaKeyMasker::background_mask(&board, Color::new(255, 255, 255), 5);
    assert_eq!(background.count(), 128);

    let boundary = BoundaryRefiner::boundary_mask(&background.inverted());
    let dilated = BoundaryRefiner::dilate(&boundary, 0);
    assert_eq!(dilated, boundary);

    let expected = brute_force_boundary(&background);
    let actual: Vec<(u32, u32)> = boundary
        .iter()
        .filter(|&(_, _, set)| set)
        .map(|(x, y, _)| (x, y))
        .collect();
    assert_eq!(actual, expected);

    // Interior of a black cell is not on the boundary; its rim is
    assert!(!boundary.get(5, 1));
    assert!(boundary.get(4, 1));
    assert!(boundary.get(7, 2));
    // Positions beyond the image edge count as non-foreground
    assert!(boundary.get(5, 0));
    assert!(!boundary.get(5, 2));
}

#[test]
fn refinement_is_local_to_the_dilated_boundary() {
    let mut image = image_with_square(60, 20..40, RED);
    let near_white = Rgba([245, 245, 245, 255]);
    image.put_pixel(21, 21, near_white);
    image.put_pixel(30, 30, near_white);

    let config = PipelineConfig::builder().dilation_radius(4).build().unwrap();
    let reference = Color::new(255, 255, 255);

    let mut keyed = image.clone();
    let background = ChromaKeyMasker::key(&mut keyed, reference, config.color_threshold);
    let boundary = brute_force_boundary(&background);

    let mut refined = image.clone();
    let report = LocalSegmenter::segment(&mut refined, &config).unwrap();
    assert_eq!(report.refined_pixels, 1);

    // Near-white pixel next to the rim is cleared; the one deep inside stays
    assert_eq!(alpha_at(&keyed, 21, 21), 255);
    assert_eq!(alpha_at(&refined, 21, 21), 0);
    assert_eq!(alpha_at(&refined, 30, 30), 255);

    let radius = i64::from(config.dilation_radius);
    for (x, y, pixel) in refined.enumerate_pixels() {
        let far_from_boundary = boundary.iter().all(|&(bx, by)| {
            let dx = (i64::from(x) - i64::from(bx)).abs();
            let dy = (i64::from(y) - i64::from(by)).abs();
            dx.max(dy) > radius
        });
        if far_from_boundary {
            assert_eq!(pixel.0[3], alpha_at(&keyed, x, y), "alpha changed at ({x}, {y})");
        }
    }
}

#[test]
fn segmentation_is_idempotent_on_masked_buffer() {
    let config = PipelineConfig::default();
    let mut once = image_with_square(80, 30..50, Rgba([20, 40, 200, 255]));
    LocalSegmenter::segment(&mut once, &config).unwrap();

    let mut twice = once.clone();
    let report = LocalSegmenter::segment(&mut twice, &config).unwrap();
    assert_eq!(report.refined_pixels, 0);
    assert_eq!(twice, once);
}

#[test]
fn local_alpha_is_binary() {
    let mut image = image_with_square(50, 10..40, Rgba([120, 130, 140, 255]));
    image.put_pixel(10, 10, Rgba([250, 250, 248, 255]));
    image.put_pixel(25, 25, Rgba([200, 200, 200, 128]));
    LocalSegmenter::segment(&mut image, &PipelineConfig::default()).unwrap();
    assert!(image.pixels().all(|p| p.0[3] == 0 || p.0[3] == 255));
}

#[test]
fn bounding_box_extremes() {
    let transparent = PixelBuffer::new(12, 9);
    assert_eq!(ForegroundCompositor::bounding_box(&transparent), None);

    let opaque = PixelBuffer::from_pixel(12, 9, RED);
    assert_eq!(
        ForegroundCompositor::bounding_box(&opaque),
        Some(BoundingBox::new(0, 0, 12, 9))
    );
}

#[test]
fn scaled_foreground_fills_limiting_axis() {
    let canvases = [(100, 100), (800, 600), (300, 120), (64, 256)];
    let foregrounds = [(10, 10), (200, 50), (37, 411), (1, 1), (999, 998)];
    let margins = [0.0, 0.1, 0.25, 0.5, 0.9];

    for &(cw, ch) in &canvases {
        for &(fw, fh) in &foregrounds {
            for &margin in &margins {
                let canvas = CanvasSize::new(cw, ch);
                let (nw, nh) = ForegroundCompositor::scaled_dimensions(canvas, (fw, fh), margin);
                assert!(nw <= cw && nh <= ch, "{nw}x{nh} exceeds {cw}x{ch}");

                let target_w = (f64::from(cw) * (1.0 - margin)).floor();
                let target_h = (f64::from(ch) * (1.0 - margin)).floor();
                let fills_w = (f64::from(nw) - target_w).abs() <= 1.0;
                let fills_h = (f64::from(nh) - target_h).abs() <= 1.0;
                assert!(
                    fills_w || fills_h,
                    "{fw}x{fh} on {cw}x{ch} margin {margin}: got {nw}x{nh}"
                );
                assert!(f64::from(nw) <= target_w + 1.0 && f64::from(nh) <= target_h + 1.0);
            }
        }
    }
}

#[test]
fn canvas_size_is_exact_for_any_source() {
    let sources = [
        image_with_square(100, 45..55, RED),
        PixelBuffer::from_fn(300, 40, |x, _| if x > 10 { RED } else { WHITE }),
        PixelBuffer::from_pixel(3, 500, RED),
    ];
    let canvases = [CanvasSize::new(800, 800), CanvasSize::new(640, 360), CanvasSize::new(1, 1)];

    for source in &sources {
        for &canvas in &canvases {
            let composite =
                ForegroundCompositor::composite(source.clone(), Some(canvas), 0.1).unwrap();
            assert_eq!(composite.image.dimensions(), (canvas.width, canvas.height));
        }
    }
}

#[test]
fn keyed_disk_edges_stay_red_after_upscaling() {
    let mut image = PixelBuffer::from_fn(60, 60, |x, y| {
        let dx = i64::from(x) - 30;
        let dy = i64::from(y) - 30;
        if dx * dx + dy * dy <= 64 {
            RED
        } else {
            WHITE
        }
    });
    LocalSegmenter::segment(&mut image, &PipelineConfig::default()).unwrap();

    let composite =
        ForegroundCompositor::composite(image, Some(CanvasSize::new(200, 200)), 0.1).unwrap();
    let partial = composite
        .image
        .pixels()
        .filter(|p| p.0[3] > 0 && p.0[3] < 255)
        .count();
    assert!(partial > 0);

    for (x, y, pixel) in composite.image.enumerate_pixels() {
        if pixel.0[3] > 0 {
            assert_eq!(&pixel.0[..3], &[255, 0, 0], "edge color at ({x}, {y})");
        }
    }
}
