//! Batch processing workflows over temporary directories

use bgcenter::{
    BackgroundMode, BackgroundRemovalProcessor, BatchOptions, BatchProcessor, BgCenterError,
    CompositeOutcome, ForegroundCompositor, ImageIOService, MockBackend, PipelineConfig,
    PixelBuffer,
};
use image::Rgba;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_subject_png(path: &Path, size: (u32, u32)) {
    let mut image = PixelBuffer::from_pixel(size.0, size.1, Rgba([255, 255, 255, 255]));
    for y in size.1 / 4..size.1 * 3 / 4 {
        for x in size.0 / 4..size.0 * 3 / 4 {
            image.put_pixel(x, y, Rgba([20, 90, 160, 255]));
        }
    }
    fs::write(path, ImageIOService::encode_png(&image).unwrap()).unwrap();
}

fn local_processor(config: PipelineConfig) -> Arc<BackgroundRemovalProcessor> {
    Arc::new(BackgroundRemovalProcessor::new(config).unwrap())
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn batch_names_outputs_by_sorted_sequence() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input).unwrap();

    write_subject_png(&input.join("Zebra Shoe.png"), (40, 40));
    write_subject_png(&input.join("apple.png"), (30, 20));
    write_subject_png(&input.join("Mango.PNG"), (20, 30));
    fs::write(input.join("notes.txt"), b"not an image").unwrap();

    let options = BatchOptions::new(&input, &output)
        .with_prefix("item")
        .with_concurrency(3);
    let summary = BatchProcessor::new(local_processor(PipelineConfig::default()), options)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.processed(), 3);
    assert_eq!(summary.failed(), 0);

    // Byte-wise sort puts upper-case names first
    let planned: Vec<(usize, String)> = summary
        .outcomes
        .iter()
        .map(|o| {
            (
                o.job.sequence,
                o.job.output_path.file_name().unwrap().to_string_lossy().into_owned(),
            )
        })
        .collect();
    assert_eq!(
        planned,
        vec![
            (1, "item_1_mango.png".to_string()),
            (2, "item_2_zebra_shoe.png".to_string()),
            (3, "item_3_apple.png".to_string()),
        ]
    );
    assert_eq!(
        file_names(&output),
        vec!["item_1_mango.png", "item_2_zebra_shoe.png", "item_3_apple.png"]
    );

    let written = ImageIOService::load_image(output.join("item_3_apple.png")).unwrap();
    assert_eq!(written.dimensions(), (30, 20));
}

#[tokio::test]
async fn batch_without_prefix_uses_sanitized_names_and_output_size() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input).unwrap();
    write_subject_png(&input.join("Red Bag.png"), (50, 40));

    let config = PipelineConfig::builder().output_size(64, 48).build().unwrap();
    let summary = BatchProcessor::new(local_processor(config), BatchOptions::new(&input, &output))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.processed(), 1);
    let written = ImageIOService::load_image(output.join("red_bag.png")).unwrap();
    assert_eq!(written.dimensions(), (64, 48));
    assert!(ForegroundCompositor::bounding_box(&written).is_some());
}

#[tokio::test]
async fn undecodable_file_does_not_abort_batch() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input).unwrap();

    write_subject_png(&input.join("a.png"), (24, 24));
    fs::write(input.join("b.jpg"), b"\xFF\xD8\xFF\xE0 truncated").unwrap();
    write_subject_png(&input.join("c.png"), (24, 24));

    let options = BatchOptions::new(&input, &output).with_prefix("p");
    let summary = BatchProcessor::new(local_processor(PipelineConfig::default()), options)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.processed(), 2);
    assert_eq!(summary.failed(), 1);
    let failed = &summary.outcomes[1];
    assert_eq!(failed.job.sequence, 2);
    assert!(matches!(failed.result, Err(BgCenterError::Decode(_))));

    // Sequence numbers stay tied to input order, not to successes
    assert_eq!(file_names(&output), vec!["p_1_a.png", "p_3_c.png"]);
}

#[tokio::test]
async fn output_reset_preserves_gitkeep() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input).unwrap();
    fs::create_dir(&output).unwrap();
    fs::write(output.join(".gitkeep"), b"placeholder").unwrap();
    fs::write(output.join("stale_1_old.png"), b"old").unwrap();
    write_subject_png(&input.join("new.png"), (16, 16));

    BatchProcessor::new(
        local_processor(PipelineConfig::default()),
        BatchOptions::new(&input, &output),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(file_names(&output), vec![".gitkeep", "new.png"]);
    assert_eq!(fs::read(output.join(".gitkeep")).unwrap(), b"placeholder");
}

#[tokio::test]
async fn empty_foreground_is_reported_not_failed() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input).unwrap();
    let blank = PixelBuffer::from_pixel(10, 10, Rgba([200, 200, 200, 255]));
    fs::write(input.join("blank.png"), ImageIOService::encode_png(&blank).unwrap()).unwrap();

    let summary = BatchProcessor::new(
        local_processor(PipelineConfig::default()),
        BatchOptions::new(&input, &output),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.processed(), 1);
    assert_eq!(summary.empty_foreground(), 1);
    let metadata = summary.outcomes[0].result.as_ref().unwrap();
    assert_eq!(metadata.outcome, CompositeOutcome::EmptyForeground);
    assert!(output.join("blank.png").exists());
}

#[tokio::test]
async fn missing_or_empty_input_dir_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("output");

    let batch = BatchProcessor::new(
        local_processor(PipelineConfig::default()),
        BatchOptions::new(temp.path().join("missing"), &output),
    );
    assert!(matches!(batch.run().await, Err(BgCenterError::InvalidConfig(_))));

    let empty = temp.path().join("empty");
    fs::create_dir(&empty).unwrap();
    let batch = BatchProcessor::new(
        local_processor(PipelineConfig::default()),
        BatchOptions::new(&empty, &output),
    );
    assert!(matches!(batch.run().await, Err(BgCenterError::InvalidConfig(_))));
}

#[tokio::test]
async fn external_mode_routes_through_backend() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input).unwrap();
    write_subject_png(&input.join("one.png"), (20, 20));
    write_subject_png(&input.join("two.jpg"), (20, 20));

    // Backend output: a cut-out with a transparent surround
    let mut cutout = PixelBuffer::new(40, 40);
    for y in 10..20 {
        for x in 5..35 {
            cutout.put_pixel(x, y, Rgba([0, 0, 255, 255]));
        }
    }
    let backend = Arc::new(MockBackend::responding(
        ImageIOService::encode_png(&cutout).unwrap(),
    ));

    let config = PipelineConfig::builder()
        .mode(BackgroundMode::External)
        .output_size(100, 100)
        .build()
        .unwrap();
    let processor =
        Arc::new(BackgroundRemovalProcessor::with_backend(config, backend.clone()).unwrap());

    let summary = BatchProcessor::new(processor, BatchOptions::new(&input, &output))
        .run()
        .await
        .unwrap();

    assert_eq!(backend.calls(), 2);
    assert_eq!(summary.processed(), 2);

    // 30x10 foreground scaled by 3 onto the 100x100 canvas
    let written = ImageIOService::load_image(output.join("one.png")).unwrap();
    assert_eq!(written.dimensions(), (100, 100));
    let bbox = ForegroundCompositor::bounding_box(&written).unwrap();
    assert_eq!((bbox.left, bbox.right), (5, 95));
    assert_eq!(bbox.width(), 90);
}

#[tokio::test]
async fn backend_failures_are_counted_per_file() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input).unwrap();
    write_subject_png(&input.join("one.png"), (20, 20));

    let config = PipelineConfig::builder()
        .mode(BackgroundMode::External)
        .build()
        .unwrap();
    let processor = Arc::new(
        BackgroundRemovalProcessor::with_backend(
            config,
            Arc::new(MockBackend::failing("model unavailable")),
        )
        .unwrap(),
    );

    let summary = BatchProcessor::new(processor, BatchOptions::new(&input, &output))
        .run()
        .await
        .unwrap();
    assert_eq!(summary.processed(), 0);
    assert_eq!(summary.failed(), 1);
    assert!(matches!(
        summary.outcomes[0].result,
        Err(BgCenterError::Backend(_))
    ));
}

#[tokio::test]
async fn configuration_failure_stops_remaining_jobs() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input).unwrap();
    for name in ["a.png", "b.png", "c.png"] {
        write_subject_png(&input.join(name), (16, 16));
    }

    let config = PipelineConfig::builder()
        .mode(BackgroundMode::External)
        .build()
        .unwrap();
    let backend = Arc::new(MockBackend::misconfigured("segmentation model not installed"));
    let processor =
        Arc::new(BackgroundRemovalProcessor::with_backend(config, backend.clone()).unwrap());

    let options = BatchOptions::new(&input, &output).with_concurrency(1);
    let summary = BatchProcessor::new(processor, options).run().await.unwrap();

    assert_eq!(backend.calls(), 1);
    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(summary.skipped, 2);
    assert!(summary.is_aborted());
    assert!(matches!(
        summary.outcomes[0].result,
        Err(BgCenterError::InvalidConfig(_))
    ));
    assert!(file_names(&output).is_empty());
}
