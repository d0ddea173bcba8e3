//! End-to-end tests for the `bgcenter` binary

#![cfg(feature = "cli")]

use bgcenter::{ImageIOService, PixelBuffer};
use image::Rgba;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn bgcenter(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bgcenter"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute bgcenter")
}

fn write_subject_png(path: &Path) {
    let mut image = PixelBuffer::from_pixel(32, 32, Rgba([250, 250, 250, 255]));
    for y in 8..24 {
        for x in 12..20 {
            image.put_pixel(x, y, Rgba([180, 20, 20, 255]));
        }
    }
    fs::write(path, ImageIOService::encode_png(&image).unwrap()).unwrap();
}

#[test]
fn test_cli_processes_directory_in_order() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input).unwrap();
    for name in ["img2.png", "img10.png", "img1.png"] {
        write_subject_png(&input.join(name));
    }

    let result = bgcenter(&[
        "shop",
        "--input-dir",
        input.to_str().unwrap(),
        "--output-dir",
        output.to_str().unwrap(),
        "--output-size",
        "64",
        "64",
    ]);
    assert!(
        result.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&result.stderr)
    );

    for name in ["shop_1_img1.png", "shop_2_img10.png", "shop_3_img2.png"] {
        let written = ImageIOService::load_image(output.join(name)).unwrap();
        assert_eq!(written.dimensions(), (64, 64));
    }
}

#[test]
fn test_cli_fails_without_processable_images() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input).unwrap();
    fs::write(input.join("broken.png"), b"not a png").unwrap();

    let result = bgcenter(&[
        "--input-dir",
        input.to_str().unwrap(),
        "--output-dir",
        output.to_str().unwrap(),
    ]);
    assert!(!result.status.success());
}

#[test]
fn test_cli_fails_for_missing_input_dir() {
    let temp = TempDir::new().unwrap();
    let result = bgcenter(&[
        "--input-dir",
        temp.path().join("nope").to_str().unwrap(),
        "--output-dir",
        temp.path().join("out").to_str().unwrap(),
    ]);
    assert!(!result.status.success());
    assert!(!temp.path().join("out").exists());
}
