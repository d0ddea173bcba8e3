//! Image I/O operations service
//!
//! Keeps decoding, encoding and file access out of the pixel stages.

use crate::error::{BgCenterError, Result};
use crate::types::PixelBuffer;
use std::path::Path;

/// Extensions accepted as batch inputs
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Service for handling image input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Decode encoded bytes (PNG/JPEG) into an RGBA buffer
    ///
    /// Sources without an alpha channel come out fully opaque.
    ///
    /// # Errors
    /// - `Decode` if the bytes are not a decodable image
    pub fn load_from_bytes(bytes: &[u8]) -> Result<PixelBuffer> {
        let image = image::load_from_memory(bytes).map_err(|e| {
            BgCenterError::decode(format!(
                "Failed to decode image from {} bytes: {}",
                bytes.len(),
                e
            ))
        })?;
        if image.width() == 0 || image.height() == 0 {
            return Err(BgCenterError::decode("Decoded image has zero extent"));
        }
        Ok(image.to_rgba8())
    }

    /// Read a file's raw bytes
    pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path_ref = path.as_ref();
        std::fs::read(path_ref)
            .map_err(|e| BgCenterError::file_io_error("read image file", path_ref, &e))
    }

    /// Load and decode an image file
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<PixelBuffer> {
        let path_ref = path.as_ref();
        let data = Self::read_bytes(path_ref)?;
        Self::load_from_bytes(&data).map_err(|e| {
            BgCenterError::decode(format!("{} (path: {})", e, path_ref.display()))
        })
    }

    /// Encode a buffer as PNG with alpha
    pub fn encode_png(image: &PixelBuffer) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        image
            .write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| BgCenterError::encode(format!("Failed to encode PNG: {}", e)))?;
        Ok(buffer)
    }

    /// Write bytes to `path`, creating parent directories as needed
    pub fn write_bytes<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BgCenterError::file_io_error("create output directory", parent, &e)
                })?;
            }
        }
        std::fs::write(path_ref, bytes)
            .map_err(|e| BgCenterError::file_io_error("write output file", path_ref, &e))
    }

    /// Check if a file path has a supported image extension (case-insensitive)
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    }
}
