//! In-process decode and JPEG encode, via the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG, WebP) | `image::load_from_memory_with_format` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//!
//! HEIC/HEIF never reach this module; the classifier routes them to the
//! external converter. Anything else the classifier rejected is refused here
//! too, so a mis-routed input fails loudly instead of being sniffed.

use super::backend::BackendError;
use super::format::SourceFormat;
use super::params::Quality;
use image::DynamicImage;
use std::io::Write;
use std::path::Path;

/// Decode raw bytes of a standard raster format.
pub fn decode(bytes: &[u8], format: SourceFormat) -> Result<DynamicImage, BackendError> {
    let image_format = format
        .image_format()
        .ok_or_else(|| BackendError::Undecodable(format.to_string()))?;

    image::load_from_memory_with_format(bytes, image_format)
        .map_err(|e| BackendError::ProcessingFailed(format!("Failed to decode {format}: {e}")))
}

/// Encode to JPEG bytes.
///
/// JPEG has no alpha channel and only 8-bit samples, so the image is
/// flattened to RGB8 first.
pub fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
    rgb.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
    Ok(buf)
}

/// Encode to JPEG and write to `path`. Returns the number of bytes written.
pub fn write_jpeg(img: &DynamicImage, path: &Path, quality: Quality) -> Result<u64, BackendError> {
    let bytes = encode_jpeg(img, quality)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(&bytes)?;
    file.flush()?;
    Ok(bytes.len() as u64)
}
