//! Last-tier encoder: in-process JPEG.
//!
//! Used only after the AV1 encoder has failed on a standard-format input.
//! Never shells out, so it works on hosts without ffmpeg. Its own failure
//! is final.

use super::backend::BackendError;
use super::codec::write_jpeg;
use super::operations::max_dimension_resize;
use super::params::Quality;
use crate::report::ProcessedArtifact;
use image::DynamicImage;
use std::path::Path;

/// Bound `img` to `max_dimension` and write it as JPEG to `output`.
///
/// The resize is the same decision the main path makes, so an image that
/// was already bounded passes through unchanged.
pub fn encode_jpeg_fallback(
    img: DynamicImage,
    original_bytes: u64,
    max_dimension: u32,
    quality: Quality,
    output: &Path,
) -> Result<ProcessedArtifact, BackendError> {
    let bounded = max_dimension_resize(img, max_dimension);
    write_jpeg(&bounded, output, quality)?;
    Ok(ProcessedArtifact::from_output(output, original_bytes)?)
}
