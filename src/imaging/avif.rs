//! AVIF output through an external AV1 encoder (ffmpeg + libaom).
//!
//! The encoder reads from a file path, so the decoded image is first written
//! to an intermediate JPEG at quality 100 next to the output. The
//! [`EncodeRequest`] decides the rate control: full-size runs carry a bitrate
//! ceiling from
//! [`calculate_target_bitrate_kbps`](super::calculations::calculate_target_bitrate_kbps),
//! thumbnails use a fixed CRF only.
//!
//! The intermediate file is removed whatever the encoder's outcome. Failing
//! to remove it is logged and otherwise ignored.

use super::backend::{BackendError, CommandRunner, Invocation, discard_file};
use super::calculations::format_bitrate;
use super::codec::write_jpeg;
use super::params::{AvifSettings, EncodeRequest, Quality, RateControl};
use crate::report::ProcessedArtifact;
use image::DynamicImage;
use std::path::Path;

/// Build the encoder invocation without running it.
///
/// Useful for testing argument generation.
pub fn plan_avif(
    settings: &AvifSettings,
    source: &Path,
    output: &Path,
    rate: RateControl,
) -> Invocation {
    let crf = match rate {
        RateControl::TargetBitrate { .. } => settings.crf,
        RateControl::FixedQuality => settings.thumbnail_crf,
    };

    let mut inv = Invocation::new(&settings.program, output)
        .arg("-i")
        .arg(source)
        .args(["-c:v", settings.codec.as_str()])
        .args(["-crf".to_string(), crf.to_string()]);

    if let RateControl::TargetBitrate { kbps } = rate {
        inv = inv.args(["-b:v".to_string(), format_bitrate(kbps)]);
    }

    inv = inv.args(["-cpu-used".to_string(), settings.cpu_used.to_string()]);
    if settings.row_mt {
        inv = inv.args(["-row-mt", "1"]);
    }

    inv.args(["-tile-columns".to_string(), settings.tile_columns.to_string()])
        .args(["-tile-rows".to_string(), settings.tile_rows.to_string()])
        .args(["-f", "avif", "-y"])
        .arg(output)
}

/// Encode a full-size image to AVIF under `request`'s rate control.
///
/// `original_bytes` is the size of the uploaded source, used for the
/// reported compression ratio. The bitrate ceiling is already in
/// `request.rate`.
pub fn produce_compressed(
    runner: &impl CommandRunner,
    settings: &AvifSettings,
    img: &DynamicImage,
    request: &EncodeRequest,
    original_bytes: u64,
    output: &Path,
    temp: &Path,
) -> Result<ProcessedArtifact, BackendError> {
    if let RateControl::TargetBitrate { kbps } = request.rate {
        log::debug!(
            "target bitrate {} for {} source bytes",
            format_bitrate(kbps),
            original_bytes
        );
    }
    encode_via_intermediate(runner, settings, img, request.rate, original_bytes, output, temp)
}

/// Encode a thumbnail to AVIF; thumbnail requests use a fixed CRF.
pub fn produce_thumbnail(
    runner: &impl CommandRunner,
    settings: &AvifSettings,
    thumb: &DynamicImage,
    request: &EncodeRequest,
    original_bytes: u64,
    output: &Path,
    temp: &Path,
) -> Result<ProcessedArtifact, BackendError> {
    encode_via_intermediate(runner, settings, thumb, request.rate, original_bytes, output, temp)
}

fn encode_via_intermediate(
    runner: &impl CommandRunner,
    settings: &AvifSettings,
    img: &DynamicImage,
    rate: RateControl,
    original_bytes: u64,
    output: &Path,
    temp: &Path,
) -> Result<ProcessedArtifact, BackendError> {
    write_jpeg(img, temp, Quality::max())?;

    let invocation = plan_avif(settings, temp, output, rate);
    let outcome = runner.run(&invocation);
    discard_file(temp);
    outcome?;

    Ok(ProcessedArtifact::from_output(output, original_bytes)?)
}
