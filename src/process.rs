//! Adaptive compression pipeline.
//!
//! Takes one [`SourceImage`] and writes exactly one output file into the
//! output directory. The path through the pipeline depends on the source
//! format:
//!
//! ```text
//! Received ─> Decoding ─┬─ heic/heif ──> ContainerConvert ─────────────> Done | Err
//!                       └─ png/jpeg/webp ─> Resizing ─> EncodingPrimary ─┬─> Done
//!                                                                        └─> EncodingFallback ─> Done | Err
//! ```
//!
//! A container is not decoded in-process: its `Decoding` step is handing
//! the file to the converter. The failed state is the `Err` return, which
//! carries the terminal error; only successful runs keep their trail.
//!
//! ## Tiers
//!
//! | Tier | Output | On failure |
//! |---|---|---|
//! | Primary (ffmpeg → AVIF) | `<base>.avif` | recoverable: fall back |
//! | Fallback (in-process JPEG) | `<base>.jpg` | fatal |
//! | Container convert (magick → JPEG) | `<base>.jpg` | fatal after one retry |
//!
//! Thumbnails take the primary tier only and have no fallback. Container
//! formats are refused for thumbnails before any file is read.
//!
//! ## Parallel Processing
//!
//! A single pipeline run is sequential. [`process_batch`] runs many in
//! parallel using [rayon](https://docs.rs/rayon); runs share nothing but
//! the output directory, and temporary names carry a per-run token.

use crate::imaging::backend::discard_file;
use crate::imaging::{
    BackendError, CommandRunner, EncodeRequest, PipelineSettings, SourceFormat, SystemRunner,
    avif, calculate_target_bitrate_kbps, codec, fallback, heic, make_thumbnail,
    max_dimension_resize,
};
use crate::report::{ProcessResult, ProcessedArtifact};
use crate::source::{SourceError, SourceImage, base_name_of};
use crate::token::{request_token, temp_name, thumbnail_temp_name};
use image::DynamicImage;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;

/// Terminal failure of one pipeline run.
///
/// Each variant names the last stage that failed; intermediate attempts
/// (a failed primary encode before a successful fallback, a failed first
/// converter call before a successful retry) never surface here.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Container conversion failed: {0}")]
    ContainerConversionFailed(String),
    #[error("Encode failed: {0}")]
    EncodeFailed(String),
    #[error("Fallback encode failed: {0}")]
    FallbackEncodeFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Thumbnails are not supported for {0} input")]
    UnsupportedForThumbnail(String),
}

impl From<SourceError> for ProcessError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Io(io) => ProcessError::Io(io),
            other => ProcessError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                other.to_string(),
            )),
        }
    }
}

/// Pipeline states a run passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Received,
    Decoding,
    ContainerConvert,
    Resizing,
    EncodingPrimary,
    EncodingFallback,
    Done,
}

/// Which encoder produced the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Primary,
    Fallback,
    ContainerConvert,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Tier::Primary => "avif",
            Tier::Fallback => "jpeg fallback",
            Tier::ContainerConvert => "converted",
        };
        f.write_str(label)
    }
}

/// Result of running one tier.
#[derive(Debug)]
pub enum TierOutcome {
    Success(ProcessedArtifact),
    /// The tier failed but a later tier may still produce output.
    Recoverable(BackendError),
    Fatal(ProcessError),
}

/// What to produce from each input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Compress,
    Thumbnail,
}

/// A successful pipeline run.
#[derive(Debug, Clone)]
pub struct Processed {
    pub artifact: ProcessedArtifact,
    pub tier: Tier,
    /// States visited, in order, ending in [`Stage::Done`].
    pub stages: Vec<Stage>,
}

impl Processed {
    pub fn result(&self) -> ProcessResult {
        self.artifact.to_result()
    }
}

/// Progress events sent from the batch driver to the printer thread.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    BatchStarted {
        total: usize,
        mode: Mode,
    },
    ImageProcessed {
        /// 1-based position in the batch.
        index: usize,
        source_path: String,
        tier: Tier,
        artifact: ProcessedArtifact,
    },
    ImageFailed {
        index: usize,
        source_path: String,
        error: String,
    },
}

/// Outcome for one input of a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub source_path: PathBuf,
    pub outcome: Result<Processed, ProcessError>,
}

/// Records the states a run visits.
///
/// Only successful runs hand their trail back (in [`Processed::stages`]);
/// a failing run logs the stage it failed in and drops the trail.
struct Trail {
    source: String,
    stages: Vec<Stage>,
}

impl Trail {
    fn new(source: &SourceImage) -> Self {
        let mut trail = Self {
            source: source.file_name(),
            stages: Vec::new(),
        };
        trail.enter(Stage::Received);
        trail
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("{}: {:?}", self.source, stage);
        self.stages.push(stage);
    }

    fn done(mut self, artifact: ProcessedArtifact, tier: Tier) -> Processed {
        self.enter(Stage::Done);
        log::info!(
            "{} -> {} ({}, {}%)",
            self.source,
            artifact.output_filename,
            tier,
            artifact.compression_ratio_percent
        );
        Processed {
            artifact,
            tier,
            stages: self.stages,
        }
    }

    fn fail(self, error: ProcessError) -> ProcessError {
        if let Some(stage) = self.stages.last() {
            log::debug!("{}: failed in {:?}: {}", self.source, stage, error);
        }
        error
    }
}

/// Output path for `base` under the given request.
fn output_path(output_dir: &Path, base: &str, suffix: &str, request: &EncodeRequest) -> PathBuf {
    output_dir.join(format!(
        "{}{}.{}",
        base,
        suffix,
        request.container.extension()
    ))
}

/// Compress one image with the system encoders.
pub fn process_image(
    source: &SourceImage,
    output_dir: &Path,
    settings: &PipelineSettings,
    timeout: Option<Duration>,
) -> Result<Processed, ProcessError> {
    let runner = SystemRunner::new(timeout);
    process_image_with_runner(&runner, source, output_dir, settings)
}

/// Compress one image using a specific runner (allows testing with mock).
pub fn process_image_with_runner(
    runner: &impl CommandRunner,
    source: &SourceImage,
    output_dir: &Path,
    settings: &PipelineSettings,
) -> Result<Processed, ProcessError> {
    compress_as(runner, source, &source.base_name(), output_dir, settings)
}

/// Compress one image, naming its output after `base`.
fn compress_as(
    runner: &impl CommandRunner,
    source: &SourceImage,
    base: &str,
    output_dir: &Path,
    settings: &PipelineSettings,
) -> Result<Processed, ProcessError> {
    let mut trail = Trail::new(source);

    if source.format == SourceFormat::Unsupported {
        return Err(trail.fail(ProcessError::UnsupportedFormat(source.file_name())));
    }

    std::fs::create_dir_all(output_dir)?;

    trail.enter(Stage::Decoding);
    if source.format.is_container() {
        trail.enter(Stage::ContainerConvert);
        let request = EncodeRequest::container(settings.convert.max_dimension);
        let output = output_path(output_dir, base, "", &request);
        return match heic::convert_container(
            runner,
            &settings.convert,
            &source.path,
            source.byte_len,
            &output,
        ) {
            Ok(artifact) => Ok(trail.done(artifact, Tier::ContainerConvert)),
            Err(e) => Err(trail.fail(ProcessError::ContainerConversionFailed(e.to_string()))),
        };
    }

    let img = match decode_source(source) {
        Ok(img) => img,
        Err(e) => return Err(trail.fail(e)),
    };

    trail.enter(Stage::Resizing);
    let img = max_dimension_resize(img, settings.max_dimension);

    trail.enter(Stage::EncodingPrimary);
    let token = request_token(&source.path);
    let temp = output_dir.join(temp_name(base, &token));
    let request = EncodeRequest::full(
        settings.max_dimension,
        calculate_target_bitrate_kbps(source.byte_len),
    );
    let primary_output = output_path(output_dir, base, "", &request);

    let error = match primary_tier(
        runner,
        settings,
        &img,
        &request,
        source.byte_len,
        &primary_output,
        &temp,
    ) {
        TierOutcome::Success(artifact) => return Ok(trail.done(artifact, Tier::Primary)),
        TierOutcome::Recoverable(error) => error,
        TierOutcome::Fatal(error) => return Err(trail.fail(error)),
    };

    let reason = if error.is_external() {
        "primary encoder failed"
    } else {
        "could not prepare encoder input"
    };
    log::warn!(
        "{}: {}, falling back to JPEG: {}",
        source.file_name(),
        reason,
        error
    );
    discard_file(&primary_output);

    trail.enter(Stage::EncodingFallback);
    let request = EncodeRequest::fallback(settings.max_dimension);
    let fallback_output = output_path(output_dir, base, "", &request);
    match fallback_tier(img, settings, &request, source.byte_len, &fallback_output) {
        TierOutcome::Success(artifact) => Ok(trail.done(artifact, Tier::Fallback)),
        TierOutcome::Recoverable(error) => Err(trail.fail(ProcessError::FallbackEncodeFailed(
            error.to_string(),
        ))),
        TierOutcome::Fatal(error) => Err(trail.fail(error)),
    }
}

fn decode_source(source: &SourceImage) -> Result<DynamicImage, ProcessError> {
    let bytes = source.read()?;
    codec::decode(&bytes, source.format).map_err(|e| ProcessError::UnsupportedFormat(e.to_string()))
}

/// Every primary failure on a standard input is recoverable.
fn primary_tier(
    runner: &impl CommandRunner,
    settings: &PipelineSettings,
    img: &DynamicImage,
    request: &EncodeRequest,
    original_bytes: u64,
    output: &Path,
    temp: &Path,
) -> TierOutcome {
    match avif::produce_compressed(
        runner,
        &settings.avif,
        img,
        request,
        original_bytes,
        output,
        temp,
    ) {
        Ok(artifact) => TierOutcome::Success(artifact),
        Err(e) => TierOutcome::Recoverable(e),
    }
}

/// Last tier: nothing to recover to.
fn fallback_tier(
    img: DynamicImage,
    settings: &PipelineSettings,
    request: &EncodeRequest,
    original_bytes: u64,
    output: &Path,
) -> TierOutcome {
    match fallback::encode_jpeg_fallback(
        img,
        original_bytes,
        request.max_dimension,
        settings.jpeg_quality,
        output,
    ) {
        Ok(artifact) => TierOutcome::Success(artifact),
        Err(e) => TierOutcome::Fatal(ProcessError::FallbackEncodeFailed(e.to_string())),
    }
}

/// Create a thumbnail with the system encoder.
pub fn create_thumbnail(
    source: &SourceImage,
    output_dir: &Path,
    settings: &PipelineSettings,
    timeout: Option<Duration>,
) -> Result<Processed, ProcessError> {
    let runner = SystemRunner::new(timeout);
    create_thumbnail_with_runner(&runner, source, output_dir, settings)
}

/// Create a `<base>-thumbnail.avif` using a specific runner.
pub fn create_thumbnail_with_runner(
    runner: &impl CommandRunner,
    source: &SourceImage,
    output_dir: &Path,
    settings: &PipelineSettings,
) -> Result<Processed, ProcessError> {
    thumbnail_as(runner, source, &source.base_name(), output_dir, settings)
}

/// Create a thumbnail named `<base>-thumbnail.avif`.
fn thumbnail_as(
    runner: &impl CommandRunner,
    source: &SourceImage,
    base: &str,
    output_dir: &Path,
    settings: &PipelineSettings,
) -> Result<Processed, ProcessError> {
    if source.format.is_container() {
        return Err(ProcessError::UnsupportedForThumbnail(source.format.to_string()));
    }

    let mut trail = Trail::new(source);
    if source.format == SourceFormat::Unsupported {
        return Err(trail.fail(ProcessError::UnsupportedFormat(source.file_name())));
    }

    std::fs::create_dir_all(output_dir)?;

    trail.enter(Stage::Decoding);
    let img = match decode_source(source) {
        Ok(img) => img,
        Err(e) => return Err(trail.fail(e)),
    };

    trail.enter(Stage::Resizing);
    let request = EncodeRequest::thumbnail(settings.thumbnail_size);
    let thumb = make_thumbnail(&img, request.max_dimension);
    drop(img);

    trail.enter(Stage::EncodingPrimary);
    let token = request_token(&source.path);
    let temp = output_dir.join(thumbnail_temp_name(base, &token));
    let output = output_path(output_dir, base, "-thumbnail", &request);

    match avif::produce_thumbnail(
        runner,
        &settings.avif,
        &thumb,
        &request,
        source.byte_len,
        &output,
        &temp,
    ) {
        Ok(artifact) => Ok(trail.done(artifact, Tier::Primary)),
        Err(e) => {
            discard_file(&output);
            Err(trail.fail(ProcessError::EncodeFailed(e.to_string())))
        }
    }
}

/// Run one input through the pipeline for `mode`, writing under `base`.
fn run_one(
    runner: &impl CommandRunner,
    path: &Path,
    base: &str,
    output_dir: &Path,
    settings: &PipelineSettings,
    mode: Mode,
) -> Result<Processed, ProcessError> {
    let source = SourceImage::open(path)?;
    match mode {
        Mode::Compress => compress_as(runner, &source, base, output_dir, settings),
        Mode::Thumbnail => thumbnail_as(runner, &source, base, output_dir, settings),
    }
}

/// Output base names for a batch, unique within it.
///
/// Inputs from different directories can share a file stem (`one/cat.png`,
/// `two/cat.png`). The first keeps it; later ones become `cat-2`, `cat-3`,
/// and so on, skipping any name another input already owns. Comparison
/// ignores case so the names stay distinct on case-insensitive filesystems.
pub fn batch_output_bases(paths: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = paths.iter().map(|p| base_name_of(p)).collect();
    let mut claimed: HashSet<String> = stems.iter().map(|s| s.to_lowercase()).collect();
    let mut seen: HashSet<String> = HashSet::new();

    stems
        .iter()
        .map(|stem| {
            if seen.insert(stem.to_lowercase()) {
                return stem.clone();
            }
            let mut n = 2;
            loop {
                let candidate = format!("{stem}-{n}");
                if claimed.insert(candidate.to_lowercase()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

/// Process many inputs in parallel with the system encoders.
pub fn process_batch(
    paths: &[PathBuf],
    output_dir: &Path,
    settings: &PipelineSettings,
    mode: Mode,
    timeout: Option<Duration>,
    events: Option<Sender<ProcessEvent>>,
) -> Vec<BatchItem> {
    let runner = SystemRunner::new(timeout);
    process_batch_with_runner(&runner, paths, output_dir, settings, mode, events)
}

/// Process many inputs in parallel using a specific runner.
///
/// Results keep the order of `paths`. One input failing does not stop the
/// others. Events are emitted as each input finishes, so their order is
/// completion order. Output names are made unique across the batch with
/// [`batch_output_bases`] before anything runs.
pub fn process_batch_with_runner(
    runner: &impl CommandRunner,
    paths: &[PathBuf],
    output_dir: &Path,
    settings: &PipelineSettings,
    mode: Mode,
    events: Option<Sender<ProcessEvent>>,
) -> Vec<BatchItem> {
    if let Some(tx) = &events {
        tx.send(ProcessEvent::BatchStarted {
            total: paths.len(),
            mode,
        })
        .ok();
    }

    let bases = batch_output_bases(paths);
    for (path, base) in paths.iter().zip(&bases) {
        if *base != base_name_of(path) {
            log::warn!(
                "{}: output name already used in this batch, writing as {}",
                path.display(),
                base
            );
        }
    }

    paths
        .par_iter()
        .zip(bases.par_iter())
        .enumerate()
        .map_with(events, |events, (i, (path, base))| {
            let outcome = run_one(runner, path, base, output_dir, settings, mode);
            if let Some(tx) = events {
                let source_path = path.display().to_string();
                let event = match &outcome {
                    Ok(processed) => ProcessEvent::ImageProcessed {
                        index: i + 1,
                        source_path,
                        tier: processed.tier,
                        artifact: processed.artifact.clone(),
                    },
                    Err(e) => ProcessEvent::ImageFailed {
                        index: i + 1,
                        source_path,
                        error: e.to_string(),
                    },
                };
                tx.send(event).ok();
            }
            BatchItem {
                source_path: path.clone(),
                outcome,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockRunner;
    use crate::imaging::codec::tests::synthetic_bytes;
    use image::{ImageFormat, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn write_source(dir: &Path, name: &str, bytes: &[u8]) -> SourceImage {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        SourceImage::open(&path).unwrap()
    }

    fn png_source(dir: &Path, name: &str, width: u32, height: u32) -> SourceImage {
        write_source(dir, name, &synthetic_bytes(width, height, ImageFormat::Png))
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    // =========================================================================
    // Full processing
    // =========================================================================

    #[test]
    fn png_encodes_to_avif() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let source = png_source(tmp.path(), "cat.png", 64, 48);
        let runner = MockRunner::new().with_output_size(10);

        let processed =
            process_image_with_runner(&runner, &source, &out, &PipelineSettings::default())
                .unwrap();

        assert_eq!(processed.tier, Tier::Primary);
        assert_eq!(processed.artifact.output_filename, "cat.avif");
        assert_eq!(
            processed.stages,
            vec![
                Stage::Received,
                Stage::Decoding,
                Stage::Resizing,
                Stage::EncodingPrimary,
                Stage::Done
            ]
        );
        assert_eq!(runner.programs(), vec!["ffmpeg"]);
        // Intermediate JPEG is gone, only the output remains
        assert_eq!(dir_names(&out), vec!["cat.avif"]);
    }

    #[test]
    fn intermediate_name_carries_token() {
        let tmp = TempDir::new().unwrap();
        let source = png_source(tmp.path(), "cat.png", 16, 16);
        let runner = MockRunner::new();

        process_image_with_runner(&runner, &source, tmp.path(), &PipelineSettings::default())
            .unwrap();

        let input = runner.get_operations()[0].flag_value("-i").unwrap();
        let name = Path::new(&input).file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("cat-"));
        assert!(name.ends_with("-temp.jpg"));
        assert_eq!(name.len(), "cat-".len() + 16 + "-temp.jpg".len());
    }

    #[test]
    fn primary_failure_on_png_falls_back_to_jpeg() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let source = png_source(tmp.path(), "cat.png", 64, 48);
        let runner = MockRunner::failing(&["ffmpeg"]);

        let processed =
            process_image_with_runner(&runner, &source, &out, &PipelineSettings::default())
                .unwrap();

        assert_eq!(processed.tier, Tier::Fallback);
        assert_eq!(processed.artifact.output_filename, "cat.jpg");
        assert_eq!(
            processed.stages,
            vec![
                Stage::Received,
                Stage::Decoding,
                Stage::Resizing,
                Stage::EncodingPrimary,
                Stage::EncodingFallback,
                Stage::Done
            ]
        );

        // Extension matches content
        let bytes = fs::read(out.join("cat.jpg")).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(dir_names(&out), vec!["cat.jpg"]);
    }

    #[test]
    fn fallback_ratio_uses_actual_sizes() {
        let tmp = TempDir::new().unwrap();
        let source = png_source(tmp.path(), "cat.png", 32, 32);
        let runner = MockRunner::failing(&["ffmpeg"]);

        let processed =
            process_image_with_runner(&runner, &source, tmp.path(), &PipelineSettings::default())
                .unwrap();

        let written = fs::metadata(tmp.path().join("cat.jpg")).unwrap().len();
        assert_eq!(processed.artifact.byte_len, written);
        assert_eq!(
            processed.artifact.compression_ratio_percent,
            crate::report::compression_ratio(source.byte_len, written)
        );
    }

    #[test]
    fn heic_goes_to_converter_only() {
        let tmp = TempDir::new().unwrap();
        let source = write_source(tmp.path(), "IMG_0001.HEIC", b"not really heic");
        let runner = MockRunner::new();

        let processed =
            process_image_with_runner(&runner, &source, tmp.path(), &PipelineSettings::default())
                .unwrap();

        assert_eq!(processed.tier, Tier::ContainerConvert);
        assert_eq!(processed.artifact.output_filename, "IMG_0001.jpg");
        assert_eq!(
            processed.stages,
            vec![
                Stage::Received,
                Stage::Decoding,
                Stage::ContainerConvert,
                Stage::Done
            ]
        );
        assert_eq!(runner.programs(), vec!["magick"]);
    }

    #[test]
    fn heic_retries_with_alternate_converter() {
        let tmp = TempDir::new().unwrap();
        let source = write_source(tmp.path(), "a.heif", b"x");
        let runner = MockRunner::failing(&["magick"]);

        let processed =
            process_image_with_runner(&runner, &source, tmp.path(), &PipelineSettings::default())
                .unwrap();

        assert_eq!(processed.artifact.output_filename, "a.jpg");
        assert_eq!(runner.programs(), vec!["magick", "convert"]);
    }

    #[test]
    fn heic_failure_is_terminal_without_fallback() {
        let tmp = TempDir::new().unwrap();
        let source = write_source(tmp.path(), "a.heic", b"x");
        let runner = MockRunner::failing(&["magick", "convert", "ffmpeg"]);

        let err =
            process_image_with_runner(&runner, &source, tmp.path(), &PipelineSettings::default())
                .unwrap_err();

        assert!(matches!(err, ProcessError::ContainerConversionFailed(_)));
        assert!(err.to_string().contains("convert"));
        // Two converter attempts, never the AV1 encoder
        assert_eq!(runner.programs(), vec!["magick", "convert"]);
        assert!(!tmp.path().join("a.jpg").exists());
    }

    #[test]
    fn half_written_conversion_is_not_left_behind() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let source = write_source(tmp.path(), "a.heic", b"x");
        let runner = MockRunner::failing(&["magick", "convert"]).writing_partial_output();

        let err = process_image_with_runner(&runner, &source, &out, &PipelineSettings::default())
            .unwrap_err();

        assert!(matches!(err, ProcessError::ContainerConversionFailed(_)));
        assert!(dir_names(&out).is_empty());
    }

    #[test]
    fn half_written_avif_is_replaced_by_fallback() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let source = png_source(tmp.path(), "cat.png", 16, 16);
        let runner = MockRunner::failing(&["ffmpeg"]).writing_partial_output();

        let processed =
            process_image_with_runner(&runner, &source, &out, &PipelineSettings::default())
                .unwrap();

        assert_eq!(processed.tier, Tier::Fallback);
        assert_eq!(dir_names(&out), vec!["cat.jpg"]);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let source = write_source(tmp.path(), "cat.gif", b"GIF89a");
        let runner = MockRunner::new();

        let err =
            process_image_with_runner(&runner, &source, tmp.path(), &PipelineSettings::default())
                .unwrap_err();

        assert!(matches!(err, ProcessError::UnsupportedFormat(_)));
        assert!(runner.get_operations().is_empty());
    }

    #[test]
    fn undecodable_bytes_are_unsupported_format() {
        let tmp = TempDir::new().unwrap();
        let source = write_source(tmp.path(), "cat.png", b"definitely not a png");
        let runner = MockRunner::new();

        let err =
            process_image_with_runner(&runner, &source, tmp.path(), &PipelineSettings::default())
                .unwrap_err();

        assert!(matches!(err, ProcessError::UnsupportedFormat(_)));
        assert!(runner.get_operations().is_empty());
    }

    #[test]
    fn fallback_failure_is_terminal() {
        let tmp = TempDir::new().unwrap();
        let source = png_source(tmp.path(), "cat.png", 16, 16);
        let out = tmp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        // A directory where the fallback wants to write its file
        fs::create_dir_all(out.join("cat.jpg")).unwrap();
        let runner = MockRunner::failing(&["ffmpeg"]);

        let err = process_image_with_runner(&runner, &source, &out, &PipelineSettings::default())
            .unwrap_err();

        assert!(matches!(err, ProcessError::FallbackEncodeFailed(_)));
    }

    #[test]
    fn missing_output_dir_is_created() {
        let tmp = TempDir::new().unwrap();
        let source = png_source(tmp.path(), "cat.png", 8, 8);
        let out = tmp.path().join("a").join("b");

        process_image_with_runner(&MockRunner::new(), &source, &out, &PipelineSettings::default())
            .unwrap();

        assert!(out.join("cat.avif").exists());
    }

    // =========================================================================
    // Large-input scenario
    // =========================================================================

    fn large_source(dir: &Path) -> SourceImage {
        let path = dir.join("panorama.png");
        RgbImage::new(6000, 3000).save(&path).unwrap();
        SourceImage {
            path,
            format: SourceFormat::Png,
            byte_len: 5_000_000,
        }
    }

    #[test]
    fn large_png_gets_bitrate_ceiling() {
        let tmp = TempDir::new().unwrap();
        let source = large_source(tmp.path());
        let out = tmp.path().join("out");
        let runner = MockRunner::new().with_output_size(1_000_000);

        let processed =
            process_image_with_runner(&runner, &source, &out, &PipelineSettings::default())
                .unwrap();

        let ops = runner.get_operations();
        assert_eq!(ops[0].flag_value("-b:v").as_deref(), Some("1200000k"));
        assert_eq!(processed.artifact.output_filename, "panorama.avif");
        assert_eq!(processed.artifact.compression_ratio_percent, 80.0);
    }

    #[test]
    fn large_png_fallback_is_bounded() {
        let tmp = TempDir::new().unwrap();
        let source = large_source(tmp.path());
        let out = tmp.path().join("out");
        let runner = MockRunner::failing(&["ffmpeg"]);

        let processed =
            process_image_with_runner(&runner, &source, &out, &PipelineSettings::default())
                .unwrap();

        assert_eq!(processed.artifact.output_filename, "panorama.jpg");
        let written = image::open(out.join("panorama.jpg")).unwrap();
        assert_eq!((written.width(), written.height()), (3840, 1920));
        let len = fs::metadata(out.join("panorama.jpg")).unwrap().len();
        assert_eq!(
            processed.artifact.compression_ratio_percent,
            crate::report::compression_ratio(5_000_000, len)
        );
    }

    // =========================================================================
    // Thumbnails
    // =========================================================================

    #[test]
    fn thumbnail_of_png() {
        let tmp = TempDir::new().unwrap();
        let source = png_source(tmp.path(), "cat.png", 400, 300);
        let runner = MockRunner::new();

        let processed =
            create_thumbnail_with_runner(&runner, &source, tmp.path(), &PipelineSettings::default())
                .unwrap();

        assert_eq!(processed.artifact.output_filename, "cat-thumbnail.avif");
        let ops = runner.get_operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].flag_value("-b:v"), None);
        let input = ops[0].flag_value("-i").unwrap();
        assert!(input.ends_with("-thumbnail-temp.jpg"));
        assert!(!Path::new(&input).exists());
    }

    #[test]
    fn thumbnail_rejects_heic_before_reading() {
        let tmp = TempDir::new().unwrap();
        // The file does not exist: rejection must not touch it
        let source = SourceImage {
            path: tmp.path().join("IMG_0001.heic"),
            format: SourceFormat::Heic,
            byte_len: 0,
        };
        let runner = MockRunner::new();

        let err =
            create_thumbnail_with_runner(&runner, &source, tmp.path(), &PipelineSettings::default())
                .unwrap_err();

        assert!(matches!(err, ProcessError::UnsupportedForThumbnail(_)));
        assert!(runner.get_operations().is_empty());
    }

    #[test]
    fn thumbnail_encoder_failure_has_no_fallback() {
        let tmp = TempDir::new().unwrap();
        let source = png_source(tmp.path(), "cat.png", 50, 50);
        let runner = MockRunner::failing(&["ffmpeg"]);

        let err =
            create_thumbnail_with_runner(&runner, &source, tmp.path(), &PipelineSettings::default())
                .unwrap_err();

        assert!(matches!(err, ProcessError::EncodeFailed(_)));
        assert_eq!(dir_names(tmp.path()), vec!["cat.png"]);
    }

    // =========================================================================
    // Batch
    // =========================================================================

    #[test]
    fn batch_keeps_order_and_isolates_failures() {
        let tmp = TempDir::new().unwrap();
        let a = png_source(tmp.path(), "a.png", 8, 8).path;
        let b = write_source(tmp.path(), "b.png", b"broken").path;
        let c = write_source(tmp.path(), "c.heic", b"x").path;
        let out = tmp.path().join("out");
        let runner = MockRunner::new();
        let (tx, rx) = std::sync::mpsc::channel();

        let items = process_batch_with_runner(
            &runner,
            &[a.clone(), b.clone(), c.clone()],
            &out,
            &PipelineSettings::default(),
            Mode::Compress,
            Some(tx),
        );

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].source_path, a);
        assert!(items[0].outcome.is_ok());
        assert!(matches!(
            items[1].outcome,
            Err(ProcessError::UnsupportedFormat(_))
        ));
        assert_eq!(items[2].outcome.as_ref().unwrap().tier, Tier::ContainerConvert);

        let events: Vec<ProcessEvent> = rx.iter().collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[0],
            ProcessEvent::BatchStarted { total: 3, mode: Mode::Compress }
        ));
        let failed = events
            .iter()
            .filter(|e| matches!(e, ProcessEvent::ImageFailed { index: 2, .. }))
            .count();
        assert_eq!(failed, 1);
    }

    #[test]
    fn batch_same_base_name_does_not_share_temp() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("one");
        let second = tmp.path().join("two");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        let a = png_source(&first, "cat.png", 8, 8).path;
        let b = png_source(&second, "cat.png", 8, 8).path;
        let runner = MockRunner::new();

        process_batch_with_runner(
            &runner,
            &[a, b],
            &tmp.path().join("out"),
            &PipelineSettings::default(),
            Mode::Thumbnail,
            None,
        );

        let inputs: HashSet<String> = runner
            .get_operations()
            .iter()
            .map(|op| op.flag_value("-i").unwrap())
            .collect();
        assert_eq!(inputs.len(), 2);
        assert_eq!(
            dir_names(&tmp.path().join("out")),
            vec!["cat-2-thumbnail.avif", "cat-thumbnail.avif"]
        );
    }

    fn same_named_pair(dir: &Path) -> [PathBuf; 2] {
        let first = dir.join("one");
        let second = dir.join("two");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        [
            png_source(&first, "cat.png", 8, 8).path,
            png_source(&second, "cat.png", 64, 64).path,
        ]
    }

    #[test]
    fn batch_same_base_name_fallbacks_both_land_on_disk() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let runner = MockRunner::failing(&["ffmpeg"]);

        let items = process_batch_with_runner(
            &runner,
            &same_named_pair(tmp.path()),
            &out,
            &PipelineSettings::default(),
            Mode::Compress,
            None,
        );

        let first = &items[0].outcome.as_ref().unwrap().artifact;
        let second = &items[1].outcome.as_ref().unwrap().artifact;
        assert_eq!(first.output_filename, "cat.jpg");
        assert_eq!(second.output_filename, "cat-2.jpg");
        assert_eq!(dir_names(&out), vec!["cat-2.jpg", "cat.jpg"]);
        // Each artifact describes the file it actually wrote
        for artifact in [first, second] {
            let on_disk = fs::metadata(out.join(&artifact.output_filename)).unwrap().len();
            assert_eq!(artifact.byte_len, on_disk);
        }
        let small = image::open(out.join("cat.jpg")).unwrap();
        let large = image::open(out.join("cat-2.jpg")).unwrap();
        assert_eq!((small.width(), large.width()), (8, 64));
    }

    #[test]
    fn batch_same_base_name_avifs_do_not_overwrite() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let runner = MockRunner::new();

        let items = process_batch_with_runner(
            &runner,
            &same_named_pair(tmp.path()),
            &out,
            &PipelineSettings::default(),
            Mode::Compress,
            None,
        );

        assert!(items.iter().all(|item| item.outcome.is_ok()));
        assert_eq!(dir_names(&out), vec!["cat-2.avif", "cat.avif"]);
        let outputs: HashSet<PathBuf> = runner
            .get_operations()
            .into_iter()
            .map(|op| op.output)
            .collect();
        assert_eq!(outputs.len(), 2);
    }

    #[test]
    fn output_bases_skip_names_other_inputs_own() {
        let paths: Vec<PathBuf> = [
            "a/cat.png",
            "b/cat.png",
            "c/cat-2.png",
            "d/Cat.jpg",
            "e/dog.webp",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();

        assert_eq!(
            batch_output_bases(&paths),
            vec!["cat", "cat-3", "cat-2", "Cat-4", "dog"]
        );
    }

    #[test]
    fn output_bases_leave_distinct_names_alone() {
        let paths = vec![PathBuf::from("x/a.png"), PathBuf::from("x/b.png")];
        assert_eq!(batch_output_bases(&paths), vec!["a", "b"]);
    }

    #[test]
    fn missing_input_is_io_failure() {
        let tmp = TempDir::new().unwrap();
        let err = run_one(
            &MockRunner::new(),
            &tmp.path().join("gone.png"),
            "gone",
            tmp.path(),
            &PipelineSettings::default(),
            Mode::Compress,
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::Io(_)));
    }
}
