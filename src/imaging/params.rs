//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. The orchestrator in
//! [`process`](crate::process) fills them in from configuration; the
//! adapters ([`avif`](super::avif), [`heic`](super::heic),
//! [`fallback`](super::fallback)) turn them into pixels or invocations.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG quality (1–100). Clamped on construction.
//! - [`OutputContainer`]: AVIF or JPEG, with the file extension it implies.
//! - [`RateControl`]: how the AV1 encoder is steered: adaptive bitrate
//!   ceiling or a fixed CRF.
//! - [`EncodeRequest`]: bound + rate control + container for one run.
//! - [`AvifSettings`] / [`ConvertSettings`]: how to call the external tools.

use super::calculations::{DEFAULT_MAX_DIMENSION, DEFAULT_THUMBNAIL_SIZE};

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Highest quality; used for the intermediate file and the fallback.
    pub fn max() -> Self {
        Self(100)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::max()
    }
}

/// Container of an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputContainer {
    Avif,
    Jpeg,
}

impl OutputContainer {
    pub fn extension(self) -> &'static str {
        match self {
            OutputContainer::Avif => "avif",
            OutputContainer::Jpeg => "jpg",
        }
    }
}

/// AV1 rate control for one encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControl {
    /// Fixed CRF plus a bitrate ceiling computed from the source size.
    TargetBitrate { kbps: u64 },
    /// Fixed CRF only.
    FixedQuality,
}

/// What one pipeline run is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeRequest {
    /// Longest edge allowed in the output.
    pub max_dimension: u32,
    pub rate: RateControl,
    pub container: OutputContainer,
}

impl EncodeRequest {
    /// Full processing: bounded to `max_dimension`, adaptive bitrate, AVIF.
    pub fn full(max_dimension: u32, kbps: u64) -> Self {
        Self {
            max_dimension,
            rate: RateControl::TargetBitrate { kbps },
            container: OutputContainer::Avif,
        }
    }

    /// Thumbnail: fixed square edge, fixed quality, AVIF.
    pub fn thumbnail(size: u32) -> Self {
        Self {
            max_dimension: size,
            rate: RateControl::FixedQuality,
            container: OutputContainer::Avif,
        }
    }

    /// Container conversion: the converter's bound, JPEG.
    pub fn container(max_dimension: u32) -> Self {
        Self {
            max_dimension,
            rate: RateControl::FixedQuality,
            container: OutputContainer::Jpeg,
        }
    }

    /// Fallback tier: same bound, in-process JPEG.
    pub fn fallback(max_dimension: u32) -> Self {
        Self {
            max_dimension,
            rate: RateControl::FixedQuality,
            container: OutputContainer::Jpeg,
        }
    }
}

/// How to invoke the AV1 encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvifSettings {
    pub program: String,
    pub codec: String,
    /// CRF for full processing (0–63, lower is better).
    pub crf: u32,
    /// CRF for thumbnails.
    pub thumbnail_crf: u32,
    /// Encoder speed preset (`-cpu-used`).
    pub cpu_used: u32,
    pub tile_columns: u32,
    pub tile_rows: u32,
    pub row_mt: bool,
}

impl Default for AvifSettings {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            codec: "libaom-av1".to_string(),
            crf: 4,
            thumbnail_crf: 4,
            cpu_used: 1,
            tile_columns: 2,
            tile_rows: 2,
            row_mt: true,
        }
    }
}

/// How to invoke the HEIC/HEIF converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertSettings {
    pub program: String,
    /// Tried once if `program` fails.
    pub alternate_program: String,
    /// Longest edge of the converted JPEG.
    pub max_dimension: u32,
    pub quality: Quality,
}

impl Default for ConvertSettings {
    fn default() -> Self {
        Self {
            program: "magick".to_string(),
            alternate_program: "convert".to_string(),
            max_dimension: 1248,
            quality: Quality::new(90),
        }
    }
}

/// Everything a pipeline run needs besides its input and output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub max_dimension: u32,
    pub thumbnail_size: u32,
    pub jpeg_quality: Quality,
    pub avif: AvifSettings,
    pub convert: ConvertSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            jpeg_quality: Quality::max(),
            avif: AvifSettings::default(),
            convert: ConvertSettings::default(),
        }
    }
}
