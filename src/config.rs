//! Configuration module.
//!
//! Handles loading, validating, and merging `imgpress.toml`. Stock defaults
//! are overridden by whatever a user file specifies; everything else keeps
//! its default.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [images]
//! max_dimension = 3840      # Longest edge of processed images
//! jpeg_quality = 100        # Intermediate and fallback JPEG quality (1-100)
//!
//! [thumbnails]
//! size = 240                # Edge of the square thumbnail
//!
//! [encoder]
//! program = "ffmpeg"
//! codec = "libaom-av1"
//! crf = 4                   # 0-63, lower is better
//! thumbnail_crf = 4
//! cpu_used = 1              # Speed preset, 0 (slowest) - 8
//! tile_columns = 2
//! tile_rows = 2
//! row_mt = true
//!
//! [converter]
//! program = "magick"
//! alternate_program = "convert"
//! max_dimension = 1248
//! quality = 90
//!
//! [processing]
//! max_processes = 4         # Max parallel pipelines (omit for auto = CPU cores)
//! command_timeout_secs = 300  # 0 disables the timeout
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [encoder]
//! cpu_used = 4
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{AvifSettings, ConvertSettings, PipelineSettings, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Name looked up in the working directory when `--config` is not given.
pub const CONFIG_FILENAME: &str = "imgpress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `imgpress.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Full-size processing settings.
    pub images: ImagesConfig,
    /// Thumbnail settings.
    pub thumbnails: ThumbnailsConfig,
    /// AV1 encoder invocation.
    pub encoder: EncoderConfig,
    /// HEIC/HEIF converter invocation.
    pub converter: ConverterConfig,
    /// Parallelism and subprocess limits.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "images.max_dimension must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(ConfigError::Validation(
                "images.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.thumbnails.size == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.size must be non-zero".into(),
            ));
        }
        if self.encoder.crf > 63 || self.encoder.thumbnail_crf > 63 {
            return Err(ConfigError::Validation(
                "encoder.crf and encoder.thumbnail_crf must be 0-63".into(),
            ));
        }
        if self.encoder.cpu_used > 8 {
            return Err(ConfigError::Validation(
                "encoder.cpu_used must be 0-8".into(),
            ));
        }
        if self.encoder.program.trim().is_empty()
            || self.converter.program.trim().is_empty()
            || self.converter.alternate_program.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "program names must not be empty".into(),
            ));
        }
        if self.converter.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "converter.max_dimension must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.converter.quality) {
            return Err(ConfigError::Validation(
                "converter.quality must be 1-100".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The imaging-level settings a pipeline run needs.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            max_dimension: self.images.max_dimension,
            thumbnail_size: self.thumbnails.size,
            jpeg_quality: Quality::new(self.images.jpeg_quality),
            avif: AvifSettings {
                program: self.encoder.program.clone(),
                codec: self.encoder.codec.clone(),
                crf: self.encoder.crf,
                thumbnail_crf: self.encoder.thumbnail_crf,
                cpu_used: self.encoder.cpu_used,
                tile_columns: self.encoder.tile_columns,
                tile_rows: self.encoder.tile_rows,
                row_mt: self.encoder.row_mt,
            },
            convert: ConvertSettings {
                program: self.converter.program.clone(),
                alternate_program: self.converter.alternate_program.clone(),
                max_dimension: self.converter.max_dimension,
                quality: Quality::new(self.converter.quality),
            },
        }
    }
}

/// Full-size processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Longest edge of processed images; larger inputs are scaled down.
    pub max_dimension: u32,
    /// Quality of the intermediate JPEG and of the fallback output.
    pub jpeg_quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_dimension: 3840,
            jpeg_quality: 100,
        }
    }
}

/// Thumbnail settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Edge length of the square thumbnail.
    pub size: u32,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self { size: 240 }
    }
}

/// AV1 encoder invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    pub program: String,
    pub codec: String,
    pub crf: u32,
    pub thumbnail_crf: u32,
    pub cpu_used: u32,
    pub tile_columns: u32,
    pub tile_rows: u32,
    pub row_mt: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        let stock = AvifSettings::default();
        Self {
            program: stock.program,
            codec: stock.codec,
            crf: stock.crf,
            thumbnail_crf: stock.thumbnail_crf,
            cpu_used: stock.cpu_used,
            tile_columns: stock.tile_columns,
            tile_rows: stock.tile_rows,
            row_mt: stock.row_mt,
        }
    }
}

/// HEIC/HEIF converter invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    pub program: String,
    pub alternate_program: String,
    pub max_dimension: u32,
    pub quality: u32,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        let stock = ConvertSettings::default();
        Self {
            program: stock.program,
            alternate_program: stock.alternate_program,
            max_dimension: stock.max_dimension,
            quality: stock.quality.value(),
        }
    }
}

/// Parallelism and subprocess limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of pipelines run in parallel.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Seconds an external program may run before it is killed.
    /// `0` disables the limit.
    pub command_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            command_timeout_secs: 300,
        }
    }
}

impl ProcessingConfig {
    pub fn command_timeout(&self) -> Option<Duration> {
        match self.command_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    // max_processes is None by default and simply omitted from the table.
    toml::Value::try_from(Config::default())
        .unwrap_or_else(|_| toml::Value::Table(Default::default()))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults if it is absent.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Load config from an explicit path, which must exist.
pub fn load_config_required(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("config file not found: {}", path.display()),
        )));
    }
    load_config(path)
}

/// Returns a fully-commented stock `imgpress.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgpress configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Full-size processing
# ---------------------------------------------------------------------------
[images]
# Longest edge of processed images. Larger inputs are scaled down so that
# their longer edge equals this value; smaller inputs are left alone.
max_dimension = 3840

# Quality (1-100) of the intermediate JPEG handed to the AV1 encoder, and of
# the in-process JPEG written when the encoder is unavailable.
jpeg_quality = 100

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Edge length of the square, center-cropped thumbnail.
size = 240

# ---------------------------------------------------------------------------
# AV1 encoder (AVIF output)
# ---------------------------------------------------------------------------
[encoder]
program = "ffmpeg"
codec = "libaom-av1"

# Constant rate factor, 0-63 (lower = higher quality, larger files).
crf = 4
thumbnail_crf = 4

# Speed preset, 0 (slowest, best) - 8 (fastest).
cpu_used = 1

# Tile and row parallelism inside the encoder.
tile_columns = 2
tile_rows = 2
row_mt = true

# ---------------------------------------------------------------------------
# HEIC/HEIF converter (JPEG output)
# ---------------------------------------------------------------------------
[converter]
program = "magick"
# Tried once if the first program fails.
alternate_program = "convert"
max_dimension = 1248
quality = 90

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel pipelines.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# Seconds an external program may run before it is killed. 0 = no limit.
command_timeout_secs = 300
"##
}
