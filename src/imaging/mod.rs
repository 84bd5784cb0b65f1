//! Image processing: classification, pixel work and encoder adapters.
//!
//! | Operation | Crate / tool |
//! |---|---|
//! | **Classify** | extension table ([`classify`]) |
//! | **Decode** | `image` (PNG, JPEG, WebP) |
//! | **Resize / crop** | Lanczos3 via `image::imageops` |
//! | **Encode → AVIF** | external `ffmpeg` (libaom-av1) |
//! | **HEIC/HEIF → JPEG** | external `magick`, retried with `convert` |
//! | **Fallback → JPEG** | `image` JPEG encoder, in-process |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and bitrate math (unit testable)
//! - **Parameters**: Data structures describing what to produce
//! - **Backend**: [`CommandRunner`] trait + [`SystemRunner`] for external programs
//! - **Operations**: Resize and crop on decoded images
//! - **Adapters**: [`avif`], [`heic`], [`fallback`] turn parameters into files

pub mod avif;
pub mod backend;
mod calculations;
pub mod codec;
pub mod fallback;
mod format;
pub mod heic;
pub mod operations;
mod params;
pub mod system_runner;

pub use backend::{BackendError, CommandRunner, Invocation};
pub use calculations::{
    CropRect, DEFAULT_MAX_DIMENSION, DEFAULT_THUMBNAIL_SIZE, calculate_centered_square_crop,
    calculate_max_dimension_fit, calculate_target_bitrate_kbps, format_bitrate,
};
pub use format::{SourceFormat, accepted_extensions, classify};
pub use operations::{centered_square_crop, make_thumbnail, max_dimension_resize, thumbnail_resize};
pub use params::{
    AvifSettings, ConvertSettings, EncodeRequest, OutputContainer, PipelineSettings, Quality,
    RateControl,
};
pub use system_runner::SystemRunner;
