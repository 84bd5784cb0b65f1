//! Format classification from file names.
//!
//! The extension alone decides which path an input takes through the
//! pipeline. Standard raster formats are decoded in-process; container
//! formats (HEIC/HEIF) cannot be read by the `image` crate build we ship,
//! so they are routed to the external converter instead.

use image::ImageFormat;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Format tag assigned to an input by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Png,
    Jpeg,
    Webp,
    Heic,
    Heif,
    Unsupported,
}

/// Extension table. Order matters only for [`accepted_extensions`] output.
const EXTENSIONS: &[(&str, SourceFormat)] = &[
    ("png", SourceFormat::Png),
    ("jpg", SourceFormat::Jpeg),
    ("jpeg", SourceFormat::Jpeg),
    ("webp", SourceFormat::Webp),
    ("heic", SourceFormat::Heic),
    ("heif", SourceFormat::Heif),
];

/// Classify a file name (or path) by its lowercased extension.
///
/// ```
/// # use imgpress::imaging::{classify, SourceFormat};
/// assert_eq!(classify("IMG_0001.HEIC"), SourceFormat::Heic);
/// assert_eq!(classify("photo.jpeg"), SourceFormat::Jpeg);
/// assert_eq!(classify("notes.txt"), SourceFormat::Unsupported);
/// ```
pub fn classify(name: impl AsRef<Path>) -> SourceFormat {
    let ext = match name.as_ref().extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return SourceFormat::Unsupported,
    };
    EXTENSIONS
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, format)| *format)
        .unwrap_or(SourceFormat::Unsupported)
}

/// Every extension the classifier maps to something other than `Unsupported`.
pub fn accepted_extensions() -> impl Iterator<Item = &'static str> {
    EXTENSIONS.iter().map(|(ext, _)| *ext)
}

impl SourceFormat {
    /// Container formats the in-process decoder cannot parse.
    pub fn is_container(self) -> bool {
        matches!(self, SourceFormat::Heic | SourceFormat::Heif)
    }

    /// The `image` crate format used to decode this tag, if any.
    pub fn image_format(self) -> Option<ImageFormat> {
        match self {
            SourceFormat::Png => Some(ImageFormat::Png),
            SourceFormat::Jpeg => Some(ImageFormat::Jpeg),
            SourceFormat::Webp => Some(ImageFormat::WebP),
            SourceFormat::Heic | SourceFormat::Heif | SourceFormat::Unsupported => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Png => "png",
            SourceFormat::Jpeg => "jpeg",
            SourceFormat::Webp => "webp",
            SourceFormat::Heic => "heic",
            SourceFormat::Heif => "heif",
            SourceFormat::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}
