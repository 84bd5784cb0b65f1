//! Pure calculation functions for dimensions and encoder targets.
//!
//! All functions here are pure and testable without any I/O or images.

/// Longest edge allowed for fully processed images.
pub const DEFAULT_MAX_DIMENSION: u32 = 3840;

/// Edge length of generated square thumbnails.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 240;

/// Calculate the dimensions an image should have after bounding it to `bound`.
///
/// Returns `None` when no resize is needed (`max(width, height) <= bound`).
/// Otherwise the longer edge becomes exactly `bound` and the other edge is
/// `round(other * bound / longer)`, never less than 1.
///
/// # Examples
/// ```
/// # use imgpress::imaging::calculate_max_dimension_fit;
/// assert_eq!(calculate_max_dimension_fit((6000, 3000), 3840), Some((3840, 1920)));
/// assert_eq!(calculate_max_dimension_fit((1920, 1080), 3840), None);
/// ```
pub fn calculate_max_dimension_fit(source: (u32, u32), bound: u32) -> Option<(u32, u32)> {
    let (w, h) = source;
    let longer = w.max(h);
    if longer <= bound {
        return None;
    }

    let scale = |other: u32| -> u32 {
        ((other as f64 * bound as f64 / longer as f64).round() as u32).max(1)
    };

    if w > h {
        // Landscape: width is bounded
        Some((bound, scale(h)))
    } else {
        // Portrait or square: height is bounded
        Some((scale(w), bound))
    }
}

/// A square region inside an image, by top-left corner and side length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

/// Compute the centered square crop for a thumbnail.
///
/// The side is the short edge. The box is centered on
/// `(floor(w/2), floor(h/2))` and clamped so it never leaves the image even
/// when the integer halves don't line up.
pub fn calculate_centered_square_crop(source: (u32, u32)) -> CropRect {
    let (w, h) = source;
    let short_side = w.min(h);
    let half = short_side / 2;

    let x = (w / 2).saturating_sub(half);
    let y = (h / 2).saturating_sub(half);
    let size = short_side.min(w - x).min(h - y);

    CropRect { x, y, size }
}

/// Target AV1 bitrate in kbps derived from the source file size.
///
/// `round(original_bytes * 0.3 * 8 / 10)`. The constants are kept exactly
/// as they have always been so outputs stay comparable across versions.
pub fn calculate_target_bitrate_kbps(original_bytes: u64) -> u64 {
    (original_bytes as f64 * 0.3 * 8.0 / 10.0).round() as u64
}

/// The bitrate as the `-b:v` argument string, e.g. `"1200000k"`.
pub fn format_bitrate(kbps: u64) -> String {
    format!("{}k", kbps)
}
