//! Resize and crop operations on decoded images.
//!
//! These functions combine the pure math in
//! [`calculations`](super::calculations) with pixel work from the `image`
//! crate. All resampling uses Lanczos3.

use super::calculations::{CropRect, calculate_centered_square_crop, calculate_max_dimension_fit};
use image::DynamicImage;
use image::imageops::FilterType;

/// Bound an image so neither edge exceeds `bound`.
///
/// Images already within the bound are returned untouched (no resample).
pub fn max_dimension_resize(img: DynamicImage, bound: u32) -> DynamicImage {
    match calculate_max_dimension_fit((img.width(), img.height()), bound) {
        Some((w, h)) => {
            log::debug!(
                "resizing {}x{} → {}x{}",
                img.width(),
                img.height(),
                w,
                h
            );
            img.resize_exact(w, h, FilterType::Lanczos3)
        }
        None => img,
    }
}

/// Cut the centered square out of an image.
///
/// Returns the cropped image together with the rectangle that was used.
pub fn centered_square_crop(img: &DynamicImage) -> (DynamicImage, CropRect) {
    let rect = calculate_centered_square_crop((img.width(), img.height()));
    let cropped = img.crop_imm(rect.x, rect.y, rect.size, rect.size);
    (cropped, rect)
}

/// Scale a (square) image to exactly `size` × `size`.
pub fn thumbnail_resize(img: &DynamicImage, size: u32) -> DynamicImage {
    img.resize_exact(size, size, FilterType::Lanczos3)
}

/// Crop to the centered square, then scale to `size` × `size`.
pub fn make_thumbnail(img: &DynamicImage, size: u32) -> DynamicImage {
    let (square, _) = centered_square_crop(img);
    thumbnail_resize(&square, size)
}
