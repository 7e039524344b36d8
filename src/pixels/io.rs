//! Convenience helpers for loading and saving images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::pixels::OwnedPixels;
use crate::util::{MorphError, MorphResult};
use image::imageops::FilterType;
use std::path::Path;

/// Creates an owned RGBA image from an `image` buffer.
pub fn owned_from_rgba_image(img: &image::RgbaImage) -> MorphResult<OwnedPixels> {
    OwnedPixels::new(
        img.as_raw().clone(),
        img.width() as usize,
        img.height() as usize,
    )
}

/// Converts a dynamic image to RGBA, resampled to `width` x `height`.
///
/// Both inputs of a morph are resampled to the same size so their pixel
/// counts agree.
pub fn owned_from_dynamic_image(
    img: &image::DynamicImage,
    width: usize,
    height: usize,
) -> MorphResult<OwnedPixels> {
    let (w, h) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(MorphError::InvalidDimensions { width, height }),
    };
    let rgba = img.to_rgba8();
    if rgba.width() == w && rgba.height() == h {
        return owned_from_rgba_image(&rgba);
    }
    let resized = image::imageops::resize(&rgba, w, h, FilterType::Triangle);
    owned_from_rgba_image(&resized)
}

/// Loads an image from disk as RGBA resampled to `width` x `height`.
pub fn load_rgba_image<P: AsRef<Path>>(
    path: P,
    width: usize,
    height: usize,
) -> MorphResult<OwnedPixels> {
    let img = image::open(path).map_err(|err| MorphError::ImageIo {
        reason: err.to_string(),
    })?;
    owned_from_dynamic_image(&img, width, height)
}

/// Writes an RGBA image to disk; the format follows the file extension.
pub fn save_rgba_image<P: AsRef<Path>>(path: P, pixels: &OwnedPixels) -> MorphResult<()> {
    let (width, height) = (pixels.width(), pixels.height());
    let img = image::RgbaImage::from_raw(width as u32, height as u32, pixels.data().to_vec())
        .ok_or(MorphError::InvalidDimensions { width, height })?;
    img.save(path).map_err(|err| MorphError::ImageIo {
        reason: err.to_string(),
    })
}
