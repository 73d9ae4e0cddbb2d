//! Convenience helpers for loading and saving images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::image::{ops, Image, ImageView};
use crate::util::{KeyMatchError, KeyMatchResult};
use std::path::Path;

/// Creates a borrowed view from a grayscale image buffer.
pub fn view_from_gray_image(img: &image::GrayImage) -> KeyMatchResult<ImageView<'_, u8>> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    ImageView::from_slice(img.as_raw(), width, height)
}

/// Converts a dynamic image to a grayscale float image in `[0, 1]`.
pub fn image_from_dynamic(img: &image::DynamicImage) -> KeyMatchResult<Image> {
    let gray = img.to_luma8();
    Image::from_view_u8(view_from_gray_image(&gray)?)
}

/// Loads an image from disk as grayscale in `[0, 1]`.
pub fn load_image<P: AsRef<Path>>(path: P) -> KeyMatchResult<Image> {
    let img = image::open(path).map_err(|err| KeyMatchError::ImageIo {
        reason: err.to_string(),
    })?;
    image_from_dynamic(&img)
}

/// Writes a single-channel image as 8-bit grayscale after min-max normalization.
pub fn save_image<P: AsRef<Path>>(path: P, img: &Image) -> KeyMatchResult<()> {
    img.ensure_gray()?;
    let bytes = ops::to_u8(&ops::normalize_min_max(img));
    let buffer = image::GrayImage::from_raw(img.width() as u32, img.height() as u32, bytes)
        .ok_or(KeyMatchError::BufferTooSmall {
            needed: img.width() * img.height(),
            got: img.data().len(),
        })?;
    buffer.save(path).map_err(|err| KeyMatchError::ImageIo {
        reason: err.to_string(),
    })
}
