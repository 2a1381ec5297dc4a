//! Resampling the reference raster onto the target's pixel grid.
//!
//! All functions return new `Raster` instances without modifying the input.

use super::{DecodeError, FilterType, Raster};

/// Resize an image to exact dimensions.
///
/// # Errors
///
/// Returns `DecodeError::EmptyImage` for a zero target size and
/// `DecodeError::CorruptedFile` if the source buffer does not match its
/// dimensions.
pub fn resize(
    image: &Raster,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<Raster, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::EmptyImage { width, height });
    }

    if image.width == width && image.height == height {
        return Ok(image.clone());
    }

    let rgb_image = image
        .to_rgb_image()
        .ok_or_else(|| DecodeError::CorruptedFile("Pixel buffer does not match dimensions".to_string()))?;

    let resized = image::imageops::resize(&rgb_image, width, height, filter.to_image_filter());
    Ok(Raster::from_rgb_image(resized))
}

/// Resample `reference` so it has exactly the dimensions of `target`.
///
/// Aspect ratio is not preserved: statistics are computed over
/// same-shaped arrays, so the reference is stretched onto the target grid.
pub fn match_dimensions(
    reference: &Raster,
    target: &Raster,
    filter: FilterType,
) -> Result<Raster, DecodeError> {
    if reference.dimensions() != target.dimensions() {
        tracing::debug!(
            from_width = reference.width,
            from_height = reference.height,
            to_width = target.width,
            to_height = target.height,
            ?filter,
            "resampling reference to target size"
        );
    }
    resize(reference, target.width, target.height, filter)
}
