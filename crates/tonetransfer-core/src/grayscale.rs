//! Grayscale reduction for the face locator.
//!
//! Face detectors work on a single luma channel. The reduction uses the
//! ITU-R BT.601 weights that cascade classifiers are trained against.

use image::{GrayImage, Luma};

use crate::decode::Raster;

/// ITU-R BT.601 coefficient for the red channel.
pub const LUMA_R: f32 = 0.299;

/// ITU-R BT.601 coefficient for the green channel.
pub const LUMA_G: f32 = 0.587;

/// ITU-R BT.601 coefficient for the blue channel.
pub const LUMA_B: f32 = 0.114;

/// Luma of a single u8 RGB triple, rounded to the nearest integer.
#[inline]
pub fn luma_u8(r: u8, g: u8, b: u8) -> u8 {
    let y = LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32;
    y.clamp(0.0, 255.0).round() as u8
}

/// Reduce an RGB raster to a grayscale image of the same size.
pub fn to_grayscale(image: &Raster) -> GrayImage {
    let mut gray = GrayImage::new(image.width, image.height);
    for (dst, src) in gray.pixels_mut().zip(image.pixels.chunks_exact(3)) {
        *dst = Luma([luma_u8(src[0], src[1], src[2])]);
    }
    gray
}
