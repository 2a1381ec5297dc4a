//! Cosmetic post-process applied after the color transfer.
//!
//! ## Order
//! 1. Contrast, factor `1 + contrast_gain * strength`
//! 2. Saturation, factor `1 + saturation_gain * strength`
//! 3. Unsharp mask (only when requested)
//!
//! Contrast pivots around the image's mean luma, saturation around each
//! pixel's own luma. Each step rounds back to 8 bits before the next one.
//! No step branches on image content.

use serde::{Deserialize, Serialize};

use crate::decode::Raster;
use crate::grayscale::luma_u8;
use crate::Strength;

/// Fixed-parameter unsharp mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnsharpMask {
    /// Gaussian blur sigma in pixels.
    pub radius: f32,
    /// Amount of the high-pass added back, in percent.
    pub percent: u32,
    /// Minimum absolute difference (0-255) before a channel is sharpened.
    pub threshold: u8,
}

impl Default for UnsharpMask {
    fn default() -> Self {
        Self {
            radius: 1.0,
            percent: 50,
            threshold: 1,
        }
    }
}

/// Gains of the cosmetic pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolishParams {
    pub contrast_gain: f32,
    pub saturation_gain: f32,
    pub sharpen: UnsharpMask,
}

impl Default for PolishParams {
    fn default() -> Self {
        Self {
            contrast_gain: 0.08,
            saturation_gain: 0.15,
            sharpen: UnsharpMask::default(),
        }
    }
}

impl PolishParams {
    pub fn contrast_factor(&self, strength: Strength) -> f32 {
        1.0 + self.contrast_gain * strength.value()
    }

    pub fn saturation_factor(&self, strength: Strength) -> f32 {
        1.0 + self.saturation_gain * strength.value()
    }
}

/// Apply the cosmetic pass and return a new raster.
///
/// # Example
/// ```ignore
/// let out = polish(&rgb, Strength::new(0.8), false, &PolishParams::default());
/// ```
pub fn polish(image: &Raster, strength: Strength, sharpen: bool, params: &PolishParams) -> Raster {
    let contrast = params.contrast_factor(strength);
    let saturation = params.saturation_factor(strength);
    let pivot = mean_luma(image);

    let mut out = image.clone();
    for chunk in out.pixels.chunks_exact_mut(3) {
        let px = apply_contrast([chunk[0], chunk[1], chunk[2]], pivot, contrast);
        let px = apply_saturation(px, saturation);
        chunk.copy_from_slice(&px);
    }

    if sharpen {
        out = apply_unsharp_mask(&out, &params.sharpen);
    }
    out
}

/// Mean luma of the whole image, rounded to an integer level.
fn mean_luma(image: &Raster) -> f32 {
    let n = image.pixel_count();
    if n == 0 {
        return 0.0;
    }
    let sum: u64 = image
        .pixels
        .chunks_exact(3)
        .map(|p| luma_u8(p[0], p[1], p[2]) as u64)
        .sum();
    (sum as f64 / n as f64).round() as f32
}

#[inline]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Scale each channel's distance from `pivot`.
///
/// Formula: `output = pivot + (input - pivot) * factor`
#[inline]
fn apply_contrast(px: [u8; 3], pivot: f32, factor: f32) -> [u8; 3] {
    px.map(|c| to_u8(pivot + (c as f32 - pivot) * factor))
}

/// Scale each channel's distance from the pixel's own luma.
///
/// Formula: `output = luma + (input - luma) * factor`
#[inline]
fn apply_saturation(px: [u8; 3], factor: f32) -> [u8; 3] {
    let gray = luma_u8(px[0], px[1], px[2]) as f32;
    px.map(|c| to_u8(gray + (c as f32 - gray) * factor))
}

/// Add back `percent` of the difference to a Gaussian-blurred copy,
/// skipping channels whose difference is below `threshold`.
fn apply_unsharp_mask(image: &Raster, mask: &UnsharpMask) -> Raster {
    if mask.percent == 0 || mask.radius <= 0.0 {
        return image.clone();
    }
    debug_assert_eq!(
        image.pixels.len(),
        image.pixel_count() * 3,
        "pixel buffer does not match raster dimensions"
    );
    // Rasters from `to_rgb` are always well formed; a hand-built malformed
    // one is passed through unsharpened in release builds.
    let Some(src) = image.to_rgb_image() else {
        tracing::warn!(
            width = image.width,
            height = image.height,
            len = image.pixels.len(),
            "malformed raster, skipping unsharp mask"
        );
        return image.clone();
    };
    let blurred = image::imageops::blur(&src, mask.radius);

    let amount = mask.percent as f32 / 100.0;
    let threshold = mask.threshold as i32;
    let pixels = src
        .as_raw()
        .iter()
        .zip(blurred.as_raw())
        .map(|(&s, &b)| {
            let diff = s as i32 - b as i32;
            if diff.abs() < threshold {
                s
            } else {
                to_u8(s as f32 + diff as f32 * amount)
            }
        })
        .collect();

    Raster::new(image.width, image.height, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(r: u8, g: u8, b: u8) -> Raster {
        Raster::new(1, 1, vec![r, g, b])
    }

    fn spread(px: [u8; 3]) -> i32 {
        *px.iter().max().unwrap() as i32 - *px.iter().min().unwrap() as i32
    }

    // ===== Identity Tests =====

    #[test]
    fn test_zero_strength_is_identity() {
        let img = Raster::new(2, 1, vec![200, 30, 90, 10, 250, 128]);
        let out = polish(&img, Strength::new(0.0), false, &PolishParams::default());
        assert_eq!(out, img, "Strength 0 without sharpening should not change pixels");
    }

    #[test]
    fn test_gray_image_unchanged() {
        let img = Raster::filled(8, 8, [128, 128, 128]);
        let out = polish(&img, Strength::new(1.0), false, &PolishParams::default());
        assert_eq!(out, img);
    }

    #[test]
    fn test_black_and_white_stay_in_range() {
        for v in [0u8, 255] {
            let img = Raster::filled(4, 4, [v, v, v]);
            let out = polish(&img, Strength::new(1.0), true, &PolishParams::default());
            assert_eq!(out, img);
        }
    }

    // ===== Factor Tests =====

    #[test]
    fn test_factors_scale_with_strength() {
        let params = PolishParams::default();
        assert_eq!(params.contrast_factor(Strength::new(0.0)), 1.0);
        assert!((params.contrast_factor(Strength::new(1.0)) - 1.08).abs() < 1e-6);
        assert!((params.saturation_factor(Strength::new(0.5)) - 1.075).abs() < 1e-6);
    }

    // ===== Contrast Tests =====

    #[test]
    fn test_contrast_pushes_away_from_mean() {
        // Half dark, half bright; mean luma is in between.
        let mut pixels = vec![60u8; 2 * 3];
        pixels.extend_from_slice(&[200u8; 2 * 3]);
        let img = Raster::new(4, 1, pixels);

        let params = PolishParams {
            saturation_gain: 0.0,
            ..Default::default()
        };
        let out = polish(&img, Strength::new(1.0), false, &params);
        assert!(out.pixels[0] < 60, "Dark pixel should get darker");
        assert!(out.pixels[9] > 200, "Bright pixel should get brighter");
    }

    #[test]
    fn test_contrast_formula() {
        assert_eq!(apply_contrast([100, 150, 200], 150.0, 2.0), [50, 150, 250]);
        assert_eq!(apply_contrast([0, 255, 10], 128.0, 3.0), [0, 255, 0]);
    }

    // ===== Saturation Tests =====

    #[test]
    fn test_saturation_increases_spread() {
        let img = pixel(200, 128, 100);
        let params = PolishParams {
            contrast_gain: 0.0,
            saturation_gain: 0.5,
            ..Default::default()
        };
        let out = polish(&img, Strength::new(1.0), false, &params);
        let out_px = out.pixel(0, 0);
        assert!(spread(out_px) > spread([200, 128, 100]));
    }

    #[test]
    fn test_saturation_keeps_gray() {
        assert_eq!(apply_saturation([90, 90, 90], 1.5), [90, 90, 90]);
    }

    // ===== Sharpen Tests =====

    #[test]
    fn test_sharpen_flat_image_is_noop() {
        let img = Raster::filled(16, 16, [90, 140, 60]);
        let out = apply_unsharp_mask(&img, &UnsharpMask::default());
        for (got, want) in out.pixels.iter().zip(&img.pixels) {
            assert!((*got as i32 - *want as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_sharpen_increases_edge_contrast() {
        let mut pixels = Vec::new();
        for _y in 0..8 {
            for x in 0..8 {
                let v = if x < 4 { 80 } else { 180 };
                pixels.extend_from_slice(&[v, v, v]);
            }
        }
        let img = Raster::new(8, 8, pixels);
        let out = apply_unsharp_mask(&img, &UnsharpMask::default());

        // Just left of the edge gets darker, just right gets brighter.
        assert!(out.pixel(3, 4)[0] < 80);
        assert!(out.pixel(4, 4)[0] > 180);
    }

    #[test]
    fn test_sharpen_zero_percent_is_noop() {
        let img = Raster::new(2, 1, vec![0, 255, 0, 255, 0, 255]);
        let mask = UnsharpMask {
            percent: 0,
            ..Default::default()
        };
        assert_eq!(apply_unsharp_mask(&img, &mask), img);
    }

    #[test]
    fn test_sharpen_only_when_requested() {
        let mut pixels = vec![0u8; 4 * 3];
        pixels.extend_from_slice(&[255u8; 4 * 3]);
        let img = Raster::new(8, 1, pixels);
        let params = PolishParams {
            contrast_gain: 0.0,
            saturation_gain: 0.0,
            ..Default::default()
        };
        let off = polish(&img, Strength::new(1.0), false, &params);
        assert_eq!(off, img);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "pixel buffer does not match raster dimensions")]
    fn test_sharpen_rejects_malformed_raster() {
        let bad = Raster {
            width: 4,
            height: 4,
            pixels: vec![0; 10],
        };
        let _ = apply_unsharp_mask(&bad, &UnsharpMask::default());
    }

    // ===== Edge Case Tests =====

    #[test]
    fn test_mean_luma_empty() {
        assert_eq!(mean_luma(&Raster::new(0, 0, vec![])), 0.0);
    }

    #[test]
    fn test_inputs_untouched() {
        let img = Raster::new(2, 1, vec![10, 200, 30, 250, 5, 128]);
        let copy = img.clone();
        let _ = polish(&img, Strength::new(1.0), true, &PolishParams::default());
        assert_eq!(img, copy);
    }
}
