//! Conversion between RGB rasters and the 8-bit encoded CIE L*a*b* space.
//!
//! Values use the common 8-bit Lab encoding:
//!
//! - `L = L* * 255 / 100`, so lightness spans 0..=255
//! - `a = a* + 128` and `b = b* + 128`, so neutral grays sit at 128
//!
//! Planes are kept in `f32` between stages. Values may leave 0..=255 while
//! statistics are being matched; [`to_rgb`] clamps them back into the
//! encoded domain before inverting.

use palette::{FromColor, Lab, Srgb};

use crate::decode::Raster;

/// Neutral point of the encoded a/b channels.
pub const CHROMA_NEUTRAL: f32 = 128.0;

/// Scale from CIE L* (0..100) to the encoded lightness (0..255).
const L_SCALE: f32 = 255.0 / 100.0;

/// One channel of a [`LabImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    L,
    A,
    B,
}

impl Channel {
    /// The two chrominance channels, in order.
    pub const CHROMA: [Channel; 2] = [Channel::A, Channel::B];
}

/// A planar image in encoded Lab space with the same grid as its source.
#[derive(Debug, Clone, PartialEq)]
pub struct LabImage {
    pub width: u32,
    pub height: u32,
    /// Lightness plane, row-major.
    pub l: Vec<f32>,
    /// Green-red plane, row-major.
    pub a: Vec<f32>,
    /// Blue-yellow plane, row-major.
    pub b: Vec<f32>,
}

impl LabImage {
    /// An image where every pixel holds the same encoded Lab triple.
    pub fn filled(width: u32, height: u32, lab: [f32; 3]) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            l: vec![lab[0]; n],
            a: vec![lab[1]; n],
            b: vec![lab[2]; n],
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn plane(&self, channel: Channel) -> &[f32] {
        match channel {
            Channel::L => &self.l,
            Channel::A => &self.a,
            Channel::B => &self.b,
        }
    }

    pub fn plane_mut(&mut self, channel: Channel) -> &mut [f32] {
        match channel {
            Channel::L => &mut self.l,
            Channel::A => &mut self.a,
            Channel::B => &mut self.b,
        }
    }

    /// The encoded Lab triple at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let i = y as usize * self.width as usize + x as usize;
        [self.l[i], self.a[i], self.b[i]]
    }
}

/// Convert one u8 RGB triple to encoded Lab.
#[inline]
pub fn rgb_to_lab(r: u8, g: u8, b: u8) -> [f32; 3] {
    let srgb = Srgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let lab: Lab = Lab::from_color(srgb);
    [
        lab.l * L_SCALE,
        lab.a + CHROMA_NEUTRAL,
        lab.b + CHROMA_NEUTRAL,
    ]
}

/// Convert one encoded Lab triple to u8 RGB.
///
/// The input is clamped to 0..=255 per channel first; out-of-gamut results
/// are clipped to the sRGB cube. NaN lightness reads as black, NaN chroma
/// as neutral.
#[inline]
pub fn lab_to_rgb(lab: [f32; 3]) -> [u8; 3] {
    let l = clamp_encoded(lab[0], 0.0);
    let a = clamp_encoded(lab[1], CHROMA_NEUTRAL);
    let b = clamp_encoded(lab[2], CHROMA_NEUTRAL);
    let lab = Lab::new(l / L_SCALE, a - CHROMA_NEUTRAL, b - CHROMA_NEUTRAL);
    let srgb = Srgb::from_color(lab);
    [srgb.red, srgb.green, srgb.blue].map(unit_to_u8)
}

#[inline]
fn clamp_encoded(v: f32, nan_value: f32) -> f32 {
    if v.is_nan() {
        nan_value
    } else {
        v.clamp(0.0, 255.0)
    }
}

#[inline]
fn unit_to_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert an RGB raster to encoded Lab, pixel by pixel.
pub fn to_perceptual(image: &Raster) -> LabImage {
    let n = image.pixel_count();
    let mut out = LabImage {
        width: image.width,
        height: image.height,
        l: Vec::with_capacity(n),
        a: Vec::with_capacity(n),
        b: Vec::with_capacity(n),
    };

    for px in image.pixels.chunks_exact(3) {
        let [l, a, b] = rgb_to_lab(px[0], px[1], px[2]);
        out.l.push(l);
        out.a.push(a);
        out.b.push(b);
    }
    out
}

/// Convert an encoded Lab image back to an RGB raster, pixel by pixel.
pub fn to_rgb(image: &LabImage) -> Raster {
    let mut pixels = Vec::with_capacity(image.pixel_count() * 3);
    for ((&l, &a), &b) in image.l.iter().zip(&image.a).zip(&image.b) {
        pixels.extend_from_slice(&lab_to_rgb([l, a, b]));
    }
    Raster::new(image.width, image.height, pixels)
}
