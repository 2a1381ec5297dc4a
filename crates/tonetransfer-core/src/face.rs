//! Face regions and the pluggable face locator.
//!
//! Detection itself is not implemented here. A [`FaceLocator`] is injected
//! into the pipeline; the pipeline calls it once per image with a grayscale
//! reduction and picks the largest valid rectangle from what it returns.

use std::fmt;
use std::str::FromStr;

use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the rectangle is non-empty and lies fully inside an
    /// image of the given size.
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= image_width as u64
            && self.y as u64 + self.height as u64 <= image_height as u64
    }
}

impl fmt::Display for FaceRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for FaceRect {
    type Err = String;

    /// Parse `x,y,width,height`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return Err(format!(
                "face region must be in format x,y,width,height, got: {}",
                s
            ));
        }

        let field = |idx: usize, name: &str| {
            parts[idx]
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid {}: {}", name, parts[idx]))
        };

        let rect = FaceRect::new(field(0, "x")?, field(1, "y")?, field(2, "width")?, field(3, "height")?);
        if rect.width == 0 || rect.height == 0 {
            return Err(format!("face region must have non-zero size, got: {}", s));
        }
        Ok(rect)
    }
}

/// Tuning constants handed to the face locator.
///
/// These tune the detector, not the transfer math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorParams {
    /// Image pyramid scale step (>= 1.0).
    pub scale_factor: f64,
    /// Neighboring detections required to keep a candidate.
    pub min_neighbors: u32,
    /// Smallest face edge, in pixels.
    pub min_size: u32,
}

impl Default for LocatorParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.15,
            min_neighbors: 5,
            min_size: 100,
        }
    }
}

/// Pluggable face detection backend.
///
/// Implementations must be side-effect free; the pipeline calls `detect`
/// exactly once per input image per run and does not cache or retry.
/// Any closure with the same signature is a locator, which makes test
/// doubles trivial.
pub trait FaceLocator: Send + Sync {
    /// Detect faces in a grayscale image. May return an empty list.
    fn detect(&self, gray: &GrayImage, params: &LocatorParams) -> Vec<FaceRect>;
}

impl<F> FaceLocator for F
where
    F: Fn(&GrayImage, &LocatorParams) -> Vec<FaceRect> + Send + Sync,
{
    fn detect(&self, gray: &GrayImage, params: &LocatorParams) -> Vec<FaceRect> {
        self(gray, params)
    }
}

/// Locator that never finds a face. Skin boost degrades to the global
/// transfer when this is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaceLocator;

impl FaceLocator for NoFaceLocator {
    fn detect(&self, _gray: &GrayImage, _params: &LocatorParams) -> Vec<FaceRect> {
        Vec::new()
    }
}

/// Pick the largest candidate that fits inside a `width` x `height` image.
///
/// Area is compared with a strict `>`, so among equal areas the first
/// candidate in the locator's order wins. Candidates that are empty or
/// stick out of the image are dropped.
pub fn largest_face(candidates: &[FaceRect], width: u32, height: u32) -> Option<FaceRect> {
    let mut best: Option<FaceRect> = None;
    for rect in candidates {
        if !rect.fits_within(width, height) {
            tracing::warn!(%rect, width, height, "discarding face region outside image bounds");
            continue;
        }
        match best {
            Some(current) if rect.area() > current.area() => best = Some(*rect),
            None => best = Some(*rect),
            _ => {}
        }
    }
    best
}
