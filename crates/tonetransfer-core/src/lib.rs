//! Tonetransfer Core - statistical color and skin-tone transfer
//!
//! This crate re-grades a target photograph so it adopts the color mood of a
//! reference photograph, optionally matching skin tone through a detected
//! face region, followed by a light cosmetic pass.
//!
//! The flow is one-way:
//! decode -> resample reference -> Lab -> statistics transfer -> RGB -> polish.
//!
//! Every run is a pure, synchronous computation. Callers that need a
//! responsive UI run [`TransferPipeline::run`] off their interactive thread.

pub mod decode;
pub mod encode;
pub mod face;
pub mod grayscale;
pub mod lab;
pub mod pipeline;
pub mod polish;
pub mod stats;
pub mod transfer;

pub use decode::{decode_image, decode_image_file, DecodeError, FilterType, Raster};
pub use encode::{encode_image, encode_image_file, EncodeError, OutputFormat};
pub use face::{largest_face, FaceLocator, FaceRect, LocatorParams, NoFaceLocator};
pub use lab::{to_perceptual, to_rgb, LabImage};
pub use pipeline::{PipelineConfig, PipelineError, Preset, SkinRegions, TransferOptions, TransferPipeline};
pub use polish::{polish, PolishParams, UnsharpMask};
pub use transfer::{transfer, ChromaMode, SkinPair, TransferParams};

/// How strongly the reference overrides the target, from 0.0 (unchanged)
/// to 1.0 (full statistical replacement).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Strength(f32);

impl Strength {
    pub const NONE: Strength = Strength(0.0);
    pub const FULL: Strength = Strength(1.0);

    /// Create a strength, clamping to 0.0..=1.0. NaN becomes 0.0.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    /// Map a user-facing percentage (0-100) to a strength.
    ///
    /// Returns `None` for values above 100.
    pub fn from_percent(percent: u32) -> Option<Self> {
        (percent <= 100).then(|| Self(percent as f32 / 100.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// The strength as a whole percentage.
    pub fn percent(self) -> u32 {
        (self.0 * 100.0).round() as u32
    }
}

impl TryFrom<f32> for Strength {
    type Error = String;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("strength must be within 0.0..=1.0, got {}", value))
        }
    }
}

impl From<Strength> for f32 {
    fn from(strength: Strength) -> Self {
        strength.0
    }
}
