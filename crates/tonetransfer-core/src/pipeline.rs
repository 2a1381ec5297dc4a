//! End-to-end transfer pipeline.
//!
//! ## Steps
//! 1. Validate both rasters
//! 2. Resample the reference onto the target's grid
//! 3. Convert both to encoded Lab
//! 4. Locate faces (skin boost only) and pick the largest in each image
//! 5. Statistical transfer
//! 6. Convert back to RGB
//! 7. Cosmetic pass
//!
//! The face locator is injected at construction. A pipeline holds no
//! mutable state, so one instance can serve concurrent runs on different
//! inputs.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::{decode_image_file, match_dimensions, DecodeError, FilterType, Raster};
use crate::encode::EncodeError;
use crate::face::{largest_face, FaceLocator, FaceRect, LocatorParams, NoFaceLocator};
use crate::grayscale::to_grayscale;
use crate::lab::{to_perceptual, to_rgb, LabImage};
use crate::polish::{polish, PolishParams};
use crate::transfer::{transfer_with_mode, ChromaMode, SkinPair, TransferParams};
use crate::Strength;

/// Errors surfaced by a pipeline run. A failed run produces no output.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An input raster is empty or its buffer does not match its size.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A strength percentage outside 0-100.
    #[error("Strength must be between 0 and 100 percent, got {0}")]
    InvalidStrength(u32),

    /// A configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Per-run switches exposed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferOptions {
    pub strength: Strength,
    /// Run the face-local pass when both images contain a face.
    pub apply_skin_boost: bool,
    /// Skip the global chrominance re-normalization.
    pub mood_only: bool,
    /// Run the unsharp mask after the contrast/saturation pass.
    pub apply_sharpen: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            strength: Strength::new(0.8),
            apply_skin_boost: true,
            mood_only: false,
            apply_sharpen: false,
        }
    }
}

impl TransferOptions {
    /// Set the strength from a 0-100 percentage.
    pub fn with_strength_percent(mut self, percent: u32) -> Result<Self, PipelineError> {
        self.strength =
            Strength::from_percent(percent).ok_or(PipelineError::InvalidStrength(percent))?;
        Ok(self)
    }
}

/// Tunables of every stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub transfer: TransferParams,
    pub polish: PolishParams,
    pub locator: LocatorParams,
    /// Filter used to resample the reference onto the target grid.
    pub resample_filter: FilterType,
}

impl PipelineConfig {
    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn to_json_file(&self, path: &Path) -> Result<(), PipelineError> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Named default configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Global mood transfer plus skin-tone matching.
    #[default]
    SkinAndMood,
    /// Leave chrominance alone; lightness pull and cosmetic pass only.
    MoodOnly,
    /// Stronger skin boost, lightness pull and polish, with sharpening.
    Crisp,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::SkinAndMood, Preset::MoodOnly, Preset::Crisp];

    pub fn name(self) -> &'static str {
        match self {
            Preset::SkinAndMood => "skin-and-mood",
            Preset::MoodOnly => "mood-only",
            Preset::Crisp => "crisp",
        }
    }

    pub fn config(self) -> PipelineConfig {
        match self {
            Preset::SkinAndMood | Preset::MoodOnly => PipelineConfig::default(),
            Preset::Crisp => PipelineConfig {
                transfer: TransferParams {
                    skin_boost_factor: 1.4,
                    light_weight: 0.2,
                    ..Default::default()
                },
                polish: PolishParams {
                    contrast_gain: 0.1,
                    saturation_gain: 0.2,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    pub fn options(self) -> TransferOptions {
        match self {
            Preset::SkinAndMood => TransferOptions::default(),
            Preset::MoodOnly => TransferOptions {
                apply_skin_boost: false,
                mood_only: true,
                ..Default::default()
            },
            Preset::Crisp => TransferOptions {
                apply_sharpen: true,
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Preset::ALL.iter().map(|p| p.name()).collect();
                format!("unknown preset '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// Face candidates for both images, as a locator would return them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkinRegions {
    pub target: Vec<FaceRect>,
    pub reference: Vec<FaceRect>,
}

impl SkinRegions {
    /// Pick the largest valid face in each image. `None` unless both
    /// images have one.
    pub fn select(&self, target: &Raster, reference: &Raster) -> Option<SkinPair> {
        let t = largest_face(&self.target, target.width, target.height);
        let r = largest_face(&self.reference, reference.width, reference.height);
        match (t, r) {
            (Some(target), Some(reference)) => {
                tracing::info!(target_face = %target, reference_face = %reference, "skin pair selected");
                Some(SkinPair { target, reference })
            }
            _ => {
                tracing::debug!(
                    target_found = t.is_some(),
                    reference_found = r.is_some(),
                    "no face pair, skipping skin boost"
                );
                None
            }
        }
    }
}

/// The single entry point callers use to run a transfer.
pub struct TransferPipeline {
    config: PipelineConfig,
    locator: Box<dyn FaceLocator>,
}

impl Default for TransferPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl fmt::Debug for TransferPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TransferPipeline {
    /// A pipeline without a face locator; skin boost never finds a pair.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            locator: Box::new(NoFaceLocator),
        }
    }

    /// Replace the face locator.
    pub fn with_locator(mut self, locator: impl FaceLocator + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline, locating faces with the injected locator.
    pub fn run(
        &self,
        target: &Raster,
        reference: &Raster,
        options: &TransferOptions,
    ) -> Result<Raster, PipelineError> {
        let lab = self.run_perceptual(target, reference, options)?;
        Ok(self.finish(&lab, options))
    }

    /// Decode both files, then [`run`](Self::run).
    pub fn run_files(
        &self,
        target: &Path,
        reference: &Path,
        options: &TransferOptions,
    ) -> Result<Raster, PipelineError> {
        let target = decode_image_file(target)?;
        let reference = decode_image_file(reference)?;
        self.run(&target, &reference, options)
    }

    /// Run the full pipeline with face candidates supplied by the caller
    /// instead of the locator.
    ///
    /// Candidates for the reference are in the coordinates of the reference
    /// after resampling to the target's size. They are ignored unless
    /// `options.apply_skin_boost` is set.
    pub fn run_with_regions(
        &self,
        target: &Raster,
        reference: &Raster,
        options: &TransferOptions,
        regions: &SkinRegions,
    ) -> Result<Raster, PipelineError> {
        let reference = self.prepare(target, reference)?;
        let lab = self.transfer_stage(target, &reference, options, Some(regions));
        Ok(self.finish(&lab, options))
    }

    /// Run everything up to and including the statistical transfer and
    /// return the Lab result, before conversion and polish.
    pub fn run_perceptual(
        &self,
        target: &Raster,
        reference: &Raster,
        options: &TransferOptions,
    ) -> Result<LabImage, PipelineError> {
        let reference = self.prepare(target, reference)?;
        let regions = options
            .apply_skin_boost
            .then(|| self.locate(target, &reference));
        Ok(self.transfer_stage(target, &reference, options, regions.as_ref()))
    }

    /// Validate inputs and resample the reference onto the target grid.
    fn prepare(&self, target: &Raster, reference: &Raster) -> Result<Raster, PipelineError> {
        validate(target, "target")?;
        validate(reference, "reference")?;
        Ok(match_dimensions(
            reference,
            target,
            self.config.resample_filter,
        )?)
    }

    fn locate(&self, target: &Raster, reference: &Raster) -> SkinRegions {
        let params = &self.config.locator;
        SkinRegions {
            target: self.locator.detect(&to_grayscale(target), params),
            reference: self.locator.detect(&to_grayscale(reference), params),
        }
    }

    fn transfer_stage(
        &self,
        target: &Raster,
        reference: &Raster,
        options: &TransferOptions,
        regions: Option<&SkinRegions>,
    ) -> LabImage {
        let pair = if options.apply_skin_boost {
            regions.and_then(|r| r.select(target, reference))
        } else {
            None
        };
        let mode = if options.mood_only {
            ChromaMode::MoodOnly
        } else {
            ChromaMode::Global
        };

        tracing::debug!(
            strength = options.strength.value(),
            ?mode,
            skin_pair = pair.is_some(),
            "running statistical transfer"
        );

        transfer_with_mode(
            &to_perceptual(target),
            &to_perceptual(reference),
            options.strength,
            pair.as_ref(),
            mode,
            &self.config.transfer,
        )
    }

    fn finish(&self, lab: &LabImage, options: &TransferOptions) -> Raster {
        polish(
            &to_rgb(lab),
            options.strength,
            options.apply_sharpen,
            &self.config.polish,
        )
    }
}

fn validate(image: &Raster, role: &str) -> Result<(), PipelineError> {
    if image.is_well_formed() {
        Ok(())
    } else {
        Err(PipelineError::InvalidInput(format!(
            "{} image is empty or malformed ({}x{}, {} bytes)",
            role,
            image.width,
            image.height,
            image.pixels.len()
        )))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn raster_strategy() -> impl Strategy<Value = Raster> {
        (1u32..=10, 1u32..=10).prop_flat_map(|(w, h)| {
            let len = (w * h * 3) as usize;
            prop::collection::vec(any::<u8>(), len..=len)
                .prop_map(move |pixels| Raster::new(w, h, pixels))
        })
    }

    proptest! {
        /// Property: any pair of valid rasters yields a finite Lab result and
        /// an output on the target's grid.
        #[test]
        fn prop_output_well_formed(
            target in raster_strategy(),
            reference in raster_strategy(),
            percent in 0u32..=100,
            sharpen in any::<bool>(),
        ) {
            let pipeline = TransferPipeline::default();
            let opts = TransferOptions {
                apply_sharpen: sharpen,
                ..Default::default()
            }
            .with_strength_percent(percent)
            .unwrap();

            let lab = pipeline.run_perceptual(&target, &reference, &opts).unwrap();
            prop_assert!(lab.l.iter().chain(&lab.a).chain(&lab.b).all(|v| v.is_finite()));

            let out = pipeline.run(&target, &reference, &opts).unwrap();
            prop_assert_eq!(out.dimensions(), target.dimensions());
            prop_assert!(out.is_well_formed());
        }

        /// Property: a flat target never produces NaN or infinity.
        #[test]
        fn prop_flat_target_finite(
            rgb in any::<[u8; 3]>(),
            reference in raster_strategy(),
        ) {
            let target = Raster::filled(6, 5, rgb);
            let lab = TransferPipeline::default()
                .run_perceptual(&target, &reference, &TransferOptions::default().with_strength_percent(100).unwrap())
                .unwrap();
            prop_assert!(lab.l.iter().chain(&lab.a).chain(&lab.b).all(|v| v.is_finite()));
        }

        /// Property: a face found in only one image leaves the result equal
        /// to a run with skin boost switched off.
        #[test]
        fn prop_one_sided_faces_match_skin_off(
            target in raster_strategy(),
            reference in raster_strategy(),
            face_in_target in any::<bool>(),
            percent in 0u32..=100,
        ) {
            let (w, h) = target.dimensions();
            // The locator sees the target first, then the resampled reference.
            let face_call = if face_in_target { 0 } else { 1 };
            let calls = std::sync::atomic::AtomicUsize::new(0);
            let locator = move |_: &image::GrayImage, _: &LocatorParams| {
                if calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == face_call {
                    vec![FaceRect::new(0, 0, w, h)]
                } else {
                    Vec::new()
                }
            };

            let skin_on = TransferOptions::default().with_strength_percent(percent).unwrap();
            let skin_off = TransferOptions {
                apply_skin_boost: false,
                ..skin_on.clone()
            };

            let with_skin = TransferPipeline::default()
                .with_locator(locator)
                .run(&target, &reference, &skin_on)
                .unwrap();
            let without = TransferPipeline::default()
                .run(&target, &reference, &skin_off)
                .unwrap();
            prop_assert_eq!(with_skin, without);
        }
    }
}
