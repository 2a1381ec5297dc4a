//! Statistical color transfer in encoded Lab space.
//!
//! ## Algorithm
//!
//! For each chrominance channel `c` in {a, b}:
//!
//! 1. `(mu_t, sigma_t)` over the whole target plane, `(mu_r, sigma_r)` over
//!    the whole reference plane
//! 2. `norm = (t - mu_t) * sigma_r / (sigma_t + eps) + mu_r`
//! 3. `out = t * (1 - strength) + norm * strength`
//!
//! When a skin pair is supplied, the statistics are recomputed inside the
//! two face rectangles and the whole image's a/b planes are re-blended from
//! the target with `min(1, strength * skin_boost_factor)`. This pass replaces
//! the global result for a/b; it does not stack on top of it.
//!
//! Lightness is always pulled uniformly toward the reference's mean:
//! `out_L = t_L * (1 - light_weight) + mean(ref_L) * light_weight`.

use serde::{Deserialize, Serialize};

use crate::face::FaceRect;
use crate::lab::{Channel, LabImage};
use crate::stats::{plane_stats, region_stats, ChannelStats};
use crate::Strength;

/// Tunable constants of the transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferParams {
    /// Multiplier applied to the strength for the face-local pass.
    pub skin_boost_factor: f32,
    /// Weight of the reference's mean lightness in the output lightness.
    pub light_weight: f32,
    /// Guard added to the target deviation before dividing.
    pub epsilon: f64,
}

impl Default for TransferParams {
    fn default() -> Self {
        Self {
            skin_boost_factor: 1.3,
            light_weight: 0.15,
            epsilon: 1e-8,
        }
    }
}

impl TransferParams {
    /// Strength used by the face-local pass.
    pub fn skin_strength(&self, strength: Strength) -> f32 {
        (strength.value() * self.skin_boost_factor).clamp(0.0, 1.0)
    }
}

/// The selected face rectangle in each image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkinPair {
    pub target: FaceRect,
    pub reference: FaceRect,
}

/// Whether the global chrominance re-normalization runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaMode {
    /// Match the whole target's a/b distribution to the reference's.
    #[default]
    Global,
    /// Keep the target's a/b; only lightness and the skin pass apply.
    MoodOnly,
}

/// Transfer the reference's color statistics onto the target.
///
/// Both images should share the same grid; the pipeline resamples the
/// reference beforehand. The inputs are not modified.
pub fn transfer(
    target: &LabImage,
    reference: &LabImage,
    strength: Strength,
    skin: Option<&SkinPair>,
    params: &TransferParams,
) -> LabImage {
    transfer_with_mode(target, reference, strength, skin, ChromaMode::Global, params)
}

/// [`transfer`] with explicit control over the global chrominance pass.
pub fn transfer_with_mode(
    target: &LabImage,
    reference: &LabImage,
    strength: Strength,
    skin: Option<&SkinPair>,
    mode: ChromaMode,
    params: &TransferParams,
) -> LabImage {
    debug_assert_eq!(
        (target.width, target.height),
        (reference.width, reference.height),
        "reference must be resampled to the target grid"
    );

    let mut result = target.clone();
    let s = strength.value();

    if mode == ChromaMode::Global {
        for channel in Channel::CHROMA {
            let from = plane_stats(target.plane(channel));
            let to = plane_stats(reference.plane(channel));
            tracing::debug!(?channel, ?from, ?to, strength = s, "global chroma statistics");
            renormalize(
                target.plane(channel),
                from,
                to,
                s,
                params.epsilon,
                result.plane_mut(channel),
            );
        }
    }

    if let Some(pair) = skin {
        apply_skin_pass(target, reference, pair, strength, params, &mut result);
    }

    let ref_l = plane_stats(reference.plane(Channel::L)).mean as f32;
    let w = params.light_weight;
    for (out, &t) in result.l.iter_mut().zip(&target.l) {
        *out = t * (1.0 - w) + ref_l * w;
    }

    result
}

fn apply_skin_pass(
    target: &LabImage,
    reference: &LabImage,
    pair: &SkinPair,
    strength: Strength,
    params: &TransferParams,
    result: &mut LabImage,
) {
    if !pair.target.fits_within(target.width, target.height)
        || !pair.reference.fits_within(reference.width, reference.height)
    {
        tracing::warn!(?pair, "skin pair outside image bounds, skipping skin pass");
        return;
    }

    let skin_strength = params.skin_strength(strength);
    for channel in Channel::CHROMA {
        let from = region_stats(target.plane(channel), target.width, &pair.target);
        let to = region_stats(reference.plane(channel), reference.width, &pair.reference);
        tracing::debug!(?channel, ?from, ?to, skin_strength, "face-local chroma statistics");
        renormalize(
            target.plane(channel),
            from,
            to,
            skin_strength,
            params.epsilon,
            result.plane_mut(channel),
        );
    }
}

/// Write `t * (1 - s) + norm(t) * s` for every sample of `source` into `out`.
fn renormalize(
    source: &[f32],
    from: ChannelStats,
    to: ChannelStats,
    strength: f32,
    epsilon: f64,
    out: &mut [f32],
) {
    let scale = to.std_dev / (from.std_dev + epsilon);
    let s = strength as f64;
    for (o, &t) in out.iter_mut().zip(source) {
        let t = t as f64;
        let norm = (t - from.mean) * scale + to.mean;
        *o = (t * (1.0 - s) + norm * s) as f32;
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn lab_strategy() -> impl Strategy<Value = LabImage> {
        (1u32..=10, 1u32..=10).prop_flat_map(|(w, h)| {
            let n = (w * h) as usize;
            (
                prop::collection::vec(0.0f32..=255.0, n..=n),
                prop::collection::vec(0.0f32..=255.0, n..=n),
                prop::collection::vec(0.0f32..=255.0, n..=n),
            )
                .prop_map(move |(l, a, b)| LabImage {
                    width: w,
                    height: h,
                    l,
                    a,
                    b,
                })
        })
    }

    fn pair_strategy() -> impl Strategy<Value = (LabImage, LabImage)> {
        lab_strategy().prop_flat_map(|t| {
            let n = t.pixel_count();
            let (w, h) = (t.width, t.height);
            (
                Just(t),
                (
                    prop::collection::vec(0.0f32..=255.0, n..=n),
                    prop::collection::vec(0.0f32..=255.0, n..=n),
                    prop::collection::vec(0.0f32..=255.0, n..=n),
                )
                    .prop_map(move |(l, a, b)| LabImage {
                        width: w,
                        height: h,
                        l,
                        a,
                        b,
                    }),
            )
        })
    }

    proptest! {
        /// Property: strength 0 never touches chrominance, with or without a skin pair.
        #[test]
        fn prop_zero_strength_preserves_chroma((target, reference) in pair_strategy()) {
            let pair = SkinPair {
                target: FaceRect::new(0, 0, target.width, target.height),
                reference: FaceRect::new(0, 0, reference.width, reference.height),
            };
            let out = transfer(&target, &reference, Strength::new(0.0), Some(&pair), &TransferParams::default());
            prop_assert_eq!(&out.a, &target.a);
            prop_assert_eq!(&out.b, &target.b);
        }

        /// Property: the output never contains NaN or infinity.
        #[test]
        fn prop_output_finite((target, reference) in pair_strategy(), s in 0.0f32..=1.0) {
            let out = transfer(&target, &reference, Strength::new(s), None, &TransferParams::default());
            prop_assert!(out.l.iter().chain(&out.a).chain(&out.b).all(|v| v.is_finite()));
        }
    }
}
