//! Per-channel mean and standard deviation.
//!
//! Statistics are accumulated in `f64` with a two-pass algorithm, so the
//! variance is never negative and a flat plane yields exactly zero
//! deviation. Nothing is cached; every call recomputes from the plane.

use serde::Serialize;

use crate::face::FaceRect;

/// Mean and population standard deviation of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl ChannelStats {
    /// Compute statistics over a sequence of samples.
    ///
    /// An empty sequence yields all-zero statistics.
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: Iterator<Item = f32> + Clone,
    {
        let (sum, count) = samples
            .clone()
            .fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
        if count == 0 {
            return Self::default();
        }
        let mean = sum / count as f64;

        let var = samples
            .map(|v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / count as f64;

        Self {
            mean,
            std_dev: var.sqrt(),
        }
    }
}

/// Statistics over a whole plane.
pub fn plane_stats(plane: &[f32]) -> ChannelStats {
    ChannelStats::from_samples(plane.iter().copied())
}

/// Statistics over the pixels of `plane` covered by `rect`.
///
/// `width` is the row stride of the plane. The caller guarantees that the
/// rectangle lies inside the plane.
pub fn region_stats(plane: &[f32], width: u32, rect: &FaceRect) -> ChannelStats {
    let stride = width as usize;
    let (x0, x1) = (rect.x as usize, (rect.x + rect.width) as usize);
    let rows = rect.y as usize..(rect.y + rect.height) as usize;

    let samples = rows.flat_map(move |y| plane[y * stride + x0..y * stride + x1].iter().copied());
    ChannelStats::from_samples(samples)
}
