//! Sampled tone-response curve and its numerical inverse.
//!
//! A [`ToneCurve`] stores a monotonically non-decreasing transfer function as
//! 16-bit samples evenly spaced over the encoded domain `[0, 1]`, the way ICC
//! `curv` tags do. [`ToneCurve::apply`] maps encoded to linear values and
//! [`ToneCurve::invert`] maps linear back to encoded, both by piecewise-linear
//! interpolation between samples.

use wsi_math::{inverse_lerp, lerp};

use crate::{LutError, LutResult};

/// Number of samples in the built-in reference curve.
pub const REFERENCE_CURVE_POINTS: usize = 1024;

/// A sampled, monotonic tone-response curve.
///
/// # Example
///
/// ```rust
/// use wsi_lut::ToneCurve;
///
/// let curve = ToneCurve::srgb();
/// let linear = curve.apply(0.5);
/// assert!((curve.invert(linear) - 0.5).abs() < 1e-4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ToneCurve {
    samples: Vec<u16>,
}

impl ToneCurve {
    /// Creates a curve from raw samples spanning `0..=65535`.
    ///
    /// # Errors
    ///
    /// Fails if fewer than two samples are given or the samples decrease.
    pub fn from_samples(samples: Vec<u16>) -> LutResult<Self> {
        if samples.len() < 2 {
            return Err(LutError::InvalidSize(format!(
                "tone curve needs at least 2 samples, got {}",
                samples.len()
            )));
        }
        if let Some(i) = samples.windows(2).position(|w| w[1] < w[0]) {
            return Err(LutError::InvalidSize(format!(
                "tone curve decreases at sample {}",
                i + 1
            )));
        }
        Ok(Self { samples })
    }

    /// sRGB electro-optical transfer function, sampled at
    /// [`REFERENCE_CURVE_POINTS`] points.
    pub fn srgb() -> Self {
        let last = (REFERENCE_CURVE_POINTS - 1) as f64;
        let samples = (0..REFERENCE_CURVE_POINTS)
            .map(|i| {
                let v = srgb_eotf(i as f64 / last);
                (v * 65535.0).round().clamp(0.0, 65535.0) as u16
            })
            .collect();
        Self { samples }
    }

    /// Raw samples.
    #[inline]
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Maps an encoded value in `[0, 1]` to linear `[0, 1]`.
    pub fn apply(&self, x: f64) -> f64 {
        let last = self.samples.len() - 1;
        let pos = x.clamp(0.0, 1.0) * last as f64;
        let lo = (pos.floor() as usize).min(last);
        let hi = (lo + 1).min(last);
        let frac = pos - lo as f64;
        lerp(self.sample(lo), self.sample(hi), frac)
    }

    /// Maps a linear value in `[0, 1]` back to encoded `[0, 1]`.
    ///
    /// Binary-searches for the first sample not below `y`, then interpolates
    /// inside the bracketing segment. Flat segments resolve to their lower end.
    pub fn invert(&self, y: f64) -> f64 {
        let last = self.samples.len() - 1;
        let target = y.clamp(0.0, 1.0);

        let mut lo = 0;
        let mut hi = last;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.sample(mid) < target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        if lo == 0 {
            return 0.0;
        }
        let a = self.sample(lo - 1);
        let b = self.sample(lo);
        if target > b {
            // Curve tops out below 1.0
            return 1.0;
        }
        let t = inverse_lerp(a, b, target);
        ((lo - 1) as f64 + t) / last as f64
    }

    #[inline]
    fn sample(&self, i: usize) -> f64 {
        self.samples[i] as f64 / 65535.0
    }
}

/// sRGB decoding function (encoded to linear).
fn srgb_eotf(v: f64) -> f64 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_srgb_shape() {
        let curve = ToneCurve::srgb();
        assert_eq!(curve.samples().len(), REFERENCE_CURVE_POINTS);
        assert_eq!(curve.samples()[0], 0);
        assert_eq!(curve.samples()[REFERENCE_CURVE_POINTS - 1], 65535);
        assert!(curve.samples().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_apply_matches_eotf() {
        let curve = ToneCurve::srgb();
        for x in [0.0, 0.01, 0.2, 0.5, 0.73, 1.0] {
            assert_abs_diff_eq!(curve.apply(x), srgb_eotf(x), epsilon = 1e-4);
        }
    }

    #[test]
    fn test_invert_roundtrip() {
        let curve = ToneCurve::srgb();
        for i in 0..=255 {
            let x = i as f64 / 255.0;
            assert_abs_diff_eq!(curve.invert(curve.apply(x)), x, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_invert_clamps() {
        let curve = ToneCurve::srgb();
        assert_eq!(curve.invert(-0.5), 0.0);
        assert_eq!(curve.invert(2.0), 1.0);
    }

    #[test]
    fn test_invert_flat_segment() {
        let curve = ToneCurve::from_samples(vec![0, 30000, 30000, 65535]).unwrap();
        assert_abs_diff_eq!(curve.invert(30000.0 / 65535.0), 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invert_short_curve() {
        let curve = ToneCurve::from_samples(vec![0, 40000]).unwrap();
        assert_eq!(curve.invert(0.9), 1.0);
        assert_abs_diff_eq!(curve.invert(20000.0 / 65535.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_from_samples_rejects() {
        assert!(ToneCurve::from_samples(vec![7]).is_err());
        assert!(ToneCurve::from_samples(vec![0, 100, 50]).is_err());
    }
}
