//! Interpolation utilities.
//!
//! - Linear interpolation ([`lerp`], [`inverse_lerp`])
//! - Trilinear blend of eight cube corners ([`trilerp`])
//!
//! # Usage
//!
//! ```rust
//! use wsi_math::{lerp, inverse_lerp};
//!
//! assert_eq!(lerp(0.0, 10.0, 0.5), 5.0);
//! assert_eq!(inverse_lerp(0.0, 10.0, 5.0), 0.5);
//! ```

/// Linear interpolation between two values.
///
/// Returns exactly `a` when `t = 0.0` and exactly `b` when `t = 1.0`.
///
/// # Formula
///
/// `a * (1 - t) + b * t`
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

/// Inverse linear interpolation.
///
/// Given a value between `a` and `b`, returns the corresponding `t` value.
/// Degenerate intervals return 0.
#[inline]
pub fn inverse_lerp(a: f64, b: f64, value: f64) -> f64 {
    if (b - a).abs() < 1e-12 {
        0.0
    } else {
        (value - a) / (b - a)
    }
}

/// Trilinear interpolation of the eight corners of a unit cell.
///
/// Corners are indexed `c[r][g][b]` with each index 0 (lower) or 1 (upper);
/// `t` holds the fractional position along each axis. Exact zero or one
/// fractions return the corresponding corner bit-for-bit.
#[inline]
pub fn trilerp(c: &[[[f64; 2]; 2]; 2], t: [f64; 3]) -> f64 {
    let c00 = lerp(c[0][0][0], c[0][0][1], t[2]);
    let c01 = lerp(c[0][1][0], c[0][1][1], t[2]);
    let c10 = lerp(c[1][0][0], c[1][0][1], t[2]);
    let c11 = lerp(c[1][1][0], c[1][1][1], t[2]);

    let c0 = lerp(c00, c01, t[1]);
    let c1 = lerp(c10, c11, t[1]);

    lerp(c0, c1, t[0])
}
