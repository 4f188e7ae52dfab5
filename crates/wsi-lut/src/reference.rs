//! Built-in reference display.
//!
//! The scanner's embedded profile maps device RGB to the profile connection
//! space (XYZ). To correct a tile, each cube entry is carried back out of XYZ
//! through a fixed reference display: its inverse RGB-to-XYZ matrix followed by
//! its inverted tone curve. The reference is sRGB with D50-adapted colorants,
//! the form in which sRGB appears inside ICC v2 profiles.

use wsi_math::{Mat3, Vec3};

use crate::{LutError, LutResult, ToneCurve};

/// sRGB to XYZ (D50 white) primaries, rows = X, Y, Z.
pub const SRGB_D50_TO_XYZ: [[f64; 3]; 3] = [
    [0.4360747, 0.3850649, 0.1430804],
    [0.2225045, 0.7168786, 0.0606169],
    [0.0139322, 0.0971045, 0.7141733],
];

/// Reference display: RGB-to-XYZ matrix, its inverse and a tone curve.
#[derive(Debug, Clone)]
pub struct ReferenceDisplay {
    rgb_to_xyz: Mat3,
    xyz_to_rgb: Mat3,
    curve: ToneCurve,
}

impl ReferenceDisplay {
    /// Builds a reference display from a matrix and tone curve.
    ///
    /// # Errors
    ///
    /// Returns [`LutError::Singular`] if the matrix has no inverse.
    pub fn new(rgb_to_xyz: Mat3, curve: ToneCurve) -> LutResult<Self> {
        let xyz_to_rgb = rgb_to_xyz.inverse().ok_or(LutError::Singular)?;
        Ok(Self {
            rgb_to_xyz,
            xyz_to_rgb,
            curve,
        })
    }

    /// The built-in sRGB (D50) reference.
    pub fn srgb() -> LutResult<Self> {
        Self::new(Mat3::from_rows(SRGB_D50_TO_XYZ), ToneCurve::srgb())
    }

    /// RGB-to-XYZ matrix.
    #[inline]
    pub fn matrix(&self) -> &Mat3 {
        &self.rgb_to_xyz
    }

    /// Tone curve.
    #[inline]
    pub fn curve(&self) -> &ToneCurve {
        &self.curve
    }

    /// Maps normalized XYZ to encoded display RGB in `[0, 1]`.
    ///
    /// Linear RGB is clamped before the curve is inverted, so out-of-gamut
    /// colors saturate rather than wrap.
    pub fn xyz_to_display(&self, xyz: Vec3) -> Vec3 {
        let linear = (self.xyz_to_rgb * xyz).clamp01();
        linear.map(|c| self.curve.invert(c))
    }

    /// Maps encoded display RGB in `[0, 1]` to XYZ.
    pub fn display_to_xyz(&self, rgb: Vec3) -> Vec3 {
        self.rgb_to_xyz * rgb.clamp01().map(|c| self.curve.apply(c))
    }
}
