//! Coarse `N x N x N` correction cube.

use tracing::debug;
use wsi_math::Vec3;

use crate::{ClutCube, LutError, LutResult, ReferenceDisplay};

/// Corrected display RGB for every vertex of the device cube.
///
/// Indexed like [`ClutCube`]: red slowest, blue fastest. Values lie in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct CoarseLut {
    /// Grid points per axis
    pub size: usize,
    /// Corrected RGB per vertex
    pub data: Vec<[f32; 3]>,
}

impl CoarseLut {
    /// Creates a coarse table from raw data.
    pub fn from_data(size: usize, data: Vec<[f32; 3]>) -> LutResult<Self> {
        let expected = size * size * size;
        if size < 2 || data.len() != expected {
            return Err(LutError::InvalidSize(format!(
                "expected {} entries for size {}, got {}",
                expected,
                size,
                data.len()
            )));
        }
        Ok(Self { size, data })
    }

    /// Identity cube of the given size.
    pub fn identity(size: usize) -> LutResult<Self> {
        let last = size.saturating_sub(1).max(1) as f32;
        let mut data = Vec::with_capacity(size * size * size);
        for r in 0..size {
            for g in 0..size {
                for b in 0..size {
                    data.push([r as f32 / last, g as f32 / last, b as f32 / last]);
                }
            }
        }
        Self::from_data(size, data)
    }

    /// Composes the device cube with the reference display.
    ///
    /// Each sample is divided by the cube's white-point normalizer, taken out of
    /// XYZ by the inverse reference matrix, clamped, and passed through the
    /// inverted tone curve.
    pub fn from_device(cube: &ClutCube, display: &ReferenceDisplay) -> LutResult<Self> {
        let normalizer = cube.normalizer();
        if normalizer == 0 {
            return Err(LutError::profile("cube white corner is black"));
        }
        let scale = normalizer as f64;

        let data = cube
            .samples
            .iter()
            .map(|s| {
                let xyz = Vec3::new(s[0] as f64, s[1] as f64, s[2] as f64) / scale;
                let rgb = display.xyz_to_display(xyz);
                [rgb.x as f32, rgb.y as f32, rgb.z as f32]
            })
            .collect();

        debug!(size = cube.size, normalizer, "Composed coarse correction cube");
        Self::from_data(cube.size, data)
    }

    /// Flat index of vertex `(r, g, b)`.
    #[inline]
    pub fn index(&self, r: usize, g: usize, b: usize) -> usize {
        (r * self.size + g) * self.size + b
    }

    /// Value at vertex `(r, g, b)`.
    #[inline]
    pub fn get(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        self.data[self.index(r, g, b)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_corners() {
        let lut = CoarseLut::identity(5).unwrap();
        assert_eq!(lut.get(0, 0, 0), [0.0, 0.0, 0.0]);
        assert_eq!(lut.get(4, 0, 2), [1.0, 0.0, 0.5]);
        assert_eq!(lut.get(4, 4, 4), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_from_data_size_mismatch() {
        assert!(CoarseLut::from_data(2, vec![[0.0; 3]; 7]).is_err());
        assert!(CoarseLut::from_data(1, vec![[0.0; 3]; 1]).is_err());
    }

    #[test]
    fn test_black_white_corner_rejected() {
        let cube = ClutCube::from_samples(2, vec![[0; 3]; 8]).unwrap();
        let display = ReferenceDisplay::srgb().unwrap();
        assert!(CoarseLut::from_device(&cube, &display).is_err());
    }

    #[test]
    fn test_white_corner_maps_to_white() {
        let display = ReferenceDisplay::srgb().unwrap();
        let mut samples = vec![[0u16; 3]; 8];
        // D50 white in u1Fixed15
        samples[7] = [31595, 32768, 27030];
        let cube = ClutCube::from_samples(2, samples).unwrap();
        let lut = CoarseLut::from_device(&cube, &display).unwrap();
        for c in lut.get(1, 1, 1) {
            assert!((c - 1.0).abs() < 2e-3, "{}", c);
        }
        assert_eq!(lut.get(0, 0, 0), [0.0, 0.0, 0.0]);
    }
}
