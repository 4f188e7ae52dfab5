//! Dense `256 x 256 x 256` correction table.
//!
//! Every 24-bit input color has its own entry, so correcting a pixel is a
//! single indexed load. Keys and values are both packed `r << 16 | g << 8 | b`.
//!
//! Upsampling from the coarse cube is trilinear. Position `i` on a dense axis
//! maps to `i * (N - 1) / 255` on the coarse axis; the split into vertex and
//! fraction is done in integers so that positions landing exactly on a
//! vertex reproduce that vertex without rounding error.

use rayon::prelude::*;
use tracing::{debug, trace};
use wsi_math::trilerp;

use crate::CoarseLut;

/// Entries per dense axis.
pub const DENSE_AXIS: usize = 256;
/// Total dense entries (`256^3`).
pub const DENSE_SIZE: usize = DENSE_AXIS * DENSE_AXIS * DENSE_AXIS;

/// Packs an RGB triplet into a 24-bit key.
#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Unpacks a 24-bit key into an RGB triplet.
#[inline]
pub fn unpack_rgb(v: u32) -> [u8; 3] {
    [(v >> 16) as u8, (v >> 8) as u8, v as u8]
}

/// Quantizes a `[0, 1]` value to 8 bits.
#[inline]
pub fn quantize(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Direct-lookup correction table.
#[derive(Clone)]
pub struct DenseLut {
    table: Vec<u32>,
    identity: bool,
}

impl std::fmt::Debug for DenseLut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseLut")
            .field("entries", &self.table.len())
            .field("identity", &self.identity)
            .finish()
    }
}

impl DenseLut {
    /// Pass-through table.
    pub fn identity() -> Self {
        let table = (0..DENSE_SIZE as u32).collect();
        Self {
            table,
            identity: true,
        }
    }

    /// Builds a table by evaluating `f` for every input color.
    ///
    /// Work is split across the rayon pool by red value.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(u8, u8, u8) -> [u8; 3] + Sync,
    {
        let mut table = vec![0u32; DENSE_SIZE];
        table
            .par_chunks_mut(DENSE_AXIS * DENSE_AXIS)
            .enumerate()
            .for_each(|(r, plane)| {
                for (gb, out) in plane.iter_mut().enumerate() {
                    let [o0, o1, o2] = f(r as u8, (gb >> 8) as u8, gb as u8);
                    *out = pack_rgb(o0, o1, o2);
                }
            });
        Self::from_table(table)
    }

    /// Upsamples a coarse cube by trilinear interpolation.
    pub fn from_coarse(coarse: &CoarseLut) -> Self {
        trace!(size = coarse.size, "DenseLut::from_coarse");
        let axis = axis_positions(coarse.size);

        let lut = Self::from_fn(|r, g, b| {
            let (r0, r1, tr) = axis[r as usize];
            let (g0, g1, tg) = axis[g as usize];
            let (b0, b1, tb) = axis[b as usize];
            let t = [tr, tg, tb];

            let mut out = [0u8; 3];
            for (c, slot) in out.iter_mut().enumerate() {
                let v = |r, g, b| coarse.get(r, g, b)[c] as f64;
                let corners = [
                    [[v(r0, g0, b0), v(r0, g0, b1)], [v(r0, g1, b0), v(r0, g1, b1)]],
                    [[v(r1, g0, b0), v(r1, g0, b1)], [v(r1, g1, b0), v(r1, g1, b1)]],
                ];
                *slot = quantize(trilerp(&corners, t));
            }
            out
        });

        debug!(size = coarse.size, identity = lut.identity, "Upsampled correction table");
        lut
    }

    fn from_table(table: Vec<u32>) -> Self {
        let identity = table
            .par_iter()
            .enumerate()
            .all(|(key, &value)| key as u32 == value);
        Self { table, identity }
    }

    /// Returns true if every entry maps to itself.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Looks up a packed 24-bit color.
    #[inline]
    pub fn lookup(&self, key: u32) -> u32 {
        self.table[(key & 0x00FF_FFFF) as usize]
    }

    /// Corrects one pixel.
    #[inline]
    pub fn map_rgb(&self, r: u8, g: u8, b: u8) -> [u8; 3] {
        unpack_rgb(self.table[pack_rgb(r, g, b) as usize])
    }

    /// Corrects interleaved RGB8 pixels in place.
    pub fn apply_rgb_in_place(&self, pixels: &mut [u8]) {
        for px in pixels.chunks_exact_mut(3) {
            let mapped = self.map_rgb(px[0], px[1], px[2]);
            px.copy_from_slice(&mapped);
        }
    }
}

/// For each dense index: lower vertex, upper vertex, fraction.
fn axis_positions(size: usize) -> Vec<(usize, usize, f64)> {
    let last = size - 1;
    (0..DENSE_AXIS)
        .map(|i| {
            let num = i * last;
            let lo = num / (DENSE_AXIS - 1);
            let rem = num % (DENSE_AXIS - 1);
            let hi = (lo + 1).min(last);
            (lo, hi, rem as f64 / (DENSE_AXIS - 1) as f64)
        })
        .collect()
}
