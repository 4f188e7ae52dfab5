//! ICC profiles with an `mft2` A2B0 cube.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use wsi_lut::icc::{LUT16_TYPE, PROFILE_SIGNATURE, TAG_A2B0};
use wsi_lut::ReferenceDisplay;
use wsi_math::Vec3;

/// Encodes an XYZ component as ICC `u1Fixed15` (1.0 = 0x8000).
pub fn xyz_to_u1f15(v: f64) -> u16 {
    (v * 32768.0).round().clamp(0.0, 65535.0) as u16
}

/// Builds a profile whose cube is `f(device rgb in [0,1]) -> XYZ`.
pub fn profile_from_fn(grid: usize, f: impl Fn([f64; 3]) -> [f64; 3]) -> Vec<u8> {
    let last = (grid - 1) as f64;
    let mut tag = Vec::new();
    tag.write_u32::<BigEndian>(LUT16_TYPE).unwrap();
    tag.extend_from_slice(&[0; 4]);
    tag.extend_from_slice(&[3, 3, grid as u8, 0]);
    // Identity matrix in s15Fixed16
    for i in 0..9 {
        tag.write_i32::<BigEndian>(if i % 4 == 0 { 0x0001_0000 } else { 0 }).unwrap();
    }
    tag.write_u16::<BigEndian>(2).unwrap();
    tag.write_u16::<BigEndian>(2).unwrap();
    let linear_tables = |tag: &mut Vec<u8>| {
        for _ in 0..3 {
            tag.write_u16::<BigEndian>(0).unwrap();
            tag.write_u16::<BigEndian>(0xFFFF).unwrap();
        }
    };
    linear_tables(&mut tag);
    for r in 0..grid {
        for g in 0..grid {
            for b in 0..grid {
                let xyz = f([r as f64 / last, g as f64 / last, b as f64 / last]);
                for c in xyz {
                    tag.write_u16::<BigEndian>(xyz_to_u1f15(c)).unwrap();
                }
            }
        }
    }
    linear_tables(&mut tag);

    let tag_offset = 128 + 4 + 12;
    let total = tag_offset + tag.len();
    let mut out = vec![0u8; 128];
    BigEndian::write_u32(&mut out[0..4], total as u32);
    out[8] = 2;
    out[12..16].copy_from_slice(b"scnr");
    out[16..20].copy_from_slice(b"RGB ");
    out[20..24].copy_from_slice(b"XYZ ");
    BigEndian::write_u32(&mut out[36..40], PROFILE_SIGNATURE);
    out.write_u32::<BigEndian>(1).unwrap();
    out.write_u32::<BigEndian>(TAG_A2B0).unwrap();
    out.write_u32::<BigEndian>(tag_offset as u32).unwrap();
    out.write_u32::<BigEndian>(tag.len() as u32).unwrap();
    out.extend_from_slice(&tag);
    out
}

/// Profile of a scanner that already matches the reference display.
///
/// Building a correction table from it yields (nearly) the identity.
pub fn reference_profile(grid: usize) -> Vec<u8> {
    let display = ReferenceDisplay::srgb().unwrap();
    profile_from_fn(grid, |rgb| {
        display.display_to_xyz(Vec3::from_array(rgb)).to_array()
    })
}

/// Profile of a scanner with a strong cast: its device red reads as
/// reference red scaled by `gain`, other channels unchanged.
pub fn red_gain_profile(grid: usize, gain: f64) -> Vec<u8> {
    let display = ReferenceDisplay::srgb().unwrap();
    profile_from_fn(grid, |[r, g, b]| {
        display
            .display_to_xyz(Vec3::new((r * gain).min(1.0), g, b))
            .to_array()
    })
}
