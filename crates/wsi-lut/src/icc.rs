//! Reader for the device-to-PCS cube embedded in scanner ICC profiles.
//!
//! Scanner profiles carry their characterization as an `A2B0` tag of type
//! `mft2` (ICC lut16Type): a 3-input, 3-output color lookup table of side `N`
//! mapping device RGB to XYZ. Only the cube is extracted; the matrix, input
//! and output tables are bounds-checked so a truncated tag is rejected.
//!
//! # Layout
//!
//! ```text
//! header (128) | tag count (4) | tag entries (12 each: sig, offset, size)
//!
//! mft2 at tag offset:
//!   +0  'mft2'        +8  in channels   +9 out channels   +10 grid points
//!   +12 matrix 9 x s15Fixed16
//!   +48 input entries (u16)   +50 output entries (u16)
//!   +52 input tables | CLUT (grid^3 x 3 x u16, blue fastest) | output tables
//! ```

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, trace};

use crate::{LutError, LutResult};

/// `acsp` file signature at header offset 36.
pub const PROFILE_SIGNATURE: u32 = 0x6163_7370;
/// `A2B0` tag signature.
pub const TAG_A2B0: u32 = 0x4132_4230;
/// `mft2` (lut16Type) type signature.
pub const LUT16_TYPE: u32 = 0x6d66_7432;
/// `mft1` (lut8Type) type signature.
pub const LUT8_TYPE: u32 = 0x6d66_7431;

const HEADER_SIZE: usize = 128;
const TAG_ENTRY_SIZE: usize = 12;
const MAX_TAG_COUNT: usize = 1024;

/// Device-to-PCS color cube read from an embedded profile.
///
/// `samples` holds `size^3` entries ordered red-slowest, blue-fastest:
/// entry `(r, g, b)` lives at `(r * size + g) * size + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClutCube {
    /// Grid points per axis (`N >= 2`)
    pub size: usize,
    /// Raw 16-bit output samples
    pub samples: Vec<[u16; 3]>,
}

impl ClutCube {
    /// Creates a cube from raw samples.
    pub fn from_samples(size: usize, samples: Vec<[u16; 3]>) -> LutResult<Self> {
        if size < 2 {
            return Err(LutError::InvalidSize(format!(
                "cube needs at least 2 grid points, got {}",
                size
            )));
        }
        if samples.len() != size * size * size {
            return Err(LutError::InvalidSize(format!(
                "expected {} entries for size {}, got {}",
                size * size * size,
                size,
                samples.len()
            )));
        }
        Ok(Self { size, samples })
    }

    /// Flat index of vertex `(r, g, b)`.
    #[inline]
    pub fn index(&self, r: usize, g: usize, b: usize) -> usize {
        (r * self.size + g) * self.size + b
    }

    /// Sample at vertex `(r, g, b)`.
    #[inline]
    pub fn get(&self, r: usize, g: usize, b: usize) -> [u16; 3] {
        self.samples[self.index(r, g, b)]
    }

    /// White-point normalizer: the largest channel at the brightest corner.
    pub fn normalizer(&self) -> u16 {
        let n = self.size - 1;
        let corner = self.get(n, n, n);
        corner[0].max(corner[1]).max(corner[2])
    }
}

/// Reads the `A2B0` cube from a complete ICC profile.
///
/// # Errors
///
/// Returns [`LutError::Profile`] when the header signature, tag table,
/// tag type, channel counts or grid size do not match the expected layout,
/// or when any part of the tag lies outside the profile.
pub fn read_a2b0(profile: &[u8]) -> LutResult<ClutCube> {
    trace!(bytes = profile.len(), "icc::read_a2b0");

    if profile.len() < HEADER_SIZE + 4 {
        return Err(LutError::profile(format!(
            "{} bytes is too short for an ICC header",
            profile.len()
        )));
    }
    let signature = BigEndian::read_u32(&profile[36..40]);
    if signature != PROFILE_SIGNATURE {
        return Err(LutError::profile(format!(
            "bad file signature {:#010x}, expected 'acsp'",
            signature
        )));
    }
    let declared = BigEndian::read_u32(&profile[0..4]) as usize;
    if declared > profile.len() {
        return Err(LutError::profile(format!(
            "header declares {} bytes but only {} are present",
            declared,
            profile.len()
        )));
    }

    let (offset, size) = find_tag(profile, TAG_A2B0)?
        .ok_or_else(|| LutError::profile("no A2B0 tag"))?;
    let tag = slice(profile, offset, size, "A2B0 tag")?;
    parse_lut16(tag)
}

/// Looks up a tag in the tag table, returning `(offset, size)`.
fn find_tag(profile: &[u8], wanted: u32) -> LutResult<Option<(usize, usize)>> {
    let count = BigEndian::read_u32(&profile[HEADER_SIZE..HEADER_SIZE + 4]) as usize;
    if count > MAX_TAG_COUNT {
        return Err(LutError::profile(format!("implausible tag count {}", count)));
    }
    let table = slice(profile, HEADER_SIZE + 4, count * TAG_ENTRY_SIZE, "tag table")?;
    Ok(table.chunks_exact(TAG_ENTRY_SIZE).find_map(|entry| {
        (BigEndian::read_u32(&entry[0..4]) == wanted).then(|| {
            (
                BigEndian::read_u32(&entry[4..8]) as usize,
                BigEndian::read_u32(&entry[8..12]) as usize,
            )
        })
    }))
}

fn parse_lut16(tag: &[u8]) -> LutResult<ClutCube> {
    if tag.len() < 52 {
        return Err(LutError::profile(format!(
            "A2B0 tag of {} bytes is too short",
            tag.len()
        )));
    }
    match BigEndian::read_u32(&tag[0..4]) {
        LUT16_TYPE => {}
        LUT8_TYPE => return Err(LutError::profile("A2B0 is mft1; only mft2 is supported")),
        other => {
            return Err(LutError::profile(format!(
                "unexpected A2B0 type {:#010x}",
                other
            )));
        }
    }

    let in_chan = tag[8] as usize;
    let out_chan = tag[9] as usize;
    let grid = tag[10] as usize;
    if in_chan != 3 || out_chan != 3 {
        return Err(LutError::profile(format!(
            "expected 3 input and 3 output channels, got {} and {}",
            in_chan, out_chan
        )));
    }
    if grid < 2 {
        return Err(LutError::profile(format!("grid size {} is below 2", grid)));
    }

    let input_entries = BigEndian::read_u16(&tag[48..50]) as usize;
    let output_entries = BigEndian::read_u16(&tag[50..52]) as usize;
    for (name, entries) in [("input", input_entries), ("output", output_entries)] {
        if !(2..=4096).contains(&entries) {
            return Err(LutError::profile(format!(
                "{} table has {} entries, expected 2..=4096",
                name, entries
            )));
        }
    }

    let clut_start = 52 + in_chan * input_entries * 2;
    let clut_len = grid * grid * grid * out_chan * 2;
    let output_len = out_chan * output_entries * 2;
    slice(tag, clut_start + clut_len, output_len, "output tables")?;
    let clut = slice(tag, clut_start, clut_len, "CLUT")?;

    let samples = clut
        .chunks_exact(6)
        .map(|s| {
            [
                BigEndian::read_u16(&s[0..2]),
                BigEndian::read_u16(&s[2..4]),
                BigEndian::read_u16(&s[4..6]),
            ]
        })
        .collect();

    debug!(grid, input_entries, output_entries, "Read A2B0 cube");
    ClutCube::from_samples(grid, samples)
}

fn slice<'a>(data: &'a [u8], offset: usize, len: usize, what: &str) -> LutResult<&'a [u8]> {
    offset
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .map(|end| &data[offset..end])
        .ok_or_else(|| {
            LutError::profile(format!(
                "{} at {}+{} exceeds {} bytes",
                what,
                offset,
                len,
                data.len()
            ))
        })
}
