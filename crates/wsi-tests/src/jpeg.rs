//! JPEG tile fixtures: self-contained tiles and the abbreviated form with
//! tables split out into a shared `JPEGTables` blob.

use jpeg_encoder::{ColorType, Encoder, SamplingFactor};

/// `APP14` Adobe segment with color transform 0 (no YCbCr conversion).
pub const ADOBE_RGB_MARKER: [u8; 16] = [
    0xFF, 0xEE, 0x00, 0x0E, b'A', b'd', b'o', b'b', b'e', 0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Encodes RGB8 pixels as a self-contained JFIF tile.
pub fn encode_rgb(pixels: &[u8], width: usize, height: usize, quality: u8) -> Vec<u8> {
    let mut out = Vec::new();
    Encoder::new(&mut out, quality)
        .encode(pixels, width as u16, height as u16, ColorType::Rgb)
        .unwrap();
    out
}

/// Encodes RGB8 pixels without color conversion, stored as if already YCbCr.
///
/// This is how scanners that write RGB-photometric JPEG tiles lay out their
/// data; a decoder only reads it back correctly when told not to transform.
pub fn encode_raw_rgb(pixels: &[u8], width: usize, height: usize, quality: u8) -> Vec<u8> {
    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, quality);
    encoder.set_sampling_factor(SamplingFactor::F_1_1);
    encoder
        .encode(pixels, width as u16, height as u16, ColorType::Ycbcr)
        .unwrap();
    out
}

/// Header segments (marker byte, full segment bytes) and the scan that follows.
pub fn segments(jpeg: &[u8]) -> (Vec<(u8, &[u8])>, &[u8]) {
    assert_eq!(&jpeg[..2], &SOI, "missing SOI");
    let mut out = Vec::new();
    let mut i = 2;
    loop {
        assert_eq!(jpeg[i], 0xFF, "expected marker at {}", i);
        let marker = jpeg[i + 1];
        if marker == 0xDA {
            return (out, &jpeg[i..]);
        }
        let len = u16::from_be_bytes([jpeg[i + 2], jpeg[i + 3]]) as usize;
        out.push((marker, &jpeg[i..i + 2 + len]));
        i += 2 + len;
    }
}

/// Splits a full JPEG into a tables-only stream and an abbreviated tile.
///
/// Tables keep their SOI/EOI framing like a `JPEGTables` tag; the tile keeps
/// SOI, frame header and scan but loses its tables and `APPn` segments.
pub fn abbreviate(jpeg: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let (segs, scan) = segments(jpeg);
    let mut tables = SOI.to_vec();
    let mut tile = SOI.to_vec();
    for (marker, bytes) in segs {
        match marker {
            0xDB | 0xC4 => tables.extend_from_slice(bytes),
            0xE0..=0xEF => {}
            _ => tile.extend_from_slice(bytes),
        }
    }
    tables.extend_from_slice(&EOI);
    tile.extend_from_slice(scan);
    (tables, tile)
}

/// Encodes tiles the way shared-table scanners do.
///
/// Returns the shared tables and one abbreviated stream per tile.
pub fn shared_table_tiles(
    tiles: &[Vec<u8>],
    width: usize,
    height: usize,
    quality: u8,
) -> (Vec<u8>, Vec<Vec<u8>>) {
    let mut shared: Option<Vec<u8>> = None;
    let mut out = Vec::with_capacity(tiles.len());
    for pixels in tiles {
        let (tables, tile) = abbreviate(&encode_raw_rgb(pixels, width, height, quality));
        match &shared {
            Some(existing) => assert_eq!(existing, &tables, "tables differ between tiles"),
            None => shared = Some(tables),
        }
        out.push(tile);
    }
    (shared.unwrap_or_default(), out)
}

/// Re-joins shared tables with an abbreviated tile.
pub fn merge(tables: &[u8], tile: &[u8]) -> Vec<u8> {
    let mut out = SOI.to_vec();
    out.extend_from_slice(&tables[2..tables.len() - 2]);
    out.extend_from_slice(&tile[2..]);
    out
}

/// Inserts the Adobe no-transform marker after SOI.
pub fn with_adobe_marker(jpeg: &[u8]) -> Vec<u8> {
    let mut out = SOI.to_vec();
    out.extend_from_slice(&ADOBE_RGB_MARKER);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Decodes to `(pixels, width, height)`.
pub fn decode(jpeg: &[u8]) -> (Vec<u8>, usize, usize) {
    let mut decoder = jpeg_decoder::Decoder::new(jpeg);
    let pixels = decoder.decode().unwrap();
    let info = decoder.info().unwrap();
    (pixels, info.width as usize, info.height as usize)
}

/// Decodes a stream whose samples are raw RGB.
pub fn decode_raw_rgb(jpeg: &[u8]) -> (Vec<u8>, usize, usize) {
    decode(&with_adobe_marker(jpeg))
}

/// Returns true if the stream has a segment with this marker before the scan.
pub fn has_marker(jpeg: &[u8], marker: u8) -> bool {
    segments(jpeg).0.iter().any(|(m, _)| *m == marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels;

    #[test]
    fn test_abbreviate_and_merge() {
        let px = pixels::gradient(32, 16, 3);
        let full = encode_raw_rgb(&px, 32, 16, 90);
        let (tables, tile) = abbreviate(&full);
        assert!(!has_marker(&tile, 0xDB));
        assert!(has_marker(&tables, 0xDB));
        let (decoded, w, h) = decode_raw_rgb(&merge(&tables, &tile));
        assert_eq!((w, h), (32, 16));
        assert!(pixels::mean_abs_diff(&decoded, &px) < 4.0);
    }

    #[test]
    fn test_self_contained_roundtrip() {
        let px = pixels::gradient(16, 16, 0);
        let (decoded, w, h) = decode(&encode_rgb(&px, 16, 16, 95));
        assert_eq!((w, h), (16, 16));
        assert!(pixels::mean_abs_diff(&decoded, &px) < 4.0);
    }
}
