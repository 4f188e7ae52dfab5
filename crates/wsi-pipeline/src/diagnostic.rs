//! Diagnostic overlay: tile index text and corner markers.
//!
//! Drawn on decoded pixels before re-encoding so a viewer can see which
//! tile went where. Purely a debugging aid.

use crate::codec::DecodedTile;

/// 3x5 bitmap digits, one row per entry, bit 2 = leftmost column.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// Side of a corner marker in pixels.
pub const MARKER_SIZE: usize = 4;

const INK: [u8; 3] = [255, 0, 255];
const GLYPH_SCALE: usize = 2;
const MARGIN: usize = MARKER_SIZE + 2;

/// Draws `tile_index` near the top-left corner and a marker in each corner.
///
/// Drawing is clipped to the tile.
pub fn annotate(tile: &mut DecodedTile, tile_index: usize) {
    let (w, h) = (tile.width, tile.height);
    for (x0, y0) in [
        (0, 0),
        (w.saturating_sub(MARKER_SIZE), 0),
        (0, h.saturating_sub(MARKER_SIZE)),
        (w.saturating_sub(MARKER_SIZE), h.saturating_sub(MARKER_SIZE)),
    ] {
        fill(tile, x0, y0, MARKER_SIZE, MARKER_SIZE);
    }

    let advance = 4 * GLYPH_SCALE;
    for (i, digit) in tile_index.to_string().bytes().enumerate() {
        let glyph = &DIGITS[(digit - b'0') as usize];
        let x0 = MARGIN + i * advance;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) != 0 {
                    fill(
                        tile,
                        x0 + col * GLYPH_SCALE,
                        MARGIN + row * GLYPH_SCALE,
                        GLYPH_SCALE,
                        GLYPH_SCALE,
                    );
                }
            }
        }
    }
}

fn fill(tile: &mut DecodedTile, x0: usize, y0: usize, w: usize, h: usize) {
    for y in y0..(y0 + h).min(tile.height) {
        for x in x0..(x0 + w).min(tile.width) {
            let i = (y * tile.width + x) * 3;
            tile.pixels[i..i + 3].copy_from_slice(&INK);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: usize, height: usize) -> DecodedTile {
        DecodedTile {
            pixels: vec![0; width * height * 3],
            width,
            height,
        }
    }

    fn px(tile: &DecodedTile, x: usize, y: usize) -> [u8; 3] {
        let i = (y * tile.width + x) * 3;
        [tile.pixels[i], tile.pixels[i + 1], tile.pixels[i + 2]]
    }

    #[test]
    fn test_corner_markers() {
        let mut tile = blank(32, 32);
        annotate(&mut tile, 0);
        for (x, y) in [(0, 0), (31, 0), (0, 31), (31, 31), (3, 3), (28, 28)] {
            assert_eq!(px(&tile, x, y), INK, "({}, {})", x, y);
        }
        assert_eq!(px(&tile, 16, 31), [0, 0, 0]);
        assert_eq!(px(&tile, 4, 4), [0, 0, 0]);
    }

    #[test]
    fn test_digits_drawn() {
        let mut tile = blank(64, 32);
        annotate(&mut tile, 7);
        // Top row of a 7 is solid.
        assert_eq!(px(&tile, MARGIN, MARGIN), INK);
        assert_eq!(px(&tile, MARGIN + 5, MARGIN), INK);
        // Second row only has the right column.
        assert_eq!(px(&tile, MARGIN, MARGIN + 2), [0, 0, 0]);
        assert_eq!(px(&tile, MARGIN + 4, MARGIN + 2), INK);
    }

    #[test]
    fn test_clipped_on_tiny_tile() {
        let mut tile = blank(3, 2);
        annotate(&mut tile, 123_456);
        assert!(tile.pixels.chunks(3).all(|p| p == INK));
    }
}
