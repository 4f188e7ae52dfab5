//! Strategy for tiles that are complete JPEG streams.

use wsi_container::Directory;
use wsi_core::{ByteStore, Result};

use super::RecolorStrategy;
use crate::codec::{self, DecodedTile, EncodeLayout, tile_error};

/// Decodes and encodes each tile on its own. Stateless apart from quality,
/// so every worker holds its own copy.
#[derive(Debug, Clone)]
pub struct SelfContained {
    quality: u8,
}

impl SelfContained {
    /// Creates the strategy with an encode quality.
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }
}

impl RecolorStrategy for SelfContained {
    fn per_directory_setup(&mut self, _store: &ByteStore, _directory: &Directory) -> Result<()> {
        Ok(())
    }

    fn decode_tile(&mut self, directory: usize, tile: usize, bytes: &[u8]) -> Result<DecodedTile> {
        codec::decode_rgb(bytes).map_err(tile_error(directory, tile))
    }

    fn reencode_tile(
        &self,
        directory: usize,
        tile: usize,
        decoded: &DecodedTile,
    ) -> Result<Vec<u8>> {
        codec::encode_rgb(decoded, self.quality, None, EncodeLayout::Jfif)
            .map_err(tile_error(directory, tile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsi_lut::DenseLut;
    use wsi_tests::{jpeg, pixels};

    #[test]
    fn test_recolor_applies_lut() {
        let src = pixels::flat(16, 16, [100, 150, 200]);
        let tile = jpeg::encode_rgb(&src, 16, 16, 95);
        let invert = DenseLut::from_fn(|r, g, b| [255 - r, 255 - g, 255 - b]);

        let mut strategy = SelfContained::new(95);
        let out = strategy.recolor_tile(0, 0, &tile, &invert, false).unwrap();
        let (decoded, w, h) = jpeg::decode(&out);
        assert_eq!((w, h), (16, 16));
        let expected = pixels::flat(16, 16, [155, 105, 55]);
        assert!(pixels::mean_abs_diff(&decoded, &expected) < 3.0);
    }

    #[test]
    fn test_corrupt_tile_is_codec_error() {
        let mut strategy = SelfContained::new(80);
        let err = strategy.decode_tile(2, 5, b"garbage").unwrap_err();
        assert!(matches!(
            err,
            wsi_core::Error::Codec {
                directory: 2,
                tile: 5,
                ..
            }
        ));
    }
}
