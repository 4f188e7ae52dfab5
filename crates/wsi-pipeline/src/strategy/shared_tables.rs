//! Strategy for abbreviated tiles sharing one `JPEGTables` blob.
//!
//! Tiles written this way carry neither codec tables nor a color marker.
//! Producers inject the Adobe no-transform marker into each tile
//! ([`SharedTables::prepare`]); the single consumer captures the directory's
//! tables on the first decode and splices them into every tile after that.
//!
//! Output tiles stay abbreviated. They are encoded with the captured
//! quantization tables and the standard Huffman tables, and every table
//! segment the blob already defines is dropped, so `JPEGTables` is never
//! rewritten and skipped tiles remain valid. Tables the blob does not hold
//! (16-bit steps, optimized Huffman codes, or requantized output) are kept
//! inside the tile. `APP0`/`APP14` are removed so readers fall back to the
//! directory's photometric interpretation.

use tracing::{debug, warn};
use wsi_container::Directory;
use wsi_core::{ByteStore, Error, Result};

use super::RecolorStrategy;
use crate::codec::{self, DecodedTile, EncodeLayout, QuantTables, TableSet, tile_error};

/// Tables captured from one directory's blob.
#[derive(Debug, Clone)]
struct Captured {
    body: Vec<u8>,
    tables: TableSet,
    quant: Option<QuantTables>,
}

/// Single-consumer codec state for one directory.
#[derive(Debug, Clone)]
pub struct SharedTables {
    quality: u8,
    requantize: bool,
    raw_tables: Option<Vec<u8>>,
    captured: Option<Captured>,
}

impl SharedTables {
    /// Creates the strategy.
    ///
    /// `quality` only applies when `requantize` is set or the directory's
    /// quantization tables cannot drive the encoder.
    pub fn new(quality: u8, requantize: bool) -> Self {
        Self {
            quality,
            requantize,
            raw_tables: None,
            captured: None,
        }
    }

    /// Producer-side step: inserts the Adobe no-transform marker.
    pub fn prepare(directory: usize, tile: usize, bytes: &[u8]) -> Result<Vec<u8>> {
        codec::inject_adobe_marker(bytes).map_err(tile_error(directory, tile))
    }

    /// Returns true once the tables have been captured from the blob.
    pub fn has_tables(&self) -> bool {
        self.captured.is_some()
    }

    fn capture(&mut self, directory: usize, tile: usize) -> Result<&Captured> {
        if self.captured.is_none() {
            let raw = self.raw_tables.as_deref().ok_or_else(|| {
                Error::format(format!("directory {} has no JPEGTables", directory))
            })?;
            let body = codec::table_body(raw).map_err(tile_error(directory, tile))?;
            let tables = TableSet::parse(raw).map_err(tile_error(directory, tile))?;
            let quant = tables.encoder_tables();
            if quant.is_none() && !self.requantize {
                warn!(
                    directory,
                    quality = self.quality,
                    "Shared quantization tables are not reusable; tiles will carry their own"
                );
            }
            debug!(
                directory,
                bytes = body.len(),
                tables = tables.len(),
                "Captured shared JPEG tables"
            );
            self.captured = Some(Captured {
                body: body.to_vec(),
                tables,
                quant,
            });
        }
        self.captured
            .as_ref()
            .ok_or_else(|| Error::format(format!("directory {} has no JPEGTables", directory)))
    }
}

impl RecolorStrategy for SharedTables {
    fn per_directory_setup(&mut self, store: &ByteStore, directory: &Directory) -> Result<()> {
        let range = directory.jpeg_tables.ok_or_else(|| {
            Error::format(format!(
                "directory {} has no JPEGTables for the shared-tables strategy",
                directory.index
            ))
        })?;
        self.raw_tables = Some(store.read(range.start, range.end)?);
        self.captured = None;
        Ok(())
    }

    fn decode_tile(&mut self, directory: usize, tile: usize, bytes: &[u8]) -> Result<DecodedTile> {
        let captured = self.capture(directory, tile)?;
        let merged =
            codec::merge_tables(&captured.body, bytes).map_err(tile_error(directory, tile))?;
        codec::decode_rgb(&merged).map_err(tile_error(directory, tile))
    }

    fn reencode_tile(
        &self,
        directory: usize,
        tile: usize,
        decoded: &DecodedTile,
    ) -> Result<Vec<u8>> {
        let captured = self.captured.as_ref().ok_or_else(|| {
            Error::codec(directory, tile, "encode requested before tables were captured")
        })?;
        let quant = if self.requantize { None } else { captured.quant.as_ref() };
        let full = codec::encode_rgb(decoded, self.quality, quant, EncodeLayout::RawRgb)
            .map_err(tile_error(directory, tile))?;
        captured.tables.abbreviate(&full).map_err(tile_error(directory, tile))
    }
}
