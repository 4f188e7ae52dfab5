//! Per-vendor tile codec strategies.
//!
//! Both strategies share the coordinator in [`crate::pipeline`]; they differ
//! only in how a tile's bytes become pixels and back.
//!
//! - [`SelfContained`] - each tile is a complete JPEG stream; any number of
//!   workers may decode and encode in parallel
//! - [`SharedTables`] - tiles are abbreviated streams that need the
//!   directory's `JPEGTables`; a single consumer owns the codec state

mod self_contained;
mod shared_tables;

pub use self_contained::SelfContained;
pub use shared_tables::SharedTables;

use wsi_container::Directory;
use wsi_core::{ByteStore, Result};
use wsi_lut::DenseLut;

use crate::codec::DecodedTile;
use crate::diagnostic::annotate;
use crate::options::{RecolorOptions, StrategyKind};

/// Decode and re-encode capability shared by all strategies.
pub trait RecolorStrategy {
    /// Prepares codec state before the first tile of `directory`.
    fn per_directory_setup(&mut self, store: &ByteStore, directory: &Directory) -> Result<()>;

    /// Decodes one tile to RGB8.
    fn decode_tile(&mut self, directory: usize, tile: usize, bytes: &[u8]) -> Result<DecodedTile>;

    /// Encodes corrected pixels back into the strategy's tile format.
    fn reencode_tile(&self, directory: usize, tile: usize, decoded: &DecodedTile)
        -> Result<Vec<u8>>;

    /// Decodes, corrects through `lut`, optionally annotates and re-encodes.
    fn recolor_tile(
        &mut self,
        directory: usize,
        tile: usize,
        bytes: &[u8],
        lut: &DenseLut,
        overlay: bool,
    ) -> Result<Vec<u8>> {
        let mut decoded = self.decode_tile(directory, tile, bytes)?;
        lut.apply_rgb_in_place(&mut decoded.pixels);
        if overlay {
            annotate(&mut decoded, tile);
        }
        self.reencode_tile(directory, tile, &decoded)
    }
}

/// Concrete strategy for one directory.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Independent JPEG streams
    SelfContained(SelfContained),
    /// Abbreviated streams with shared tables
    SharedTables(SharedTables),
}

impl Strategy {
    /// Resolves the configured kind against a directory's structure.
    ///
    /// `Auto` picks shared tables exactly when the directory carries
    /// `JPEGTables`.
    pub fn for_directory(options: &RecolorOptions, directory: &Directory) -> Self {
        let quality = options.quality;
        let shared = match options.strategy {
            StrategyKind::Auto => directory.jpeg_tables.is_some(),
            StrategyKind::SelfContained => false,
            StrategyKind::SharedTables => true,
        };
        if shared {
            Self::SharedTables(SharedTables::new(quality, options.requantize))
        } else {
            Self::SelfContained(SelfContained::new(quality))
        }
    }

    /// Returns the resolved kind.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::SelfContained(_) => StrategyKind::SelfContained,
            Self::SharedTables(_) => StrategyKind::SharedTables,
        }
    }
}

impl RecolorStrategy for Strategy {
    fn per_directory_setup(&mut self, store: &ByteStore, directory: &Directory) -> Result<()> {
        match self {
            Self::SelfContained(s) => s.per_directory_setup(store, directory),
            Self::SharedTables(s) => s.per_directory_setup(store, directory),
        }
    }

    fn decode_tile(&mut self, directory: usize, tile: usize, bytes: &[u8]) -> Result<DecodedTile> {
        match self {
            Self::SelfContained(s) => s.decode_tile(directory, tile, bytes),
            Self::SharedTables(s) => s.decode_tile(directory, tile, bytes),
        }
    }

    fn reencode_tile(
        &self,
        directory: usize,
        tile: usize,
        decoded: &DecodedTile,
    ) -> Result<Vec<u8>> {
        match self {
            Self::SelfContained(s) => s.reencode_tile(directory, tile, decoded),
            Self::SharedTables(s) => s.reencode_tile(directory, tile, decoded),
        }
    }
}
