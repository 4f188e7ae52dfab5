//! # wsi-container
//!
//! Directory and tile-run parser for TIFF-derived whole-slide containers.
//!
//! Supports exactly what recoloring needs: classic TIFF in either byte order,
//! tile offset/length arrays with the location of every value, shared JPEG
//! tables, and the embedded ICC profile. Everything else is skipped.
//!
//! # Usage
//!
//! ```rust,ignore
//! use wsi_core::ByteStore;
//! use wsi_container::Container;
//!
//! let mut store = ByteStore::open("slide.svs")?;
//! let container = Container::parse(&store)?;
//! let profile = container.profile_bytes(&store)?;
//! container.invalidate_profile(&mut store)?;
//! ```
//!
//! # Dependencies
//!
//! - [`wsi-core`] - Byte store and errors
//! - [`byteorder`] - Endian-aware field access
//!
//! # Used By
//!
//! - `wsi-pipeline` - Tile runs and field slots to patch
//! - `wsi-cli` - `info` listing

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod directory;
mod endian;
mod parse;
pub mod tags;

pub use directory::{
    group_runs, ByteRange, Directory, DirectoryKind, FieldSlot, ProfileRef, Tile, TileRun,
};
pub use endian::Endian;
pub use parse::Container;
pub use tags::{is_jpeg_compression, tag, FieldType};
