//! # wsi-core
//!
//! Core types shared by every stage of whole-slide container rewriting.
//!
//! - [`ByteStore`] - chunked, range-checked byte array over the whole container
//! - [`Error`] / [`Result`] - the fatal error taxonomy (I/O, format, range, capacity)
//!
//! # Dependencies
//!
//! - [`thiserror`] - Error derive
//! - [`tracing`] - Structured logging
//!
//! # Used By
//!
//! - `wsi-container` - Directory parsing reads through the store
//! - `wsi-lut` - Profile errors convert into [`Error::Format`]
//! - `wsi-pipeline` - Tile reads and the single writer's patches

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod store;

pub use error::{Error, Result};
pub use store::{ByteStore, DEFAULT_CHUNK_SIZE};
