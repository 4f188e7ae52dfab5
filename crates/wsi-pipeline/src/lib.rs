//! # wsi-pipeline
//!
//! Concurrent tile recoloring for whole-slide containers.
//!
//! Tiles are decoded, mapped through the dense correction table, re-encoded
//! and packed back into the exact byte runs they came from. A fixed pool of
//! workers produces tiles; a single writer patches the store.
//!
//! - [`Recolorer`] - per-directory coordinator and run writer
//! - [`Strategy`] / [`RecolorStrategy`] - self-contained vs shared-table JPEG tiles
//! - [`RecolorOptions`] - workers, quality, skip sampling, diagnostic overlay
//! - [`Progress`] - counters for an external reporter
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wsi_core::ByteStore;
//! use wsi_container::Container;
//! use wsi_lut::LazyCorrection;
//! use wsi_pipeline::{Progress, Recolorer, RecolorOptions};
//!
//! let mut store = ByteStore::open("slide.svs")?;
//! let container = Container::parse(&store)?;
//! let profile = container.profile_bytes(&store)?.expect("profile");
//! let correction = LazyCorrection::from_profile(profile);
//!
//! let progress = Arc::new(Progress::new());
//! Recolorer::new(&container, &correction, RecolorOptions::default())
//!     .with_progress(progress.clone())
//!     .run(&mut store)?;
//! store.flush("slide_recolored.svs")?;
//! ```
//!
//! # Dependencies
//!
//! - [`jpeg-decoder`] / [`jpeg-encoder`] - Tile codec
//! - [`tracing`] - Structured logging
//!
//! # Used By
//!
//! - `wsi-cli` - `recolor` command

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod diagnostic;
mod options;
mod pipeline;
mod progress;
mod staging;
pub mod strategy;
pub mod writer;

pub use codec::{CodecError, DecodedTile};
pub use options::{RecolorOptions, StrategyKind};
pub use pipeline::{RecolorReport, Recolorer};
pub use progress::{Progress, ProgressSnapshot};
pub use staging::StagingArea;
pub use strategy::{RecolorStrategy, SelfContained, SharedTables, Strategy};
pub use writer::{plan_run, write_run, Placement};
