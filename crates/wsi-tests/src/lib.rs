//! Fixtures and end-to-end tests for the recoloring workspace.
//!
//! Builders synthesize everything a test needs in memory:
//!
//! - [`container`] - classic TIFF containers in either byte order
//! - [`jpeg`] - self-contained and shared-table JPEG tiles
//! - [`icc`] - ICC profiles carrying an `mft2` device cube
//! - [`pixels`] - deterministic RGB patterns
//!
//! The scenarios themselves live under `tests/`.

pub mod container;
pub mod icc;
pub mod jpeg;
pub mod pixels;

pub use container::{ContainerBuilder, DirectorySpec};
