//! # wsi-lut
//!
//! Scanner color-correction tables built from embedded ICC profiles.
//!
//! A scanner profile characterizes device RGB as XYZ through an `N x N x N`
//! cube. This crate carries that cube back into display RGB through a fixed
//! reference display and expands it into a [`DenseLut`] with one entry per
//! 24-bit color, so recoloring a pixel costs one table load.
//!
//! # Pipeline
//!
//! ```text
//! profile bytes -> ClutCube (N^3 u16 XYZ)
//!               -> CoarseLut (N^3 display RGB, via ReferenceDisplay)
//!               -> DenseLut (256^3 packed RGB, trilinear, parallel)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use wsi_lut::{DenseLut, LazyCorrection};
//!
//! let lazy = LazyCorrection::ready(DenseLut::identity());
//! let lut = lazy.get().unwrap();
//! assert_eq!(lut.map_rgb(10, 20, 30), [10, 20, 30]);
//! ```
//!
//! # Dependencies
//!
//! - [`wsi-math`] - Matrices and interpolation
//! - [`rayon`] - Parallel upsampling
//! - [`byteorder`] - Big-endian ICC fields
//! - [`thiserror`] - Error handling
//!
//! # Used By
//!
//! - `wsi-pipeline` - Per-pixel correction
//! - `wsi-cli` - Profile summary in `info`

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod build;
mod cube;
mod curve;
mod dense;
mod error;
pub mod icc;
mod reference;

pub use build::{build_correction, LazyCorrection};
pub use cube::CoarseLut;
pub use curve::{ToneCurve, REFERENCE_CURVE_POINTS};
pub use dense::{pack_rgb, quantize, unpack_rgb, DenseLut, DENSE_AXIS, DENSE_SIZE};
pub use error::{LutError, LutResult};
pub use icc::{read_a2b0, ClutCube};
pub use reference::{ReferenceDisplay, SRGB_D50_TO_XYZ};
