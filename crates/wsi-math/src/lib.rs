//! # wsi-math
//!
//! Small numeric toolkit used by the correction-table build.
//!
//! - [`Mat3`] - 3x3 matrices (reference RGB to XYZ and its inverse)
//! - [`Vec3`] - color triplets
//! - [`lerp`], [`inverse_lerp`], [`trilerp`] - interpolation primitives
//!
//! All arithmetic is `f64`. The table build runs once per container, so the
//! extra precision costs nothing measurable and keeps vertex values exact.
//!
//! # Used By
//!
//! - `wsi-lut` - Tone curve inversion, matrix inversion, cube upsampling

#![warn(missing_docs)]

mod interp;
mod mat3;
mod vec3;

pub use interp::{inverse_lerp, lerp, trilerp};
pub use mat3::Mat3;
pub use vec3::Vec3;
