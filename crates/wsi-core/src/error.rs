//! Error types for container rewriting.
//!
//! Every failure in the rewrite core is fatal to the whole run: offsets computed
//! after a bad read are meaningless, and the container has no room to grow when a
//! run overflows. The [`Error`] enum therefore carries enough structured detail
//! (directory, run, tile, byte counts) to diagnose a failure without re-running.
//!
//! # Categories
//!
//! - **I/O**: [`Io`](Error::Io) - open/read/write failures on the container
//! - **Format**: [`Format`](Error::Format), [`Codec`](Error::Codec) - structure the
//!   parser or decoder cannot accept
//! - **Addressing**: [`Range`](Error::Range) - a byte range outside the store
//! - **Capacity**: [`Capacity`](Error::Capacity) - recolored tiles do not fit their run
//!
//! # Usage
//!
//! ```rust
//! use wsi_core::{Error, Result};
//!
//! fn check_budget(available: u64, required: u64) -> Result<()> {
//!     if required > available {
//!         return Err(Error::capacity(0, 3, available, required));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_budget(100, 120).unwrap_err().is_capacity_error());
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rewriting a container.
#[derive(Debug, Error)]
pub enum Error {
    /// File open/read/write failure.
    ///
    /// Never retried: the tool works on one irreplaceable input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected structure in the container or its color profile.
    #[error("format error: {0}")]
    Format(String),

    /// Byte range outside the store, or a write whose payload length does not
    /// match its range.
    #[error("byte range [{start}, {end}) invalid for store of {len} bytes")]
    Range {
        /// Range start (inclusive)
        start: u64,
        /// Range end (exclusive)
        end: u64,
        /// Store length
        len: u64,
    },

    /// Recolored tiles of a run exceed the run's original byte budget.
    ///
    /// The encode quality must be lowered; the container cannot grow.
    #[error(
        "tile run {run} of directory {directory} needs {required} bytes but only {available} are available; lower the encode quality"
    )]
    Capacity {
        /// Directory index
        directory: usize,
        /// Run index within the directory
        run: usize,
        /// Original byte length of the run
        available: u64,
        /// Sum of staged tile lengths
        required: u64,
    },

    /// JPEG decode or encode failure for a single tile.
    #[error("codec error in directory {directory}, tile {tile}: {message}")]
    Codec {
        /// Directory index
        directory: usize,
        /// Tile index within the directory
        tile: usize,
        /// Codec diagnostic
        message: String,
    },

    /// Another task failed first and the run was torn down.
    #[error("aborted after failure in a sibling task")]
    Aborted,
}

impl Error {
    /// Creates an [`Error::Format`] error.
    #[inline]
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Creates an [`Error::Range`] error.
    #[inline]
    pub fn range(start: u64, end: u64, len: u64) -> Self {
        Self::Range { start, end, len }
    }

    /// Creates an [`Error::Capacity`] error.
    #[inline]
    pub fn capacity(directory: usize, run: usize, available: u64, required: u64) -> Self {
        Self::Capacity {
            directory,
            run,
            available,
            required,
        }
    }

    /// Creates an [`Error::Codec`] error.
    #[inline]
    pub fn codec(directory: usize, tile: usize, message: impl Into<String>) -> Self {
        Self::Codec {
            directory,
            tile,
            message: message.into(),
        }
    }

    /// Returns `true` if this is an I/O error.
    #[inline]
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns `true` if this is a format or codec error.
    #[inline]
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Format(_) | Self::Codec { .. })
    }

    /// Returns `true` if this is a range error.
    #[inline]
    pub fn is_range_error(&self) -> bool {
        matches!(self, Self::Range { .. })
    }

    /// Returns `true` if this is a capacity error.
    #[inline]
    pub fn is_capacity_error(&self) -> bool {
        matches!(self, Self::Capacity { .. })
    }

    /// Returns `true` for the secondary error reported by torn-down tasks.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message() {
        let err = Error::capacity(2, 7, 4096, 5000);
        let msg = err.to_string();
        assert!(msg.contains("run 7"));
        assert!(msg.contains("directory 2"));
        assert!(msg.contains("4096"));
        assert!(msg.contains("5000"));
        assert!(msg.contains("quality"));
        assert!(err.is_capacity_error());
    }

    #[test]
    fn test_range_message() {
        let err = Error::range(10, 20, 15);
        assert!(err.to_string().contains("[10, 20)"));
        assert!(err.is_range_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.is_io_error());
    }

    #[test]
    fn test_codec_is_format() {
        let err = Error::codec(0, 12, "bad huffman code");
        assert!(err.is_format_error());
        assert!(err.to_string().contains("tile 12"));
    }
}
