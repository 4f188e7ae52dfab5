//! Correction-table error types.

use thiserror::Error;

/// Result type for table construction.
pub type LutResult<T> = Result<T, LutError>;

/// Errors that can occur while building a correction table.
///
/// All of these surface to the pipeline as [`wsi_core::Error::Format`]: a
/// table built from a malformed profile is numerically meaningless.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LutError {
    /// Invalid table or curve size.
    #[error("invalid LUT size: {0}")]
    InvalidSize(String),

    /// Embedded color profile does not have the expected layout.
    #[error("color profile: {0}")]
    Profile(String),

    /// Reference matrix cannot be inverted.
    #[error("reference matrix is singular")]
    Singular,
}

impl LutError {
    /// Creates a [`LutError::Profile`] error.
    #[inline]
    pub fn profile(msg: impl Into<String>) -> Self {
        Self::Profile(msg.into())
    }
}

impl From<LutError> for wsi_core::Error {
    fn from(err: LutError) -> Self {
        wsi_core::Error::format(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_to_format_error() {
        let err: wsi_core::Error = LutError::profile("bad mft2 signature").into();
        assert!(err.is_format_error());
        assert!(err.to_string().contains("bad mft2 signature"));
    }
}
