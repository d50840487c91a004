use thiserror::Error;

use wal_decoder::DecodeError;

/// Top-level error taxonomy for the filter.
///
/// `Format`/`VersionNotSupported`/`Config`/`Assert` abort the stream;
/// a failed neighbor-segment fetch (`Service`) is downgraded to a `warn!`
/// and the filter falls back to best-effort pass-through instead of
/// propagating this variant.
#[derive(Debug, Error)]
pub enum WalFilterError {
    #[error("{0}")]
    Format(String),

    #[error("{0}")]
    VersionNotSupported(String),

    #[error("{0}")]
    Config(String),

    #[error("internal assertion failed: {0}")]
    Assert(String),

    #[error("error fetching neighbor segment: {0}")]
    Service(#[from] anyhow::Error),
}

impl From<DecodeError> for WalFilterError {
    /// `MixedRelationFilter` is a configuration conflict, not a format
    /// violation: the bytes are well-formed, the filter just can't be
    /// applied to this record without dropping part of it.
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::MixedRelationFilter { .. } => WalFilterError::Config(err.to_string()),
            other => WalFilterError::Format(other.to_string()),
        }
    }
}

impl From<postgres_ffi::PageHeaderError> for WalFilterError {
    fn from(err: postgres_ffi::PageHeaderError) -> Self {
        WalFilterError::Format(err.to_string())
    }
}
