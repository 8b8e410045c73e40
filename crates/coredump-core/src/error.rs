//! Error types for crash-dump extraction.
//!
//! Every failure in a transfer session is terminal: nothing here is retried.
//! The request dispatcher receives a single [`DumpError`] and decides what
//! the client sees.

use thiserror::Error;

use crate::region::RegionId;

/// Failure reported by the underlying storage region.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The read would extend past the end of the region.
    #[error("Read of {len} bytes at offset {offset} is out of bounds (region size {size})")]
    OutOfBounds { offset: u64, len: usize, size: u64 },

    /// The device or file reported an I/O failure.
    #[error("Storage I/O failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Failure reported by the HTTP connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The peer closed the connection.
    #[error("Connection closed by peer")]
    Closed,

    /// The connection failed while writing.
    #[error("Connection write failed: {0}")]
    Io(String),

    /// A write was attempted after the writer was finished or poisoned.
    #[error("Response writer is no longer usable")]
    Unusable,
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Io(err.to_string()),
        }
    }
}

/// Invalid region layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("Block size must be greater than zero")]
    ZeroBlockSize,

    #[error("Total size must be greater than zero")]
    ZeroTotalSize,
}

/// Terminal outcome of a failed transfer session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DumpError {
    /// The named storage region does not exist.
    #[error("Region not found: {0}")]
    RegionNotFound(RegionId),

    /// Reading a block from the region failed.
    #[error("Failed to read {len} bytes at offset {offset}: {source}")]
    StorageRead {
        offset: u64,
        len: usize,
        #[source]
        source: StorageError,
    },

    /// Writing a chunk to the client failed.
    #[error("Failed to write response: {0}")]
    TransportWrite(#[from] TransportError),

    /// The configured layout cannot be streamed.
    #[error("Invalid region layout: {0}")]
    Layout(#[from] LayoutError),
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON could not be parsed.
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field failed validation.
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
