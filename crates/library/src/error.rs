//! Library Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was rejected before any I/O took place.
    #[display("invalid scan request: {_0}")]
    InvalidRequest(#[error(not(source))] &'static str),
    /// The path is not under any mounted library root.
    #[display("path is not inside a library: {}", _0.display())]
    NotMounted(#[error(not(source))] PathBuf),
    #[display("storage error")]
    Storage,
    #[display("search index error")]
    Index,
    #[display("scan failed")]
    Scan,
    #[display("organize failed")]
    Organize,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Index | Self::Scan | Self::Organize)
    }
}
