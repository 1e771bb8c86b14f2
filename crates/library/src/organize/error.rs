//! Error types for the [`organize`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};

/// An organize error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for organize operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an organize failure.
///
/// ### Operational Errors
/// - [`ErrorKind::Conflict`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Catalog`]
/// - [`ErrorKind::Storage`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A catalog lookup or update via [`quire_catalog::Repository`] failed.
    #[display("catalog error")]
    Catalog,
    /// A storage backend operation (stat, list, rename) failed.
    #[display("storage error")]
    Storage,
    /// No free name was found for a file or directory within the attempt limit.
    #[display("no free name for {_0}")]
    Conflict(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Catalog | Self::Storage)
    }
}
