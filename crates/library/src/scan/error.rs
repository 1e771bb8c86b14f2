//! Error types for the [`scan`](super) module.

use derive_more::{Display, Error};

/// A scan error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a scan failure.
///
/// Files that vanished from disk are not errors: they are reported as
/// deletions or skips in the scan outcome.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A catalog read or write via [`quire_catalog::Repository`] failed.
    #[display("catalog error")]
    Catalog,
    /// A storage backend operation (stat, read, write, list) failed.
    #[display("storage error")]
    Storage,
    /// The file's metadata could not be parsed.
    #[display("could not parse metadata")]
    Parse,
    /// An immediate reorganization after a resync failed.
    #[display("organize failed")]
    Organize,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Catalog | Self::Storage)
    }
}
