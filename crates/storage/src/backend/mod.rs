//! Storage backend trait and implementations.
//!
//! A library root is served by one [`StorageBackend`]; every path handed to a
//! backend is relative to that root.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::models::{Entry, FileInfo};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// ```
/// use std::path::Path;
/// use quire_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of(backend: &dyn StorageBackend, path: &Path) -> Result<u64> {
///     if backend.exists(path).await? {
///         Ok(backend.stat(path).await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, for logging only.
    fn name(&self) -> &str;

    /// List all files (recursively) matching an optional prefix.
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream file metadata (recursively) matching an optional prefix.
    ///
    /// Prefixes match whole path components: `Sub` matches `Sub/file.epub`
    /// but not `Subdir/file.epub`. A prefix that doesn't exist yields nothing.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Immediate entries of a directory (files and sub-directories), sorted by
    /// path. `None` lists the root. A missing directory has no entries.
    async fn children(&self, dir: Option<&Path>) -> Result<Vec<Entry>>;

    /// Check if a file or directory exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write file contents, creating parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Move a file within the backend, creating parent directories as needed.
    ///
    /// Never overwrites: returns [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists)
    /// if the destination is taken, and [`NotFound`](crate::error::ErrorKind::NotFound)
    /// if the source is missing.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Remove an empty directory.
    ///
    /// Returns [`NotEmpty`](crate::error::ErrorKind::NotEmpty) if anything is
    /// left inside it.
    async fn remove_dir(&self, path: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;
}
