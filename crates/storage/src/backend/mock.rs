//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::{Entry, EntryKind, FileInfo};
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Only files are stored; a directory exists for as long as some file lives
/// under it.
///
/// ```
/// use quire_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("Dune/Dune.epub", b"epub"),
/// ]);
/// assert!(backend.exists(Path::new("Dune")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<BTreeMap<PathBuf, (UtcDateTime, Vec<u8>)>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation: broken test setup should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = BTreeMap::new();
        let now = UtcDateTime::now();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self { name: "mock".to_string(), storage: RwLock::new(map) }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Every stored file path, sorted.
    pub async fn paths(&self) -> Vec<PathBuf> {
        self.storage.read().await.keys().cloned().collect()
    }

    fn file_info(path: &Path, size: u64, inserted: UtcDateTime) -> FileInfo {
        FileInfo::new(path, size, inserted)
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        Box::pin(stream! {
            // Snapshot under the read lock so it isn't held across yields.
            let entries: Vec<(PathBuf, UtcDateTime, u64)> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(path, _)| validated_prefix.as_ref().is_none_or(|pfx| path.starts_with(pfx)))
                    .map(|(path, (inserted, data))| (path.clone(), *inserted, data.len() as u64))
                    .collect()
            };
            for (path, inserted, size) in entries {
                yield Ok(Self::file_info(&path, size, inserted));
            }
        })
    }

    async fn children(&self, dir: Option<&Path>) -> Result<Vec<Entry>> {
        let dir = dir.map(validate_path).transpose()?;
        let guard = self.storage.read().await;
        let mut files = BTreeSet::new();
        let mut dirs = BTreeSet::new();
        for path in guard.keys() {
            let rest = match &dir {
                Some(dir) => match path.strip_prefix(dir) {
                    Ok(rest) => rest,
                    Err(_) => continue,
                },
                None => path.as_path(),
            };
            let mut components = rest.components();
            let Some(first) = components.next() else { continue };
            let child = dir.as_deref().map_or_else(|| PathBuf::from(first.as_os_str()), |d| d.join(first));
            match components.next() {
                Some(_) => dirs.insert(child),
                None => files.insert(child),
            };
        }
        let mut children: Vec<Entry> = dirs
            .into_iter()
            .map(|path| Entry { path, kind: EntryKind::Directory })
            .chain(files.into_iter().map(|path| Entry { path, kind: EntryKind::File }))
            .collect();
        children.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(children)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        Ok(guard.contains_key(&path) || guard.keys().any(|p| p.starts_with(&path)))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let (_inserted, data) =
            self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(data)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        self.storage.write().await.insert(path, (UtcDateTime::now(), data.to_vec()));
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        let mut guard = self.storage.write().await;
        if guard.contains_key(&to) {
            exn::bail!(ErrorKind::AlreadyExists(to));
        }
        let data = guard.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        guard.insert(to, data);
        Ok(())
    }

    async fn remove_dir(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        if self.storage.read().await.keys().any(|p| p.starts_with(&path)) {
            exn::bail!(ErrorKind::NotEmpty(path));
        }
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        let (inserted, data) = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(Self::file_info(&path, data.len() as u64, *inserted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let backend = MockBackend::default();
        backend.write(Path::new("Dune/Dune.epub"), b"hello").await.unwrap();
        assert_eq!(backend.read(Path::new("Dune/Dune.epub")).await.unwrap(), b"hello");
        assert!(backend.exists(Path::new("Dune")).await.unwrap());
        assert!(!backend.exists(Path::new("Dun")).await.unwrap());
    }

    #[tokio::test]
    async fn test_children() {
        let backend = MockBackend::with_files([
            ("Book/book.epub", "1"),
            ("Book/notes.pdf", "2"),
            ("Book/Extras/art.png", "3"),
            ("root.m4b", "4"),
        ]);
        let children = backend.children(Some(Path::new("Book"))).await.unwrap();
        let summary: Vec<_> = children.iter().map(|e| (e.path.clone(), e.kind)).collect();
        assert_eq!(
            summary,
            vec![
                (PathBuf::from("Book/Extras"), EntryKind::Directory),
                (PathBuf::from("Book/book.epub"), EntryKind::File),
                (PathBuf::from("Book/notes.pdf"), EntryKind::File),
            ]
        );
        let root: Vec<_> = backend.children(None).await.unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(root, vec![PathBuf::from("Book"), PathBuf::from("root.m4b")]);
    }

    #[tokio::test]
    async fn test_rename_never_overwrites() {
        let backend = MockBackend::with_files([("a.epub", "a"), ("b.epub", "b")]);
        let err = backend.rename(Path::new("a.epub"), Path::new("b.epub")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
        let err = backend.rename(Path::new("missing.epub"), Path::new("c.epub")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        backend.rename(Path::new("a.epub"), Path::new("c.epub")).await.unwrap();
        assert_eq!(backend.paths().await, vec![PathBuf::from("b.epub"), PathBuf::from("c.epub")]);
    }

    #[tokio::test]
    async fn test_remove_dir() {
        let backend = MockBackend::with_files([("Book/book.epub", "1")]);
        let err = backend.remove_dir(Path::new("Book")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotEmpty(_)));
        backend.delete(Path::new("Book/book.epub")).await.unwrap();
        backend.remove_dir(Path::new("Book")).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let backend = MockBackend::with_files([("Sub/one.epub", "1"), ("Subdir/two.epub", "2")]);
        let files = backend.list(Some(Path::new("Sub"))).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("Sub/one.epub"));
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", "bad")]);
    }
}
