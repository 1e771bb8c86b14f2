//! Absolute-path access to library roots.
//!
//! The catalog stores absolute paths while each [`StorageBackend`](quire_storage::StorageBackend)
//! is rooted at one library directory. [`Mounts`] translates between the two.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use quire_catalog::models::LibraryId;
use quire_storage::{BackendHandle, Entry, FileInfo, relative_to};
use std::path::{Path, PathBuf};

/// One library root served by one backend.
#[derive(Clone)]
pub struct Mount {
    pub library_id: LibraryId,
    pub root: PathBuf,
    pub backend: BackendHandle,
}

impl Mount {
    /// `None` for the root itself, which backends address as "no path".
    fn relative(&self, path: &Path) -> Result<Option<PathBuf>> {
        if path == self.root {
            return Ok(None);
        }
        relative_to(&self.root, path).map(Some).or_raise(|| ErrorKind::NotMounted(path.to_path_buf()))
    }

    fn file(&self, path: &Path) -> Result<PathBuf> {
        match self.relative(path)? {
            Some(relative) => Ok(relative),
            None => exn::bail!(ErrorKind::NotMounted(path.to_path_buf())),
        }
    }
}

#[derive(Clone, Default)]
pub struct Mounts {
    mounts: Vec<Mount>,
}

impl Mounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&mut self, library_id: LibraryId, root: impl Into<PathBuf>, backend: BackendHandle) -> &mut Self {
        self.mounts.push(Mount { library_id, root: root.into(), backend });
        self
    }

    pub fn for_library(&self, library_id: LibraryId) -> impl Iterator<Item = &Mount> {
        self.mounts.iter().filter(move |m| m.library_id == library_id)
    }

    /// The mount whose root contains `path`; the deepest one wins when roots nest.
    pub fn locate(&self, path: &Path) -> Result<&Mount> {
        self.mounts
            .iter()
            .filter(|m| path.starts_with(&m.root))
            .max_by_key(|m| m.root.components().count())
            .ok_or_raise(|| ErrorKind::NotMounted(path.to_path_buf()))
    }

    pub async fn exists(&self, path: &Path) -> Result<bool> {
        let mount = self.locate(path)?;
        match mount.relative(path)? {
            Some(relative) => mount.backend.exists(&relative).await.or_raise(|| ErrorKind::Storage),
            None => Ok(true),
        }
    }

    /// File metadata, or `None` when nothing is there.
    pub async fn stat(&self, path: &Path) -> Result<Option<FileInfo>> {
        let mount = self.locate(path)?;
        match mount.backend.stat(&mount.file(path)?).await {
            Ok(info) => Ok(Some(FileInfo { path: path.to_path_buf(), ..info })),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err).or_raise(|| ErrorKind::Storage),
        }
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let mount = self.locate(path)?;
        mount.backend.read(&mount.file(path)?).await.or_raise(|| ErrorKind::Storage)
    }

    pub async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mount = self.locate(path)?;
        mount.backend.write(&mount.file(path)?, data).await.or_raise(|| ErrorKind::Storage)
    }

    pub async fn delete(&self, path: &Path) -> Result<()> {
        let mount = self.locate(path)?;
        mount.backend.delete(&mount.file(path)?).await.or_raise(|| ErrorKind::Storage)
    }

    /// Move a file; both paths must be under the same root.
    pub async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mount = self.locate(from)?;
        let target = self.locate(to)?;
        exn::ensure!(mount.root == target.root, ErrorKind::NotMounted(to.to_path_buf()));
        mount.backend.rename(&mount.file(from)?, &mount.file(to)?).await.or_raise(|| ErrorKind::Storage)
    }

    pub async fn remove_dir(&self, path: &Path) -> Result<()> {
        let mount = self.locate(path)?;
        mount.backend.remove_dir(&mount.file(path)?).await.or_raise(|| ErrorKind::Storage)
    }

    /// Immediate entries of `dir`, with absolute paths.
    pub async fn children(&self, dir: &Path) -> Result<Vec<Entry>> {
        let mount = self.locate(dir)?;
        let relative = mount.relative(dir)?;
        let entries = mount.backend.children(relative.as_deref()).await.or_raise(|| ErrorKind::Storage)?;
        Ok(entries.into_iter().map(|e| Entry { path: mount.root.join(e.path), kind: e.kind }).collect())
    }

    /// Every file under `dir` (recursively), with absolute paths.
    pub async fn files_under(&self, dir: &Path) -> Result<Vec<FileInfo>> {
        let mount = self.locate(dir)?;
        let relative = mount.relative(dir)?;
        let files = mount.backend.list(relative.as_deref()).await.or_raise(|| ErrorKind::Storage)?;
        Ok(files.into_iter().map(|f| FileInfo { path: mount.root.join(&f.path), ..f }).collect())
    }
}
