use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::index::{NoopIndex, SearchIndex};
use crate::mounts::Mounts;
use crate::resolve::{EntityCache, EntityStore, ResolutionCounts};
use exn::ResultExt;
use quire_catalog::Repository;
use quire_catalog::models::{BookId, FileId};
use quire_metadata::ParserRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::instrument;

/// What to scan. Exactly one of `path`, `file_id` and `book_id` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pub path: Option<PathBuf>,
    pub file_id: Option<FileId>,
    pub book_id: Option<BookId>,
    /// Let every source override every other (sidecars are then ignored).
    pub force_refresh: bool,
}

impl ScanOptions {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()), ..Self::default() }
    }

    pub fn file(file_id: FileId) -> Self {
        Self { file_id: Some(file_id), ..Self::default() }
    }

    pub fn book(book_id: BookId) -> Self {
        Self { book_id: Some(book_id), ..Self::default() }
    }

    pub fn force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// The single entry point these options select.
    pub fn target(&self) -> LibraryResult<ScanTarget> {
        match (&self.path, self.file_id, self.book_id) {
            (Some(path), None, None) => Ok(ScanTarget::Path(path.clone())),
            (None, Some(file_id), None) => Ok(ScanTarget::File(file_id)),
            (None, None, Some(book_id)) => Ok(ScanTarget::Book(book_id)),
            (None, None, None) => exn::bail!(LibraryErrorKind::InvalidRequest("one of path, file or book is required")),
            _ => exn::bail!(LibraryErrorKind::InvalidRequest("only one of path, file or book may be given")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    Path(PathBuf),
    File(FileId),
    Book(BookId),
}

/// Whether renames wait for the end of a bulk walk or happen right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Part of a walk: other files in the same directory may still be queued.
    Discovery,
    /// A single file or book: nothing else is in flight.
    Resync,
}

/// What a scan did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The path disappeared before it could be processed.
    Skipped(PathBuf),
    Created { book_id: BookId, file_id: FileId, new_book: bool },
    Updated { book_id: BookId, file_id: FileId, changed: bool },
    /// The file was gone from disk; its book still has other files.
    FileDeleted { book_id: BookId, file_id: FileId },
    /// The book lost its last file (or had none) and was removed.
    BookDeleted { book_id: BookId, file_id: Option<FileId> },
    BookResynced { book_id: BookId, files: usize },
}

/// Drives scans against one catalog.
///
/// Holds the entity-resolution cache for its whole lifetime, so build a new
/// scanner for every run.
pub struct Scanner {
    pub(crate) repo: Repository,
    pub(crate) mounts: Mounts,
    pub(crate) registry: Arc<ParserRegistry>,
    pub(crate) index: Arc<dyn SearchIndex>,
    pub(crate) cache: EntityCache,
}

impl Scanner {
    pub fn new(repo: Repository, mounts: Mounts, registry: Arc<ParserRegistry>) -> Self {
        let cache = EntityCache::new(Arc::new(repo.clone()));
        Self { repo, mounts, registry, index: Arc::new(NoopIndex), cache }
    }

    pub fn with_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.index = index;
        self
    }

    /// Resolve shared entities through `store` instead of the catalog itself.
    pub fn with_entity_store(mut self, store: Arc<dyn EntityStore>) -> Self {
        self.cache = EntityCache::new(store);
        self
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Distinct shared entities resolved so far.
    pub fn resolution_counts(&self) -> ResolutionCounts {
        self.cache.counts()
    }

    /// Scan one path, file or book.
    ///
    /// A path is treated as a discovery (renames are left for a later
    /// organize pass); a file or book is a resync and is reorganized
    /// immediately when its title or authors change.
    ///
    /// # Errors
    /// [`InvalidRequest`](LibraryErrorKind::InvalidRequest) when the options
    /// do not name exactly one target, before any I/O. Otherwise
    /// [`Scan`](LibraryErrorKind::Scan) wrapping the scan failure.
    #[instrument(skip_all, fields(path = ?options.path, file_id = ?options.file_id, book_id = ?options.book_id))]
    pub async fn scan(&self, options: &ScanOptions) -> LibraryResult<ScanOutcome> {
        let target = options.target()?;
        let force = options.force_refresh;
        let result = match target {
            ScanTarget::Path(path) => self.scan_path(&path, force).await,
            ScanTarget::File(file_id) => self.scan_file(file_id, ScanMode::Resync, force).await,
            ScanTarget::Book(book_id) => self.scan_book(book_id, force).await,
        };
        result.or_raise(|| LibraryErrorKind::Scan)
    }
}
