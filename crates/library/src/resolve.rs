//! Shared-entity resolution for one scan run.
//!
//! Many files can name the same author, series or genre at the same time.
//! [`EntityCache`] memoizes each `(name, library)` pair and guards the miss
//! path with a per-key lock, so the catalog sees at most one find-or-create
//! call per distinct key while unrelated keys resolve in parallel. The same
//! cache hands out per-book-path and per-book locks for book creation and
//! relationship writes.
//!
//! Nothing is ever evicted: build a new cache for every scan.

use async_trait::async_trait;
use dashmap::DashMap;
use quire_catalog::Repository;
use quire_catalog::error::Result as CatalogResult;
use quire_catalog::models::{BookId, EntityKind, LibraryId, NamedEntity, Person, Series};
use quire_metadata::DataSource;
use std::future::Future;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The find-or-create calls the cache sits in front of.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn person(&self, library_id: LibraryId, name: &str) -> CatalogResult<Person>;
    async fn series(&self, library_id: LibraryId, name: &str, source: &DataSource) -> CatalogResult<Series>;
    async fn named(&self, kind: EntityKind, library_id: LibraryId, name: &str) -> CatalogResult<NamedEntity>;
}

#[async_trait]
impl EntityStore for Repository {
    async fn person(&self, library_id: LibraryId, name: &str) -> CatalogResult<Person> {
        self.find_or_create_person(library_id, name).await
    }
    async fn series(&self, library_id: LibraryId, name: &str, source: &DataSource) -> CatalogResult<Series> {
        self.find_or_create_series(library_id, name, source).await
    }
    async fn named(&self, kind: EntityKind, library_id: LibraryId, name: &str) -> CatalogResult<NamedEntity> {
        self.find_or_create_named(kind, library_id, name).await
    }
}

/// One lock per key, created on first use and kept until the map is dropped.
pub struct KeyedLocks<K> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash> KeyedLocks<K> {
    pub fn new() -> Self {
        Self { locks: DashMap::new() }
    }

    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        // Clone the handle out so the shard lock is released before awaiting.
        let lock = self.locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K: Eq + Hash> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

type MemoKey = (String, LibraryId);

/// Names compare the way the catalog compares them: trimmed and case-insensitive.
fn memo_key(library_id: LibraryId, name: &str) -> MemoKey {
    (name.trim().to_lowercase(), library_id)
}

struct Memo<V> {
    values: DashMap<MemoKey, V>,
    locks: KeyedLocks<MemoKey>,
    populated: AtomicU64,
}

impl<V: Clone> Memo<V> {
    fn new() -> Self {
        Self { values: DashMap::new(), locks: KeyedLocks::new(), populated: AtomicU64::new(0) }
    }

    fn cached(&self, key: &MemoKey) -> Option<V> {
        self.values.get(key).map(|v| v.value().clone())
    }

    async fn resolve<F, Fut>(&self, library_id: LibraryId, name: &str, create: F) -> CatalogResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CatalogResult<V>>,
    {
        let key = memo_key(library_id, name);
        if let Some(value) = self.cached(&key) {
            return Ok(value);
        }
        let _guard = self.locks.lock(key.clone()).await;
        if let Some(value) = self.cached(&key) {
            return Ok(value);
        }
        let value = create().await?;
        self.values.insert(key, value.clone());
        self.populated.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    fn populated(&self) -> u64 {
        self.populated.load(Ordering::Relaxed)
    }
}

/// How many distinct entities of each kind were resolved through the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionCounts {
    pub persons: u64,
    pub series: u64,
    pub genres: u64,
    pub tags: u64,
    pub publishers: u64,
    pub imprints: u64,
}

pub struct EntityCache {
    store: Arc<dyn EntityStore>,
    persons: Memo<Person>,
    series: Memo<Series>,
    genres: Memo<NamedEntity>,
    tags: Memo<NamedEntity>,
    publishers: Memo<NamedEntity>,
    imprints: Memo<NamedEntity>,
    book_paths: KeyedLocks<(LibraryId, PathBuf)>,
    books: KeyedLocks<BookId>,
}

impl EntityCache {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            persons: Memo::new(),
            series: Memo::new(),
            genres: Memo::new(),
            tags: Memo::new(),
            publishers: Memo::new(),
            imprints: Memo::new(),
            book_paths: KeyedLocks::new(),
            books: KeyedLocks::new(),
        }
    }

    pub async fn person(&self, library_id: LibraryId, name: &str) -> CatalogResult<Person> {
        self.persons.resolve(library_id, name, || self.store.person(library_id, name)).await
    }

    /// A new series is created with `source`; a known one keeps its own.
    pub async fn series(&self, library_id: LibraryId, name: &str, source: &DataSource) -> CatalogResult<Series> {
        self.series.resolve(library_id, name, || self.store.series(library_id, name, source)).await
    }

    pub async fn named(&self, kind: EntityKind, library_id: LibraryId, name: &str) -> CatalogResult<NamedEntity> {
        let memo = match kind {
            EntityKind::Genre => &self.genres,
            EntityKind::Tag => &self.tags,
            EntityKind::Publisher => &self.publishers,
            EntityKind::Imprint => &self.imprints,
        };
        memo.resolve(library_id, name, || self.store.named(kind, library_id, name)).await
    }

    /// Serializes creation of the book keyed by `path`.
    pub async fn lock_book_path(&self, library_id: LibraryId, path: PathBuf) -> OwnedMutexGuard<()> {
        self.book_paths.lock((library_id, path)).await
    }

    /// Serializes relationship writes (and renames) for one book.
    pub async fn lock_book(&self, book_id: BookId) -> OwnedMutexGuard<()> {
        self.books.lock(book_id).await
    }

    pub fn counts(&self) -> ResolutionCounts {
        ResolutionCounts {
            persons: self.persons.populated(),
            series: self.series.populated(),
            genres: self.genres.populated(),
            tags: self.tags.populated(),
            publishers: self.publishers.populated(),
            imprints: self.imprints.populated(),
        }
    }
}
