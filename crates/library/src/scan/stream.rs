use crate::cover;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::organize::{self, Action};
use crate::resolve::ResolutionCounts;
use crate::scan::controller::{ScanMode, ScanOutcome, Scanner};
use crate::scan::error::{ErrorKind as ScanErrorKind, Result as ScanResult};
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use quire_catalog::models::{BookId, Library, LibraryId};
use quire_metadata::sidecar::is_sidecar;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Progress events emitted by [`Scanner::scan_libraries`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. Per library: one [`DiscoveryComplete`](Self::DiscoveryComplete), then
///    one [`Scanned`](Self::Scanned) per discovered or vanished file.
/// 3. One [`Organized`](Self::Organized) per book of every library that
///    organizes its files.
/// 4. [`Complete`](Self::Complete), exactly once.
///
/// Failures are yielded as `Err` items between these and never end the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Started,
    /// Every root of the library has been listed.
    DiscoveryComplete { library_id: LibraryId, files: u64 },
    Scanned { path: PathBuf, outcome: ScanOutcome },
    Organized { book_id: BookId, action: Action },
    Complete(ScanSummary),
}

/// Totals for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub created_books: u64,
    pub created_files: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub deleted_files: u64,
    pub deleted_books: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Books moved to their canonical location.
    pub organized: u64,
    pub entities: ResolutionCounts,
}

impl ScanSummary {
    fn record(&mut self, outcome: &ScanOutcome) {
        match outcome {
            ScanOutcome::Skipped(_) => self.skipped += 1,
            ScanOutcome::Created { new_book, .. } => {
                self.created_files += 1;
                self.created_books += u64::from(*new_book);
            },
            ScanOutcome::Updated { changed: true, .. } => self.updated += 1,
            ScanOutcome::Updated { changed: false, .. } => self.unchanged += 1,
            ScanOutcome::FileDeleted { .. } => self.deleted_files += 1,
            ScanOutcome::BookDeleted { file_id, .. } => {
                self.deleted_books += 1;
                self.deleted_files += u64::from(file_id.is_some());
            },
            ScanOutcome::BookResynced { .. } => {},
        }
    }
}

/// What a library's roots hold.
#[derive(Debug, Default)]
struct Discovered {
    /// Files to scan, in path order.
    queue: BTreeSet<PathBuf>,
    /// Everything seen, for orphan detection.
    on_disk: HashSet<PathBuf>,
}

fn is_hidden(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

impl Scanner {
    /// Walk every root of every library, keep the catalog in step with it and
    /// then organize each library that asks for it.
    ///
    /// Files are scanned concurrently, at most `concurrency` at a time; renames
    /// wait until every library has been walked so no queued path is moved
    /// out from under the walk.
    pub fn scan_libraries<'a>(
        &'a self,
        libraries: &'a [Library],
        concurrency: usize,
        force: bool,
    ) -> impl Stream<Item = LibraryResult<ScanEvent>> + 'a {
        stream! {
            for await event in self.scan_libraries_inner(libraries, concurrency, force) {
                yield event.or_raise(|| LibraryErrorKind::Scan);
            }
        }
    }

    fn scan_libraries_inner<'a>(
        &'a self,
        libraries: &'a [Library],
        concurrency: usize,
        force: bool,
    ) -> impl Stream<Item = ScanResult<ScanEvent>> + 'a {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        stream!({
            yield Ok(ScanEvent::Started);
            let mut summary = ScanSummary::default();

            for library in libraries {
                let discovered = match self.discover(library).await {
                    Ok(discovered) => discovered,
                    Err(err) => {
                        error!(library = %library.name, error = ?err, "could not list library; skipping it");
                        summary.failed += 1;
                        yield Err(err);
                        continue;
                    },
                };
                let files = u64::try_from(discovered.queue.len()).unwrap_or(u64::MAX);
                info!(library = %library.name, files, "discovery complete");
                yield Ok(ScanEvent::DiscoveryComplete { library_id: library.id, files });

                let mut futures: Vec<_> =
                    discovered.queue.into_iter().map(|path| self.scan_discovered(path, force)).collect();
                let mut processing = FuturesUnordered::new();
                processing.extend(futures.drain(..concurrency.max(1).min(futures.len())));
                while let Some((path, result)) = processing.next().await {
                    match result {
                        Ok(outcome) => {
                            summary.record(&outcome);
                            yield Ok(ScanEvent::Scanned { path, outcome });
                        },
                        Err(err) => {
                            error!(path = %path.display(), error = ?err, "could not scan file");
                            summary.failed += 1;
                            yield Err(err);
                        },
                    }
                    // Pop-n-push, but FIFO instead of LIFO.
                    if !futures.is_empty() {
                        processing.push(futures.remove(0));
                    }
                }

                let known = match self.repo.list_file_paths(library.id).await.or_raise(|| ScanErrorKind::Catalog) {
                    Ok(known) => known,
                    Err(err) => {
                        summary.failed += 1;
                        yield Err(err);
                        continue;
                    },
                };
                for (file_id, path) in known.into_iter().filter(|(_, path)| !discovered.on_disk.contains(path)) {
                    debug!(path = %path.display(), "cataloged file not found on disk");
                    match self.scan_file(file_id, ScanMode::Discovery, force).await {
                        Ok(outcome) => {
                            summary.record(&outcome);
                            yield Ok(ScanEvent::Scanned { path, outcome });
                        },
                        Err(err) => {
                            error!(path = %path.display(), error = ?err, "could not resync missing file");
                            summary.failed += 1;
                            yield Err(err);
                        },
                    }
                }
            }

            for library in libraries.iter().filter(|l| l.organize_file_structure) {
                let book_ids = match self.repo.list_book_ids(library.id).await.or_raise(|| ScanErrorKind::Catalog) {
                    Ok(ids) => ids,
                    Err(err) => {
                        summary.failed += 1;
                        yield Err(err);
                        continue;
                    },
                };
                for book_id in book_ids {
                    match organize::organize_book(self, book_id).await.or_raise(|| ScanErrorKind::Organize) {
                        Ok(action) => {
                            summary.organized += u64::from(matches!(action, Action::Renamed { .. }));
                            yield Ok(ScanEvent::Organized { book_id, action });
                        },
                        Err(err) => {
                            error!(book_id, error = ?err, "could not organize book");
                            summary.failed += 1;
                            yield Err(err);
                        },
                    }
                }
            }

            summary.entities = self.resolution_counts();
            info!(?summary, "scan complete");
            yield Ok(ScanEvent::Complete(summary));
        })
    }

    async fn scan_discovered(&self, path: PathBuf, force: bool) -> (PathBuf, ScanResult<ScanOutcome>) {
        let result = self.scan_path(&path, force).await;
        (path, result)
    }

    /// List a library's roots, converting inputs that have a converter.
    async fn discover(&self, library: &Library) -> ScanResult<Discovered> {
        let mut discovered = Discovered::default();
        for mount in self.mounts.for_library(library.id) {
            let files = self.mounts.files_under(&mount.root).await.or_raise(|| ScanErrorKind::Storage)?;
            for info in files {
                let path = info.path;
                discovered.on_disk.insert(path.clone());
                if is_hidden(&mount.root, &path) || is_sidecar(&path) || cover::is_cover(&path) {
                    continue;
                }
                // A nested root belonging to another library claims its own files.
                if self.mounts.locate(&path).is_ok_and(|owner| owner.library_id != library.id) {
                    continue;
                }
                if self.registry.converter_for(&path).is_some() {
                    match self.convert_input(&path).await {
                        Ok(Some(target)) => {
                            discovered.on_disk.insert(target.clone());
                            discovered.queue.insert(target);
                        },
                        Ok(None) => {},
                        Err(err) => warn!(path = %path.display(), error = ?err, "could not convert file"),
                    }
                    continue;
                }
                if self.registry.is_supported(&path) {
                    discovered.queue.insert(path);
                }
            }
        }
        Ok(discovered)
    }

    /// Write the converted sibling of `path` unless it already exists.
    async fn convert_input(&self, path: &Path) -> ScanResult<Option<PathBuf>> {
        let Some(converter) = self.registry.converter_for(path) else {
            return Ok(None);
        };
        let target = path.with_extension(converter.target_extension().trim_start_matches('.').to_lowercase());
        if self.mounts.exists(&target).await.or_raise(|| ScanErrorKind::Storage)? {
            return Ok(Some(target));
        }
        let data = self.mounts.read(path).await.or_raise(|| ScanErrorKind::Storage)?;
        let Some((converted, _)) = self.registry.convert(path, &data).await.or_raise(|| ScanErrorKind::Parse)? else {
            return Ok(None);
        };
        self.mounts.write(&target, &converted).await.or_raise(|| ScanErrorKind::Storage)?;
        info!(from = %path.display(), to = %target.display(), "input converted");
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_components() {
        let root = Path::new("/library");
        assert!(is_hidden(root, Path::new("/library/.trash/Dune.epub")));
        assert!(is_hidden(root, Path::new("/library/Dune/.Dune.epub")));
        assert!(!is_hidden(root, Path::new("/library/Dune/Dune.epub")));
        assert!(!is_hidden(Path::new("/home/.media"), Path::new("/home/.media/Dune.epub")));
    }

    #[test]
    fn test_summary_records_outcomes() {
        let mut summary = ScanSummary::default();
        summary.record(&ScanOutcome::Created { book_id: 1, file_id: 1, new_book: true });
        summary.record(&ScanOutcome::Created { book_id: 1, file_id: 2, new_book: false });
        summary.record(&ScanOutcome::Updated { book_id: 1, file_id: 1, changed: false });
        summary.record(&ScanOutcome::BookDeleted { book_id: 2, file_id: Some(3) });
        summary.record(&ScanOutcome::Skipped("/library/gone.epub".into()));
        assert_eq!(summary.created_books, 1);
        assert_eq!(summary.created_files, 2);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.deleted_books, 1);
        assert_eq!(summary.deleted_files, 1);
        assert_eq!(summary.skipped, 1);
    }
}
