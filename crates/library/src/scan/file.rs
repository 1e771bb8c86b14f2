use crate::cover;
use crate::scan::controller::{ScanMode, ScanOutcome, Scanner};
use crate::scan::create::apply_path_heuristics;
use crate::scan::error::{ErrorKind, Result};
use crate::scan::update::FileUpdate;
use exn::ResultExt;
use quire_catalog::models::{File, FileId, FileRole};
use quire_metadata::{DataSource, Field, ParsedMetadata, parse_and_enrich};
use tracing::{debug, info, instrument, warn};

impl Scanner {
    /// Resync one cataloged file against what is on disk.
    #[instrument(skip(self))]
    pub(crate) async fn scan_file(&self, file_id: FileId, mode: ScanMode, force: bool) -> Result<ScanOutcome> {
        let file = self.repo.retrieve_file(file_id).await.or_raise(|| ErrorKind::Catalog)?;
        let Some(info) = self.mounts.stat(&file.filepath).await.or_raise(|| ErrorKind::Storage)? else {
            return self.remove_missing(file).await;
        };

        let parsed = match file.role {
            FileRole::Main => {
                let data = self.mounts.read(&file.filepath).await.or_raise(|| ErrorKind::Storage)?;
                let mut parsed =
                    parse_and_enrich(&self.registry, &file.filepath, &data).await.or_raise(|| ErrorKind::Parse)?;
                let mount = self.mounts.locate(&file.filepath).or_raise(|| ErrorKind::Storage)?;
                let root_level = file.filepath.parent() == Some(mount.root.as_path());
                apply_path_heuristics(&mut parsed, &file.filepath, root_level);
                parsed
            },
            FileRole::Supplement => {
                let mut parsed = ParsedMetadata::new(DataSource::Filepath);
                parsed.title = file.filepath.file_stem().map(|s| s.to_string_lossy().into_owned());
                parsed.field_sources.insert(Field::Title, DataSource::Filepath);
                parsed
            },
        };

        if let Some(expected) = &file.cover
            && let Some(embedded) = &parsed.cover
        {
            match self.mounts.exists(&expected.path).await {
                Ok(true) => {},
                Ok(false) => {
                    if let Err(err) = cover::write(&self.mounts, &expected.path, embedded).await {
                        warn!(path = %expected.path.display(), error = ?err, "could not recover cover");
                    }
                },
                Err(err) => warn!(path = %expected.path.display(), error = ?err, "could not check cover"),
            }
        }

        let update = FileUpdate { parsed: &parsed, size: info.size, mode, force };
        let changed = self.update_file(file.book_id, file.id, update).await?;
        debug!(changed, "file resynced");
        Ok(ScanOutcome::Updated { book_id: file.book_id, file_id: file.id, changed })
    }

    /// The file is gone from disk: drop its row, and its book if that was the last file.
    async fn remove_missing(&self, file: File) -> Result<ScanOutcome> {
        let book_id = file.book_id;
        let _guard = self.cache.lock_book(book_id).await;
        self.repo.delete_file(file.id).await.or_raise(|| ErrorKind::Catalog)?;
        info!(path = %file.filepath.display(), "file no longer on disk; removed from catalog");
        let remaining = self.repo.list_book_files(book_id).await.or_raise(|| ErrorKind::Catalog)?;
        if remaining.is_empty() {
            self.repo.delete_book(book_id).await.or_raise(|| ErrorKind::Catalog)?;
            if let Err(err) = self.index.remove_book(book_id).await {
                warn!(error = ?err, "could not remove book from search index");
            }
            info!(book_id, "book lost its last file; removed from catalog");
            return Ok(ScanOutcome::BookDeleted { book_id, file_id: Some(file.id) });
        }
        match self.repo.retrieve_book(book_id).await {
            Ok(book) => {
                if let Err(err) = self.index.index_book(&book).await {
                    warn!(error = ?err, "could not update search index");
                }
            },
            Err(err) => warn!(error = ?err, "could not reload book for the search index"),
        }
        Ok(ScanOutcome::FileDeleted { book_id, file_id: file.id })
    }
}
