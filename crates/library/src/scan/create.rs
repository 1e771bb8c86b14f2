//! Cataloging files that have never been seen before.

use crate::cover;
use crate::scan::controller::{ScanMode, ScanOutcome, Scanner};
use crate::scan::error::{ErrorKind, Result};
use crate::scan::update::FileUpdate;
use exn::ResultExt;
use quire_catalog::models::{Book, FileField, FileRole, LibraryId, NewBook, NewFile};
use quire_metadata::filename::{canonical_stem, parse_name, split_volume};
use quire_metadata::sidecar::is_sidecar;
use quire_metadata::sort::sort_title;
use quire_metadata::{DataSource, Field, FileType, ParsedAuthor, ParsedMetadata, parse_and_enrich};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

pub(crate) fn file_type_of(path: &Path) -> FileType {
    FileType::from_extension(&path.extension().map(|e| e.to_string_lossy()).unwrap_or_default())
}

fn stem_of(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Fill whatever the parser left empty from the path itself.
///
/// A root-level file is named after itself; anything deeper is named after
/// its directory. Authors come from `[...]` and narrators from `{...}`.
pub(crate) fn apply_path_heuristics(parsed: &mut ParsedMetadata, path: &Path, root_level: bool) {
    let file_type = file_type_of(path);
    let with_volumes = file_type.has_volumes();
    let stem = stem_of(path);
    let from_stem = parse_name(&stem, with_volumes);
    let from_name = match path.parent().and_then(Path::file_name) {
        Some(dir) if !root_level => parse_name(&dir.to_string_lossy(), with_volumes),
        _ => from_stem.clone(),
    };

    if parsed.title().is_none() {
        parsed.title = Some(from_name.title.clone());
        parsed.field_sources.insert(Field::Title, DataSource::Filepath);
    }
    parsed.authors.retain(|a| !a.name.trim().is_empty());
    parsed.narrators.retain(|n| !n.trim().is_empty());
    if parsed.authors.is_empty() {
        let authors = if from_name.authors.is_empty() { &from_stem.authors } else { &from_name.authors };
        if !authors.is_empty() {
            parsed.authors = authors.iter().map(ParsedAuthor::new).collect();
            parsed.field_sources.insert(Field::Authors, DataSource::Filepath);
        }
    }
    if parsed.narrators.is_empty() && !from_stem.narrators.is_empty() {
        parsed.narrators = from_stem.narrators.clone();
        parsed.field_sources.insert(Field::Narrators, DataSource::Filepath);
    }
    if with_volumes
        && parsed.series().is_none()
        && let Some((series, number)) = parsed.title().and_then(split_volume)
    {
        parsed.series = Some(series);
        parsed.series_number = parsed.series_number.or(Some(number));
        parsed.field_sources.insert(Field::Series, DataSource::Filepath);
    }
}

/// The path a book is keyed by, and whether that path is a directory.
pub(crate) fn book_key(root: &Path, path: &Path, parsed: &ParsedMetadata) -> (PathBuf, bool) {
    match path.parent() {
        Some(parent) if parent != root => (parent.to_path_buf(), true),
        _ => {
            let title = parsed.title().map(str::to_string).unwrap_or_else(|| stem_of(path));
            (root.join(canonical_stem(&parsed.author_names(), &title, None)), false)
        },
    }
}

impl Scanner {
    /// Catalog a file with no row yet, then run the discovery-mode update on it.
    #[instrument(skip(self, root, path), fields(path = %path.display()))]
    pub(crate) async fn create_file(
        &self,
        library_id: LibraryId,
        root: &Path,
        path: &Path,
        size: u64,
        force: bool,
    ) -> Result<ScanOutcome> {
        let data = self.mounts.read(path).await.or_raise(|| ErrorKind::Storage)?;
        let mut parsed = parse_and_enrich(&self.registry, path, &data).await.or_raise(|| ErrorKind::Parse)?;
        let root_level = path.parent() == Some(root);
        apply_path_heuristics(&mut parsed, path, root_level);
        let (key, is_directory) = book_key(root, path, &parsed);

        let (book, new_book, file) = {
            let _guard = self.cache.lock_book_path(library_id, key.clone()).await;
            let (book, new_book) = match self.repo.find_book_by_path(library_id, &key).await.or_raise(|| ErrorKind::Catalog)? {
                Some(book) => (book, false),
                None => {
                    let title = parsed.title().map(str::to_string).unwrap_or_else(|| stem_of(path));
                    let book = self
                        .repo
                        .create_book(&NewBook {
                            library_id,
                            filepath: key.clone(),
                            is_directory,
                            sort_title: sort_title(&title),
                            title,
                            title_source: parsed.source_for(Field::Title).clone(),
                            author_source: DataSource::Filepath,
                        })
                        .await
                        .or_raise(|| ErrorKind::Catalog)?;
                    info!(book_id = book.id, key = %key.display(), "book created");
                    (book, true)
                },
            };
            let file = self
                .repo
                .create_file(&NewFile {
                    library_id,
                    book_id: book.id,
                    filepath: path.to_path_buf(),
                    file_type: file_type_of(path),
                    role: FileRole::Main,
                    size,
                })
                .await
                .or_raise(|| ErrorKind::Catalog)?;
            if let Err(err) = self.create_supplements(&book, path, root_level).await {
                warn!(error = ?err, "could not discover supplement files");
            }
            (book, new_book, file)
        };

        let update = FileUpdate { parsed: &parsed, size, mode: ScanMode::Discovery, force };
        self.update_file(book.id, file.id, update).await?;
        Ok(ScanOutcome::Created { book_id: book.id, file_id: file.id, new_book })
    }

    /// Catalog the companion files next to a main file.
    ///
    /// Inside a book directory every unrecognized sibling belongs to the book;
    /// at a library root only those sharing the main file's stem do.
    async fn create_supplements(&self, book: &Book, main: &Path, root_level: bool) -> Result<()> {
        let Some(dir) = main.parent() else {
            return Ok(());
        };
        let main_stem = stem_of(main);
        let entries = self.mounts.children(dir).await.or_raise(|| ErrorKind::Storage)?;
        for entry in entries {
            let path = &entry.path;
            if !entry.is_file()
                || entry.is_hidden()
                || path == main
                || is_sidecar(path)
                || cover::is_cover(path)
                || self.registry.is_supported(path)
                || self.registry.converter_for(path).is_some()
            {
                continue;
            }
            let stem = stem_of(path);
            if root_level && stem != main_stem {
                continue;
            }
            if self.repo.find_file_by_path(path).await.or_raise(|| ErrorKind::Catalog)?.is_some() {
                continue;
            }
            let size = match self.mounts.stat(path).await {
                Ok(Some(info)) => info.size,
                Ok(None) => continue,
                Err(err) => {
                    warn!(path = %path.display(), error = ?err, "could not stat supplement");
                    continue;
                },
            };
            let created = self
                .repo
                .create_file(&NewFile {
                    library_id: book.library_id,
                    book_id: book.id,
                    filepath: path.clone(),
                    file_type: file_type_of(path),
                    role: FileRole::Supplement,
                    size,
                })
                .await;
            let mut file = match created {
                Ok(file) => file,
                Err(err) => {
                    warn!(path = %path.display(), error = ?err, "could not catalog supplement");
                    continue;
                },
            };
            file.name = Some(stem);
            file.name_source = DataSource::Filepath;
            self.repo.update_file(&file, &[FileField::Name]).await.or_raise(|| ErrorKind::Catalog)?;
            debug!(path = %path.display(), book_id = book.id, "supplement cataloged");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn heuristics(path: &str, root_level: bool) -> ParsedMetadata {
        let mut parsed = ParsedMetadata::new(DataSource::EpubMetadata);
        apply_path_heuristics(&mut parsed, Path::new(path), root_level);
        parsed
    }

    #[test]
    fn test_directory_book_named_after_directory() {
        let parsed = heuristics("/library/[John Doe] My Test Book/whatever.epub", false);
        assert_eq!(parsed.title(), Some("My Test Book"));
        assert_eq!(parsed.author_names(), vec!["John Doe"]);
        assert_eq!(parsed.source_for(Field::Title), &DataSource::Filepath);
        assert_eq!(parsed.source_for(Field::Authors), &DataSource::Filepath);
    }

    #[test]
    fn test_root_file_named_after_itself() {
        let parsed = heuristics("/library/[Jane Roe] Night Falls {Sam Reader}.m4b", true);
        assert_eq!(parsed.title(), Some("Night Falls"));
        assert_eq!(parsed.author_names(), vec!["Jane Roe"]);
        assert_eq!(parsed.narrators, vec!["Sam Reader"]);
        assert_eq!(parsed.source_for(Field::Narrators), &DataSource::Filepath);
    }

    #[test]
    fn test_parser_values_win() {
        let mut parsed = ParsedMetadata::new(DataSource::EpubMetadata);
        parsed.title = Some("Embedded".into());
        parsed.authors = vec![ParsedAuthor::new("Embedded Author")];
        apply_path_heuristics(&mut parsed, Path::new("/library/[Someone] Other/x.epub"), false);
        assert_eq!(parsed.title(), Some("Embedded"));
        assert_eq!(parsed.author_names(), vec!["Embedded Author"]);
        assert_eq!(parsed.source_for(Field::Title), &DataSource::EpubMetadata);
    }

    #[test]
    fn test_blank_names_are_dropped() {
        let mut parsed = ParsedMetadata::new(DataSource::EpubMetadata);
        parsed.authors = vec![ParsedAuthor::new("  ")];
        parsed.narrators = vec![String::new()];
        apply_path_heuristics(&mut parsed, Path::new("/library/Dune/Dune.epub"), false);
        assert!(parsed.authors.is_empty());
        assert!(parsed.narrators.is_empty());
    }

    #[test]
    fn test_volume_becomes_series() {
        let parsed = heuristics("/library/Saga v3.cbz", true);
        assert_eq!(parsed.series(), Some("Saga"));
        assert_eq!(parsed.series_number, Some(3.0));
        let parsed = heuristics("/library/Dune v3.epub", true);
        assert_eq!(parsed.series(), None);
    }

    #[rstest]
    #[case::root_level("/library/Dune.epub", "/library/Dune", false)]
    #[case::directory("/library/Dune/Dune.epub", "/library/Dune", true)]
    #[case::nested("/library/Herbert/Dune/Dune.epub", "/library/Herbert/Dune", true)]
    fn test_book_key(#[case] path: &str, #[case] key: &str, #[case] is_directory: bool) {
        let mut parsed = ParsedMetadata::new(DataSource::EpubMetadata);
        parsed.title = Some("Dune".into());
        assert_eq!(book_key(Path::new("/library"), Path::new(path), &parsed), (PathBuf::from(key), is_directory));
    }

    #[test]
    fn test_root_level_key_includes_authors() {
        let parsed = heuristics("/library/[Frank Herbert] Dune.epub", true);
        let (key, _) = book_key(Path::new("/library"), Path::new("/library/[Frank Herbert] Dune.epub"), &parsed);
        assert_eq!(key, Path::new("/library/[Frank Herbert] Dune"));
    }
}
