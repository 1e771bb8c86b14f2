//! The per-file update routine.
//!
//! Every field is written only when [`quire_metadata::merge`] says so. The
//! file's own metadata is considered first and the sidecar second, so a
//! sidecar overrides metadata it outranks. Main files drive the book's fields
//! (under the book's lock); every file drives its own.

use crate::cover;
use crate::organize::{self, Action};
use crate::scan::controller::{ScanMode, Scanner};
use crate::scan::error::{ErrorKind, Result};
use crate::sidecar;
use exn::ResultExt;
use quire_catalog::models::{Book, BookField, BookId, EntityId, EntityKind, File, FileField, FileId, FileRole};
use quire_metadata::merge::{
    should_apply_sidecar_relationship, should_apply_sidecar_scalar, should_update_relationship, should_update_scalar,
};
use quire_metadata::models::non_blank;
use quire_metadata::sidecar::{BookSidecar, FileSidecar, format_date, parse_date};
use quire_metadata::sort::sort_title;
use quire_metadata::{Chapter, DataSource, Field, ParsedAuthor, ParsedMetadata};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Inputs to [`Scanner::update_file`] besides the ids.
pub(crate) struct FileUpdate<'a> {
    pub parsed: &'a ParsedMetadata,
    /// Size on disk, as just observed.
    pub size: u64,
    pub mode: ScanMode,
    pub force: bool,
}

/// Which candidate list won a relationship field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Winner {
    Metadata,
    Sidecar,
}

/// The value (and its source) to write into a single-valued field, if any.
pub(crate) fn pick_scalar<'a>(
    current: &'a str,
    current_source: &'a DataSource,
    metadata: Option<(&'a str, &'a DataSource)>,
    sidecar: Option<&'a str>,
    force: bool,
) -> Option<(&'a str, DataSource)> {
    let mut picked = None;
    let (mut value, mut source) = (current, current_source);
    if let Some((new, new_source)) = metadata
        && should_update_scalar(new, value, new_source, source, force)
    {
        picked = Some((new.trim(), new_source.clone()));
        (value, source) = (new, new_source);
    }
    if let Some(new) = sidecar
        && should_apply_sidecar_scalar(new, value, source, force)
    {
        picked = Some((new.trim(), DataSource::Sidecar));
    }
    picked
}

/// Which list should replace a relationship, if any.
pub(crate) fn pick_list<T: PartialEq>(
    current: &[T],
    current_source: &DataSource,
    metadata: &[T],
    metadata_source: &DataSource,
    sidecar: &[T],
    force: bool,
) -> Option<Winner> {
    let mut winner = None;
    let (mut value, mut source) = (current, current_source);
    let (new, new_source) = (metadata, metadata_source);
    if should_update_relationship(new, value, new_source, source, force) {
        winner = Some(Winner::Metadata);
        (value, source) = (new, new_source);
    }
    if should_apply_sidecar_relationship(sidecar, value, source, force) {
        winner = Some(Winner::Sidecar);
    }
    winner
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn author_key(author: &ParsedAuthor) -> (String, Option<String>) {
    (name_key(&author.name), author.role.as_deref().map(name_key))
}

fn author_keys(authors: &[ParsedAuthor]) -> Vec<(String, Option<String>)> {
    authors.iter().map(author_key).filter(|(name, _)| !name.is_empty()).collect()
}

fn name_keys<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names.iter().map(|n| name_key(n.as_ref())).filter(|n| !n.is_empty()).collect()
}

/// Trimmed authors without blanks or case-insensitive repeats; the first spelling wins.
fn distinct_authors(authors: &[ParsedAuthor]) -> Vec<ParsedAuthor> {
    let mut seen = HashSet::new();
    authors
        .iter()
        .filter(|a| !a.name.trim().is_empty() && seen.insert(author_key(a)))
        .map(|a| ParsedAuthor { name: a.name.trim().to_string(), role: a.role.clone() })
        .collect()
}

/// Trimmed names without blanks or case-insensitive repeats; the first spelling wins.
fn distinct_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.as_ref().trim())
        .filter(|n| !n.is_empty() && seen.insert(name_key(n)))
        .map(str::to_string)
        .collect()
}

fn dedup(ids: Vec<EntityId>) -> Vec<EntityId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[derive(Debug, Default)]
struct BookChanges {
    any: bool,
    /// Title or authors changed, so the canonical name may have too.
    naming: bool,
}

impl Scanner {
    /// Apply `update` to a file and (for main files) its book, then sync
    /// sidecars and the search index.
    ///
    /// Returns whether any catalog field was written.
    #[instrument(skip(self, update))]
    pub(crate) async fn update_file(&self, book_id: BookId, file_id: FileId, update: FileUpdate<'_>) -> Result<bool> {
        let file = self.repo.retrieve_file(file_id).await.or_raise(|| ErrorKind::Catalog)?;
        let mut changed = false;
        if file.role == FileRole::Main {
            let changes = {
                let _guard = self.cache.lock_book(book_id).await;
                let book = self.repo.retrieve_book(book_id).await.or_raise(|| ErrorKind::Catalog)?;
                let sidecar = if update.force { None } else { sidecar::read_book(&self.mounts, &book).await };
                self.update_book_fields(book, update.parsed, sidecar.as_ref(), update.force).await?
            };
            changed |= changes.any;
            if changes.naming && update.mode == ScanMode::Resync {
                match organize::organize_book(self, book_id).await {
                    Ok(Action::Renamed { from, to }) => {
                        info!(from = %from.display(), to = %to.display(), "book reorganized after resync");
                    },
                    Ok(_) => {},
                    Err(err) => warn!(error = ?err, "could not reorganize book after resync"),
                }
            }
        }
        // Reload: an immediate reorganization may have moved the file.
        let file = self.repo.retrieve_file(file_id).await.or_raise(|| ErrorKind::Catalog)?;
        let sidecar = if update.force { None } else { sidecar::read_file(&self.mounts, &file.filepath).await };
        changed |= self.update_file_fields(file, &update, sidecar.as_ref()).await?;
        self.publish(book_id, file_id).await?;
        Ok(changed)
    }

    async fn reload_book(&self, book_id: BookId) -> Result<Book> {
        self.repo.retrieve_book(book_id).await.or_raise(|| ErrorKind::Catalog)
    }

    async fn reload_file(&self, file_id: FileId) -> Result<File> {
        self.repo.retrieve_file(file_id).await.or_raise(|| ErrorKind::Catalog)
    }

    async fn write_book(&self, book: &Book, fields: &[BookField]) -> Result<Book> {
        self.repo.update_book(book, fields).await.or_raise(|| ErrorKind::Catalog)?;
        self.reload_book(book.id).await
    }

    async fn update_book_fields(
        &self,
        mut book: Book,
        parsed: &ParsedMetadata,
        sidecar: Option<&BookSidecar>,
        force: bool,
    ) -> Result<BookChanges> {
        let mut changes = BookChanges::default();

        let title = parsed.title().map(|t| (t, parsed.source_for(Field::Title)));
        let sidecar_title = sidecar.and_then(|s| non_blank(&s.title));
        if let Some((title, source)) = pick_scalar(&book.title, &book.title_source, title, sidecar_title, force) {
            debug!(from = %book.title, to = title, %source, "updating title");
            let title = title.to_string();
            let mut fields = vec![BookField::Title];
            if book.sort_title_source != DataSource::Manual {
                book.sort_title = sort_title(&title);
                book.sort_title_source = source.clone();
                fields.push(BookField::SortTitle);
            }
            book.title = title;
            book.title_source = source;
            book = self.write_book(&book, &fields).await?;
            changes.any = true;
            changes.naming = true;
        }

        let subtitle = parsed.subtitle.as_deref().map(|s| (s, parsed.source_for(Field::Subtitle)));
        let sidecar_subtitle = sidecar.and_then(|s| non_blank(&s.subtitle));
        let current = book.subtitle.clone().unwrap_or_default();
        if let Some((subtitle, source)) = pick_scalar(&current, &book.subtitle_source, subtitle, sidecar_subtitle, force) {
            debug!(to = subtitle, %source, "updating subtitle");
            book.subtitle = Some(subtitle.to_string());
            book.subtitle_source = source;
            book = self.write_book(&book, &[BookField::Subtitle]).await?;
            changes.any = true;
        }

        let description = parsed.description.as_deref().map(|d| (d, parsed.source_for(Field::Description)));
        let sidecar_description = sidecar.and_then(|s| non_blank(&s.description));
        let current = book.description.clone().unwrap_or_default();
        if let Some((description, source)) =
            pick_scalar(&current, &book.description_source, description, sidecar_description, force)
        {
            debug!(%source, "updating description");
            book.description = Some(description.to_string());
            book.description_source = source;
            book = self.write_book(&book, &[BookField::Description]).await?;
            changes.any = true;
        }

        // Authors: compared by name and role, case-insensitively.
        let parsed_authors = distinct_authors(&parsed.authors);
        let sidecar_authors = distinct_authors(&sidecar.map(BookSidecar::authors).unwrap_or_default());
        let current: Vec<_> = book
            .authors
            .iter()
            .map(|a| (name_key(&a.person.name), a.role.as_deref().map(name_key)))
            .collect();
        let source = parsed.source_for(Field::Authors);
        let winner = pick_list(
            &current,
            &book.author_source,
            &author_keys(&parsed_authors),
            source,
            &author_keys(&sidecar_authors),
            force,
        );
        if let Some(winner) = winner {
            let (authors, source) = match winner {
                Winner::Metadata => (&parsed_authors, source.clone()),
                Winner::Sidecar => (&sidecar_authors, DataSource::Sidecar),
            };
            let mut resolved = Vec::with_capacity(authors.len());
            for author in authors {
                match self.cache.person(book.library_id, &author.name).await {
                    Ok(person) => resolved.push((person.id, author.role.clone())),
                    Err(err) => warn!(name = %author.name, error = ?err, "could not resolve author; skipping"),
                }
            }
            if resolved.is_empty() {
                warn!("no author could be resolved; keeping the current ones");
            } else {
                debug!(count = resolved.len(), %source, "replacing authors");
                self.repo.replace_authors(book.id, &resolved, &source).await.or_raise(|| ErrorKind::Catalog)?;
                book = self.reload_book(book.id).await?;
                changes.any = true;
                changes.naming = true;
            }
        }

        // Series: name and number travel together.
        let parsed_series: Vec<(String, Option<f64>)> =
            parsed.series().map(|s| vec![(s.to_string(), parsed.series_number)]).unwrap_or_default();
        let sidecar_series: Vec<(String, Option<f64>)> = sidecar
            .map(|s| {
                s.series
                    .iter()
                    .filter(|entry| !entry.name.trim().is_empty())
                    .map(|entry| (entry.name.trim().to_string(), entry.number))
                    .collect()
            })
            .unwrap_or_default();
        let series_keys = |series: &[(String, Option<f64>)]| -> Vec<(String, Option<f64>)> {
            series.iter().map(|(name, number)| (name_key(name), *number)).collect()
        };
        let current: Vec<_> = book.series.iter().map(|s| (name_key(&s.series.name), s.number)).collect();
        let source = parsed.source_for(Field::Series);
        let winner = pick_list(
            &current,
            &book.series_source,
            &series_keys(&parsed_series),
            source,
            &series_keys(&sidecar_series),
            force,
        );
        if let Some(winner) = winner {
            let (series, source) = match winner {
                Winner::Metadata => (&parsed_series, source.clone()),
                Winner::Sidecar => (&sidecar_series, DataSource::Sidecar),
            };
            let mut resolved = Vec::with_capacity(series.len());
            for (name, number) in series {
                match self.cache.series(book.library_id, name, &source).await {
                    Ok(entry) => resolved.push((entry.id, *number)),
                    Err(err) => warn!(name = %name, error = ?err, "could not resolve series; skipping"),
                }
            }
            if resolved.is_empty() {
                warn!("no series could be resolved; keeping the current ones");
            } else {
                debug!(count = resolved.len(), %source, "replacing series");
                self.repo.replace_book_series(book.id, &resolved, &source).await.or_raise(|| ErrorKind::Catalog)?;
                book = self.reload_book(book.id).await?;
                changes.any = true;
            }
        }

        for kind in [EntityKind::Genre, EntityKind::Tag] {
            let (parsed_names, sidecar_names, current, current_source, field) = match kind {
                EntityKind::Genre => (
                    distinct_names(&parsed.genres),
                    distinct_names(&sidecar.map(|s| s.genres.clone()).unwrap_or_default()),
                    name_keys(&book.genre_names()),
                    &book.genre_source,
                    Field::Genres,
                ),
                _ => (
                    distinct_names(&parsed.tags),
                    distinct_names(&sidecar.map(|s| s.tags.clone()).unwrap_or_default()),
                    name_keys(&book.tag_names()),
                    &book.tag_source,
                    Field::Tags,
                ),
            };
            let source = parsed.source_for(field);
            let winner = pick_list(
                &current,
                current_source,
                &name_keys(&parsed_names),
                source,
                &name_keys(&sidecar_names),
                force,
            );
            let Some(winner) = winner else { continue };
            let (names, source) = match winner {
                Winner::Metadata => (parsed_names, source.clone()),
                Winner::Sidecar => (sidecar_names, DataSource::Sidecar),
            };
            let mut resolved = Vec::with_capacity(names.len());
            for name in &names {
                match self.cache.named(kind, book.library_id, name).await {
                    Ok(entity) => resolved.push(entity.id),
                    Err(err) => warn!(name = %name, ?kind, error = ?err, "could not resolve entity; skipping"),
                }
            }
            let resolved = dedup(resolved);
            if resolved.is_empty() {
                warn!(?kind, "nothing could be resolved; keeping the current set");
                continue;
            }
            debug!(?kind, count = resolved.len(), %source, "replacing book entities");
            let written = match kind {
                EntityKind::Genre => self.repo.replace_genres(book.id, &resolved, &source).await,
                _ => self.repo.replace_tags(book.id, &resolved, &source).await,
            };
            written.or_raise(|| ErrorKind::Catalog)?;
            book = self.reload_book(book.id).await?;
            changes.any = true;
        }

        Ok(changes)
    }

    async fn update_file_fields(&self, mut file: File, update: &FileUpdate<'_>, sidecar: Option<&FileSidecar>) -> Result<bool> {
        let parsed = update.parsed;
        let force = update.force;
        let mut changed = false;
        let mut fields = Vec::new();

        let name = parsed.title().map(|t| (t, parsed.source_for(Field::Title)));
        let current = file.name.clone().unwrap_or_default();
        if let Some((name, source)) =
            pick_scalar(&current, &file.name_source, name, sidecar.and_then(|s| non_blank(&s.name)), force)
        {
            file.name = Some(name.to_string());
            file.name_source = source;
            fields.push(FileField::Name);
        }

        let url = non_blank(&parsed.url).map(|u| (u, parsed.source_for(Field::Url)));
        let current = file.url.clone().unwrap_or_default();
        if let Some((url, source)) =
            pick_scalar(&current, &file.url_source, url, sidecar.and_then(|s| non_blank(&s.url)), force)
        {
            file.url = Some(url.to_string());
            file.url_source = source;
            fields.push(FileField::Url);
        }

        let current = file.release_date.and_then(format_date).unwrap_or_default();
        let parsed_date = parsed.release_date.and_then(format_date);
        let sidecar_date = sidecar.and_then(FileSidecar::release_date).and_then(format_date);
        let date = parsed_date.as_deref().map(|d| (d, parsed.source_for(Field::ReleaseDate)));
        if let Some((date, source)) =
            pick_scalar(&current, &file.release_date_source, date, sidecar_date.as_deref(), force)
            && let Some(date) = parse_date(date)
        {
            file.release_date = Some(date);
            file.release_date_source = source;
            fields.push(FileField::ReleaseDate);
        }

        for kind in [EntityKind::Publisher, EntityKind::Imprint] {
            let (current, current_source, parsed_name, sidecar_name, field) = match kind {
                EntityKind::Publisher => (
                    file.publisher.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
                    file.publisher_source.clone(),
                    non_blank(&parsed.publisher),
                    sidecar.and_then(|s| non_blank(&s.publisher)),
                    Field::Publisher,
                ),
                _ => (
                    file.imprint.as_ref().map(|i| i.name.clone()).unwrap_or_default(),
                    file.imprint_source.clone(),
                    non_blank(&parsed.imprint),
                    sidecar.and_then(|s| non_blank(&s.imprint)),
                    Field::Imprint,
                ),
            };
            let candidate = parsed_name.map(|n| (n, parsed.source_for(field)));
            let Some((name, source)) = pick_scalar(&current, &current_source, candidate, sidecar_name, force) else {
                continue;
            };
            let entity = match self.cache.named(kind, file.library_id, name).await {
                Ok(entity) => entity,
                Err(err) => {
                    warn!(name, ?kind, error = ?err, "could not resolve entity; skipping");
                    continue;
                },
            };
            if kind == EntityKind::Publisher {
                file.publisher = Some(entity);
                file.publisher_source = source;
                fields.push(FileField::Publisher);
            } else {
                file.imprint = Some(entity);
                file.imprint_source = source;
                fields.push(FileField::Imprint);
            }
        }

        let size_changed = file.size != update.size;
        let duration_changed = parsed.duration.is_some_and(|d| file.duration != Some(d));
        let bitrate_changed = parsed.bitrate.is_some_and(|b| file.bitrate != Some(b));
        let pages_changed = parsed.page_count.is_some_and(|p| file.page_count != Some(p));
        if size_changed || duration_changed || bitrate_changed || pages_changed {
            file.size = update.size;
            file.duration = parsed.duration.or(file.duration);
            file.bitrate = parsed.bitrate.or(file.bitrate);
            file.page_count = parsed.page_count.or(file.page_count);
            fields.push(FileField::Technical);
        }

        if file.cover.is_none() {
            match cover::extract(&self.mounts, &file.filepath, parsed.cover.as_ref(), &parsed.data_source).await {
                Ok(Some(cover)) => {
                    file.cover = Some(cover);
                    fields.push(FileField::Cover);
                },
                Ok(None) => {},
                Err(err) => warn!(path = %file.filepath.display(), error = ?err, "could not extract cover"),
            }
        }

        if !fields.is_empty() {
            debug!(?fields, "updating file fields");
            self.repo.update_file(&file, &fields).await.or_raise(|| ErrorKind::Catalog)?;
            file = self.reload_file(file.id).await?;
            changed = true;
        }

        let parsed_narrators = distinct_names(&parsed.narrators);
        let sidecar_narrators = distinct_names(&sidecar.map(|s| s.narrators.clone()).unwrap_or_default());
        let source = parsed.source_for(Field::Narrators);
        let winner = pick_list(
            &name_keys(&file.narrator_names()),
            &file.narrator_source,
            &name_keys(&parsed_narrators),
            source,
            &name_keys(&sidecar_narrators),
            force,
        );
        if let Some(winner) = winner {
            let (names, source) = match winner {
                Winner::Metadata => (parsed_narrators, source.clone()),
                Winner::Sidecar => (sidecar_narrators, DataSource::Sidecar),
            };
            let mut resolved = Vec::with_capacity(names.len());
            for name in &names {
                match self.cache.person(file.library_id, name).await {
                    Ok(person) => resolved.push(person.id),
                    Err(err) => warn!(name = %name, error = ?err, "could not resolve narrator; skipping"),
                }
            }
            if resolved.is_empty() {
                warn!("no narrator could be resolved; keeping the current ones");
            } else {
                debug!(count = resolved.len(), %source, "replacing narrators");
                self.repo.replace_narrators(file.id, &resolved, &source).await.or_raise(|| ErrorKind::Catalog)?;
                file = self.reload_file(file.id).await?;
                changed = true;
            }
        }

        let sidecar_identifiers = sidecar.map(FileSidecar::identifiers).unwrap_or_default();
        let source = parsed.source_for(Field::Identifiers);
        let winner =
            pick_list(&file.identifiers, &file.identifier_source, &parsed.identifiers, source, &sidecar_identifiers, force);
        if let Some(winner) = winner {
            let (identifiers, source) = match winner {
                Winner::Metadata => (&parsed.identifiers, source.clone()),
                Winner::Sidecar => (&sidecar_identifiers, DataSource::Sidecar),
            };
            debug!(count = identifiers.len(), %source, "replacing identifiers");
            self.repo.replace_identifiers(file.id, identifiers, &source).await.or_raise(|| ErrorKind::Catalog)?;
            file = self.reload_file(file.id).await?;
            changed = true;
        }

        let source = parsed.source_for(Field::Chapters);
        let current = Chapter::flatten(&file.chapters);
        let incoming = Chapter::flatten(&parsed.chapters);
        if pick_list(&current, &file.chapter_source, &incoming, source, &[], force).is_some() {
            debug!(count = Chapter::count(&parsed.chapters), %source, "replacing chapters");
            self.repo.replace_chapters(file.id, &parsed.chapters, source).await.or_raise(|| ErrorKind::Catalog)?;
            changed = true;
        }

        Ok(changed)
    }

    /// Push the fresh book and file out to their sidecars and the search index.
    async fn publish(&self, book_id: BookId, file_id: FileId) -> Result<()> {
        let book = self.reload_book(book_id).await?;
        if let Err(err) = sidecar::write_book(&self.mounts, &book).await {
            warn!(path = %book.filepath.display(), error = ?err, "could not write book sidecar");
        }
        if let Some(file) = book.files.iter().find(|f| f.id == file_id)
            && let Err(err) = sidecar::write_file(&self.mounts, file).await
        {
            warn!(path = %file.filepath.display(), error = ?err, "could not write file sidecar");
        }
        if let Err(err) = self.index.index_book(&book).await {
            warn!(error = ?err, "could not update search index");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::metadata_fills("", DataSource::Filepath, Some(("Dune", DataSource::EpubMetadata)), None, Some(("Dune", DataSource::EpubMetadata)))]
    #[case::same_value("Dune", DataSource::Filepath, Some(("Dune", DataSource::EpubMetadata)), Some("Dune"), None)]
    #[case::sidecar_overrides_metadata("Dune", DataSource::Filepath, Some(("Dune Messiah", DataSource::EpubMetadata)), Some("Dune (Sidecar)"), Some(("Dune (Sidecar)", DataSource::Sidecar)))]
    #[case::manual_blocks_both("Mine", DataSource::Manual, Some(("Dune", DataSource::EpubMetadata)), Some("Other"), None)]
    #[case::lower_rank_ignored("Dune", DataSource::EpubMetadata, Some(("dune", DataSource::Filepath)), None, None)]
    #[case::sidecar_alone("Dune", DataSource::EpubMetadata, None, Some("Dune!"), Some(("Dune!", DataSource::Sidecar)))]
    fn test_pick_scalar(
        #[case] current: &str,
        #[case] current_source: DataSource,
        #[case] metadata: Option<(&str, DataSource)>,
        #[case] sidecar: Option<&str>,
        #[case] expected: Option<(&str, DataSource)>,
    ) {
        let metadata = metadata.as_ref().map(|(v, s)| (*v, s));
        assert_eq!(pick_scalar(current, &current_source, metadata, sidecar, false), expected);
    }

    #[test]
    fn test_pick_scalar_force_ignores_sidecar() {
        let picked = pick_scalar("Dune", &DataSource::Manual, Some(("Dune II", &DataSource::Filepath)), Some("Side"), true);
        assert_eq!(picked, Some(("Dune II", DataSource::Filepath)));
    }

    #[test]
    fn test_pick_list_order_matters() {
        let current = ["a", "b"];
        let winner = pick_list(&current, &DataSource::EpubMetadata, &["b", "a"], &DataSource::EpubMetadata, &[], false);
        assert_eq!(winner, Some(Winner::Metadata));
    }

    #[test]
    fn test_pick_list_sidecar_compares_against_metadata_result() {
        let current: [&str; 0] = [];
        let winner = pick_list(&current, &DataSource::Filepath, &["a"], &DataSource::EpubMetadata, &["a"], false);
        assert_eq!(winner, Some(Winner::Metadata));
        let winner = pick_list(&current, &DataSource::Filepath, &["a"], &DataSource::EpubMetadata, &["b"], false);
        assert_eq!(winner, Some(Winner::Sidecar));
    }

    #[test]
    fn test_blank_authors_are_no_candidate() {
        let blank = distinct_authors(&[ParsedAuthor::new("  "), ParsedAuthor::new("")]);
        assert!(blank.is_empty());
        assert!(author_keys(&[ParsedAuthor::new("   ")]).is_empty());
        let current = [("frank herbert".to_string(), None)];
        let winner = pick_list(&current, &DataSource::EpubMetadata, &author_keys(&blank), &DataSource::EpubMetadata, &[], true);
        assert_eq!(winner, None);
    }

    #[test]
    fn test_distinct_names_keep_first_spelling() {
        assert_eq!(distinct_names(&["Fantasy", " fantasy ", "", "Horror", "FANTASY"]), vec!["Fantasy", "Horror"]);
        let authors = distinct_authors(&[
            ParsedAuthor::new(" Jane Doe"),
            ParsedAuthor::new("jane doe"),
            ParsedAuthor::with_role("Jane Doe", "Editor"),
        ]);
        assert_eq!(authors, vec![ParsedAuthor::new("Jane Doe"), ParsedAuthor::with_role("Jane Doe", "Editor")]);
    }

    #[test]
    fn test_author_keys_ignore_case() {
        let authors = [ParsedAuthor::new("Jane DOE"), ParsedAuthor::with_role("Bob", "Writer")];
        assert_eq!(
            author_keys(&authors),
            vec![("jane doe".to_string(), None), ("bob".to_string(), Some("writer".to_string()))]
        );
    }
}
