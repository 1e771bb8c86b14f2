use super::*;
use crate::error::ErrorKind as LibraryErrorKind;
use crate::mounts::Mounts;
use crate::resolve::EntityStore;
use async_trait::async_trait;
use futures::StreamExt;
use quire_catalog::error::{ErrorKind as CatalogErrorKind, Result as CatalogResult};
use quire_catalog::models::{Book, EntityKind, FileRole, Library, LibraryId, NamedEntity, Person, Series};
use quire_catalog::{Database, Repository};
use quire_metadata::error::ErrorKind as MetadataErrorKind;
use quire_metadata::{
    Cover, DataSource, EnrichResult, Enricher, FileType, InputConverter, MetadataParser, ParsedAuthor, ParsedMetadata,
    ParserRegistry, PluginId,
};
use quire_storage::backend::MockBackend;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Per-path parser output; `None` makes the parse fail.
type Scripts = Arc<Mutex<HashMap<PathBuf, Option<ParsedMetadata>>>>;

struct ScriptedParser {
    file_type: FileType,
    scripts: Scripts,
}

impl MetadataParser for ScriptedParser {
    fn file_type(&self) -> FileType {
        self.file_type.clone()
    }

    fn parse(&self, path: &Path, _data: &[u8]) -> quire_metadata::error::Result<ParsedMetadata> {
        match self.scripts.lock().unwrap().get(path) {
            Some(Some(parsed)) => Ok(parsed.clone()),
            Some(None) => exn::bail!(MetadataErrorKind::Parse(path.display().to_string())),
            None => Ok(ParsedMetadata::default()),
        }
    }
}

struct TitleEnricher {
    plugin: PluginId,
}

#[async_trait]
impl Enricher for TitleEnricher {
    fn plugin(&self) -> &PluginId {
        &self.plugin
    }

    async fn enrich(&self, _path: &Path, _parsed: &ParsedMetadata) -> quire_metadata::error::Result<EnrichResult> {
        Ok(EnrichResult::modified(ParsedMetadata { title: Some("Enriched Title".into()), ..Default::default() }))
    }
}

/// Wraps `mobi` input in a marker and hands it back as `epub`.
struct MobiConverter {
    plugin: PluginId,
}

#[async_trait]
impl InputConverter for MobiConverter {
    fn plugin(&self) -> &PluginId {
        &self.plugin
    }

    fn source_extension(&self) -> &str {
        "mobi"
    }

    fn target_extension(&self) -> &str {
        "epub"
    }

    async fn convert(&self, _path: &Path, data: &[u8]) -> quire_metadata::error::Result<Vec<u8>> {
        Ok([b"converted:".as_slice(), data].concat())
    }
}

/// The catalog, except that any name containing "broken" cannot be stored.
struct FlakyStore {
    repo: Repository,
}

impl FlakyStore {
    fn check(name: &str) -> CatalogResult<()> {
        exn::ensure!(!name.to_lowercase().contains("broken"), CatalogErrorKind::Database);
        Ok(())
    }
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn person(&self, library_id: LibraryId, name: &str) -> CatalogResult<Person> {
        Self::check(name)?;
        self.repo.find_or_create_person(library_id, name).await
    }
    async fn series(&self, library_id: LibraryId, name: &str, source: &DataSource) -> CatalogResult<Series> {
        Self::check(name)?;
        self.repo.find_or_create_series(library_id, name, source).await
    }
    async fn named(&self, kind: EntityKind, library_id: LibraryId, name: &str) -> CatalogResult<NamedEntity> {
        Self::check(name)?;
        self.repo.find_or_create_named(kind, library_id, name).await
    }
}

struct Harness {
    _db: Database,
    scanner: Scanner,
    library: Library,
    backend: Arc<MockBackend>,
    scripts: Scripts,
}

impl Harness {
    async fn new(files: &[&str], organize: bool) -> Self {
        Self::with_registry(files, organize, |_| {}).await
    }

    async fn with_registry(files: &[&str], organize: bool, configure: impl FnOnce(&mut ParserRegistry)) -> Self {
        let backend = Arc::new(MockBackend::with_files(files.iter().map(|path| (*path, b"data".to_vec()))));
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let library = repo.sync_library("Books", &[PathBuf::from("/library")], organize).await.unwrap();
        let mut mounts = Mounts::new();
        mounts.mount(library.id, "/library", backend.clone());

        let scripts = Scripts::default();
        let mut registry = ParserRegistry::new();
        for file_type in [FileType::Epub, FileType::Cbz, FileType::M4b] {
            registry.register_native(Arc::new(ScriptedParser { file_type, scripts: scripts.clone() }));
        }
        configure(&mut registry);
        let scanner = Scanner::new(repo, mounts, Arc::new(registry));
        Self { _db: db, scanner, library, backend, scripts }
    }

    fn with_entity_store(mut self, store: Arc<dyn EntityStore>) -> Self {
        self.scanner = self.scanner.with_entity_store(store);
        self
    }

    fn script(&self, path: &str, parsed: Option<ParsedMetadata>) {
        self.scripts.lock().unwrap().insert(PathBuf::from(path), parsed);
    }

    async fn walk(&self) -> ScanSummary {
        let libraries = [self.library.clone()];
        let events: Vec<_> = self.scanner.scan_libraries(&libraries, 4, false).collect().await;
        assert!(matches!(events.first(), Some(Ok(ScanEvent::Started))));
        let mut summary = None;
        for event in events {
            if let ScanEvent::Complete(complete) = event.unwrap() {
                summary = Some(complete);
            }
        }
        summary.unwrap()
    }

    async fn book(&self, key: &str) -> Book {
        let repo = self.scanner.repository();
        let book = repo.find_book_by_path(self.library.id, Path::new(key)).await.unwrap().unwrap();
        repo.retrieve_book(book.id).await.unwrap()
    }

    async fn paths(&self) -> Vec<PathBuf> {
        self.backend.paths().await
    }
}

fn metadata(title: &str, authors: &[&str]) -> ParsedMetadata {
    ParsedMetadata {
        title: Some(title.to_string()),
        authors: authors.iter().map(|a| ParsedAuthor::new(*a)).collect(),
        ..ParsedMetadata::default()
    }
}

#[tokio::test]
async fn test_directory_book_from_path() {
    let harness = Harness::new(&["[John Doe] My Test Book/book.epub"], false).await;
    let summary = harness.walk().await;
    assert_eq!(summary.created_books, 1);
    assert_eq!(summary.created_files, 1);
    assert_eq!(summary.failed, 0);

    let book = harness.book("/library/[John Doe] My Test Book").await;
    assert!(book.is_directory);
    assert_eq!(book.title, "My Test Book");
    assert_eq!(book.title_source, DataSource::Filepath);
    assert_eq!(book.author_names(), vec!["John Doe"]);
    assert_eq!(book.author_source, DataSource::Filepath);
    assert_eq!(book.sort_title, "My Test Book");
    assert_eq!(book.files.len(), 1);
    assert!(harness.paths().await.contains(&PathBuf::from(
        "[John Doe] My Test Book/[John Doe] My Test Book.metadata.json"
    )));
}

#[tokio::test]
async fn test_rescan_is_idempotent() {
    let harness = Harness::new(&["Dune/Dune.epub", "Dune/map.pdf"], false).await;
    harness.script("/library/Dune/Dune.epub", Some(metadata("Dune", &["Frank Herbert"])));
    let first = harness.walk().await;
    assert_eq!(first.created_files, 1);
    let before = harness.book("/library/Dune").await;

    let second = harness.walk().await;
    assert_eq!(second.created_books, 0);
    assert_eq!(second.created_files, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.unchanged, 1);
    assert_eq!(second.deleted_files, 0);
    let after = harness.book("/library/Dune").await;
    assert_eq!(before.title, after.title);
    assert_eq!(before.author_names(), after.author_names());
    assert_eq!(before.files.len(), after.files.len());
}

#[tokio::test]
async fn test_root_level_files_share_a_book() {
    let harness = Harness::new(
        &["Wind and Truth (2024).epub", "Wind and Truth (2024) {Michael Kramer}.m4b"],
        false,
    )
    .await;
    for path in ["/library/Wind and Truth (2024).epub", "/library/Wind and Truth (2024) {Michael Kramer}.m4b"] {
        harness.script(path, Some(metadata("Wind and Truth", &["Brandon Sanderson"])));
    }
    let summary = harness.walk().await;
    assert_eq!(summary.created_books, 1);
    assert_eq!(summary.created_files, 2);
    assert_eq!(summary.entities.persons, 2);

    let book = harness.book("/library/[Brandon Sanderson] Wind and Truth").await;
    assert!(!book.is_directory);
    assert_eq!(book.files.len(), 2);
    let audio = book.files.iter().find(|f| f.file_type == FileType::M4b).unwrap();
    assert_eq!(audio.narrator_names(), vec!["Michael Kramer"]);
    assert_eq!(audio.narrator_source, DataSource::Filepath);
    let ids = harness.scanner.repository().list_book_ids(harness.library.id).await.unwrap();
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn test_walk_defers_renames_until_discovery_is_done() {
    let harness = Harness::new(&["a.epub", "b.epub", "c.epub"], true).await;
    harness.script("/library/a.epub", Some(metadata("Alpha", &["Ann Author"])));
    harness.script("/library/b.epub", Some(metadata("Beta", &["Ann Author"])));
    harness.script("/library/c.epub", Some(metadata("Gamma", &["Ann Author"])));

    let summary = harness.walk().await;
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.created_files, 3);
    assert_eq!(summary.organized, 3);

    let paths = harness.paths().await;
    for name in ["Alpha", "Beta", "Gamma"] {
        assert!(paths.contains(&PathBuf::from(format!("[Ann Author] {name}.epub"))), "{paths:?}");
        assert!(paths.contains(&PathBuf::from(format!("[Ann Author] {name}.epub.metadata.json"))), "{paths:?}");
        let moved = format!("/library/[Ann Author] {name}.epub");
        let file = harness.scanner.repository().find_file_by_path(Path::new(&moved)).await.unwrap();
        assert!(file.is_some(), "{moved} not cataloged");
    }
    for old in ["a.epub", "b.epub", "c.epub"] {
        assert!(!paths.contains(&PathBuf::from(old)));
    }
}

#[tokio::test]
async fn test_invalid_request_does_no_work() {
    let harness = Harness::new(&["Dune/Dune.epub"], false).await;
    let err = harness.scanner.scan(&ScanOptions::default()).await.unwrap_err();
    assert!(matches!(&*err, LibraryErrorKind::InvalidRequest(_)));
    let both = ScanOptions { book_id: Some(1), ..ScanOptions::path("/library/Dune/Dune.epub") };
    let err = harness.scanner.scan(&both).await.unwrap_err();
    assert!(matches!(&*err, LibraryErrorKind::InvalidRequest(_)));
    assert!(harness.scanner.repository().list_book_ids(harness.library.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scan_path_creates_then_skips_missing() {
    let harness = Harness::new(&["Dune/Dune.epub"], false).await;
    let outcome = harness.scanner.scan(&ScanOptions::path("/library/Dune/Dune.epub")).await.unwrap();
    assert!(matches!(outcome, ScanOutcome::Created { new_book: true, .. }));
    let outcome = harness.scanner.scan(&ScanOptions::path("/library/Dune/Dune.epub")).await.unwrap();
    assert!(matches!(outcome, ScanOutcome::Updated { changed: false, .. }));
    let outcome = harness.scanner.scan(&ScanOptions::path("/library/Gone/Gone.epub")).await.unwrap();
    assert_eq!(outcome, ScanOutcome::Skipped(PathBuf::from("/library/Gone/Gone.epub")));
}

#[tokio::test]
async fn test_missing_files_cascade_to_book() {
    let harness = Harness::new(&["Dune/Dune.epub", "Dune/Dune.m4b"], false).await;
    harness.walk().await;
    let book = harness.book("/library/Dune").await;
    let epub = book.files.iter().find(|f| f.file_type == FileType::Epub).unwrap().clone();
    let audio = book.files.iter().find(|f| f.file_type == FileType::M4b).unwrap().clone();

    harness.scanner.mounts.delete(&epub.filepath).await.unwrap();
    let outcome = harness.scanner.scan(&ScanOptions::file(epub.id)).await.unwrap();
    assert_eq!(outcome, ScanOutcome::FileDeleted { book_id: book.id, file_id: epub.id });

    harness.scanner.mounts.delete(&audio.filepath).await.unwrap();
    let outcome = harness.scanner.scan(&ScanOptions::file(audio.id)).await.unwrap();
    assert_eq!(outcome, ScanOutcome::BookDeleted { book_id: book.id, file_id: Some(audio.id) });
    assert!(harness.scanner.repository().retrieve_book(book.id).await.is_err());
}

#[tokio::test]
async fn test_book_resync_survives_a_bad_file() {
    let harness = Harness::new(&["Dune/Dune.epub", "Dune/Dune.m4b"], false).await;
    harness.walk().await;
    let book = harness.book("/library/Dune").await;
    harness.script("/library/Dune/Dune.epub", None);

    let outcome = harness.scanner.scan(&ScanOptions::book(book.id)).await.unwrap();
    assert_eq!(outcome, ScanOutcome::BookResynced { book_id: book.id, files: 1 });

    let epub = book.files.iter().find(|f| f.file_type == FileType::Epub).unwrap();
    let err = harness.scanner.scan(&ScanOptions::file(epub.id)).await.unwrap_err();
    assert!(matches!(&*err, LibraryErrorKind::Scan));
}

#[tokio::test]
async fn test_resync_reorganizes_immediately() {
    let harness = Harness::new(&["Dune/Dune.epub", "Dune/notes.txt"], true).await;
    harness.walk().await;
    let book = harness.book("/library/Dune").await;
    let epub = book.files.iter().find(|f| f.role == FileRole::Main).unwrap().clone();

    harness.script("/library/Dune/Dune.epub", Some(metadata("Dune", &["Frank Herbert"])));
    let outcome = harness.scanner.scan(&ScanOptions::file(epub.id)).await.unwrap();
    assert!(matches!(outcome, ScanOutcome::Updated { changed: true, .. }));

    let moved = harness.scanner.repository().retrieve_file(epub.id).await.unwrap();
    assert_eq!(moved.filepath, Path::new("/library/[Frank Herbert] Dune/[Frank Herbert] Dune.epub"));
    let book = harness.scanner.repository().retrieve_book(book.id).await.unwrap();
    assert_eq!(book.filepath, Path::new("/library/[Frank Herbert] Dune"));

    let paths = harness.paths().await;
    assert!(paths.contains(&PathBuf::from("[Frank Herbert] Dune/[Frank Herbert] Dune.epub")));
    assert!(paths.contains(&PathBuf::from("[Frank Herbert] Dune/notes.txt")));
    assert!(paths.contains(&PathBuf::from("[Frank Herbert] Dune/[Frank Herbert] Dune.metadata.json")));
    assert!(paths.iter().all(|p| !p.starts_with("Dune")), "{paths:?}");
}

#[tokio::test]
async fn test_enricher_beats_embedded_metadata() {
    let harness = Harness::with_registry(&["Dune/Dune.epub"], false, |registry| {
        registry.register_enricher(Arc::new(TitleEnricher { plugin: PluginId::new("test", "titles") }));
    })
    .await;
    harness.script("/library/Dune/Dune.epub", Some(metadata("Embedded", &["Frank Herbert"])));
    harness.walk().await;

    let book = harness.book("/library/Dune").await;
    assert_eq!(book.title, "Enriched Title");
    assert_eq!(book.title_source, DataSource::plugin("test", "titles"));
    assert_eq!(book.author_names(), vec!["Frank Herbert"]);
    assert_eq!(book.author_source, DataSource::EpubMetadata);
}

#[tokio::test]
async fn test_sidecar_overrides_unless_forced() {
    let harness = Harness::new(&["Dune/Dune.epub"], false).await;
    harness
        .scanner
        .mounts
        .write(Path::new("/library/Dune/Dune.metadata.json"), br#"{"version": 1, "title": "Sidecar Title"}"#)
        .await
        .unwrap();
    harness.script("/library/Dune/Dune.epub", Some(metadata("Embedded", &[])));
    harness.walk().await;

    let book = harness.book("/library/Dune").await;
    assert_eq!(book.title, "Sidecar Title");
    assert_eq!(book.title_source, DataSource::Sidecar);

    let main = book.files[0].id;
    harness.scanner.scan(&ScanOptions::file(main).force_refresh(true)).await.unwrap();
    let book = harness.scanner.repository().retrieve_book(book.id).await.unwrap();
    assert_eq!(book.title, "Embedded");
    assert_eq!(book.title_source, DataSource::EpubMetadata);
}

#[tokio::test]
async fn test_supplements_and_existing_cover() {
    let harness = Harness::new(
        &["Dune/Dune.epub", "Dune/Dune.epub.cover.jpg", "Dune/map.pdf", "Dune/.DS_Store"],
        false,
    )
    .await;
    harness.walk().await;

    let book = harness.book("/library/Dune").await;
    assert_eq!(book.files.len(), 2);
    let main = book.files.iter().find(|f| f.role == FileRole::Main).unwrap();
    let cover = main.cover.as_ref().unwrap();
    assert_eq!(cover.source, DataSource::ExistingCover);
    assert_eq!(cover.path, Path::new("/library/Dune/Dune.epub.cover.jpg"));
    let supplement = book.files.iter().find(|f| f.role == FileRole::Supplement).unwrap();
    assert_eq!(supplement.filepath, Path::new("/library/Dune/map.pdf"));
    assert_eq!(supplement.name.as_deref(), Some("map"));
}

#[tokio::test]
async fn test_blank_authors_never_replace_known_ones() {
    let harness = Harness::new(&["Dune/Dune.epub"], false).await;
    harness.script("/library/Dune/Dune.epub", Some(metadata("Dune", &["Frank Herbert"])));
    harness.walk().await;
    let book = harness.book("/library/Dune").await;
    let main = book.files[0].id;

    harness.script("/library/Dune/Dune.epub", Some(metadata("Dune", &["  ", ""])));
    for force in [true, false] {
        let outcome = harness.scanner.scan(&ScanOptions::file(main).force_refresh(force)).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Updated { changed: false, .. }), "force={force}: {outcome:?}");
        let book = harness.scanner.repository().retrieve_book(book.id).await.unwrap();
        assert_eq!(book.author_names(), vec!["Frank Herbert"]);
        assert_eq!(book.author_source, DataSource::EpubMetadata);
    }
}

#[tokio::test]
async fn test_repeated_genres_settle_after_one_scan() {
    let harness = Harness::new(&["Dune/Dune.epub"], false).await;
    let parsed = ParsedMetadata {
        genres: vec!["Fantasy".into(), "fantasy".into(), " Fantasy ".into()],
        tags: vec!["Classic".into(), "CLASSIC".into()],
        ..metadata("Dune", &["Frank Herbert", "frank herbert"])
    };
    harness.script("/library/Dune/Dune.epub", Some(parsed));
    harness.walk().await;

    let second = harness.walk().await;
    assert_eq!(second.updated, 0);
    assert_eq!(second.unchanged, 1);
    let book = harness.book("/library/Dune").await;
    assert_eq!(book.genre_names(), vec!["Fantasy"]);
    assert_eq!(book.tag_names(), vec!["Classic"]);
    assert_eq!(book.author_names(), vec!["Frank Herbert"]);
}

#[tokio::test]
async fn test_organize_leaves_nested_books_in_place() {
    let harness = Harness::new(&["Herbert/notes.epub", "Herbert/Dune/Dune.epub"], true).await;
    harness.script("/library/Herbert/notes.epub", Some(metadata("Notes", &["Frank Herbert"])));
    harness.script("/library/Herbert/Dune/Dune.epub", Some(metadata("Dune", &["Frank Herbert"])));
    let summary = harness.walk().await;
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.created_books, 2);

    let repo = harness.scanner.repository();
    for expected in [
        "/library/[Frank Herbert] Notes/[Frank Herbert] Notes.epub",
        "/library/Herbert/[Frank Herbert] Dune/[Frank Herbert] Dune.epub",
    ] {
        assert!(repo.find_file_by_path(Path::new(expected)).await.unwrap().is_some(), "{expected} not cataloged");
    }
    for (_, path) in repo.list_file_paths(harness.library.id).await.unwrap() {
        assert!(harness.scanner.mounts.exists(&path).await.unwrap(), "{} missing on disk", path.display());
    }
    let book = harness.book("/library/Herbert/[Frank Herbert] Dune").await;
    assert_eq!(book.title, "Dune");
}

#[tokio::test]
async fn test_resync_restores_a_deleted_cover() {
    let harness = Harness::new(&["Dune/Dune.epub"], false).await;
    let png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    let parsed = ParsedMetadata {
        cover: Some(Cover { data: png.clone(), mime_type: Some("image/png".into()), page: None }),
        ..metadata("Dune", &["Frank Herbert"])
    };
    harness.script("/library/Dune/Dune.epub", Some(parsed));
    harness.walk().await;

    let book = harness.book("/library/Dune").await;
    let main = book.files[0].clone();
    let cover = main.cover.clone().unwrap();
    assert_eq!(cover.path, Path::new("/library/Dune/Dune.epub.cover.png"));
    assert_eq!(cover.source, DataSource::EpubMetadata);

    harness.scanner.mounts.delete(&cover.path).await.unwrap();
    assert!(!harness.scanner.mounts.exists(&cover.path).await.unwrap());
    harness.scanner.scan(&ScanOptions::file(main.id)).await.unwrap();

    assert_eq!(harness.scanner.mounts.read(&cover.path).await.unwrap(), png);
    let file = harness.scanner.repository().retrieve_file(main.id).await.unwrap();
    assert_eq!(file.cover.as_ref().map(|c| c.path.as_path()), Some(cover.path.as_path()));
}

#[tokio::test]
async fn test_converted_inputs_are_cataloged() {
    let harness = Harness::with_registry(&["Dune/Dune.mobi"], false, |registry| {
        registry.register_converter(Arc::new(MobiConverter { plugin: PluginId::new("test", "mobi") })).unwrap();
    })
    .await;
    let summary = harness.walk().await;
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.created_books, 1);
    assert_eq!(summary.created_files, 1);

    let converted = harness.scanner.mounts.read(Path::new("/library/Dune/Dune.epub")).await.unwrap();
    assert_eq!(converted, b"converted:data");
    let book = harness.book("/library/Dune").await;
    assert_eq!(book.files.len(), 1);
    assert_eq!(book.files[0].filepath, Path::new("/library/Dune/Dune.epub"));
    assert_eq!(book.files[0].file_type, FileType::Epub);

    let second = harness.walk().await;
    assert_eq!(second.created_files, 0);
    assert_eq!(second.unchanged, 1);
}

#[tokio::test]
async fn test_one_unresolvable_name_skips_only_itself() {
    let harness = Harness::new(&["Dune/Dune.m4b"], false).await;
    let store = Arc::new(FlakyStore { repo: harness.scanner.repository().clone() });
    let harness = harness.with_entity_store(store);
    let parsed = ParsedMetadata {
        genres: vec!["Fantasy".into(), "Broken".into()],
        narrators: vec!["Broken Name".into(), "Sam Reader".into()],
        ..metadata("Dune", &["Ann Author", "Broken Name", "Bob Writer"])
    };
    harness.script("/library/Dune/Dune.m4b", Some(parsed));
    let summary = harness.walk().await;
    assert_eq!(summary.failed, 0);

    let book = harness.book("/library/Dune").await;
    assert_eq!(book.author_names(), vec!["Ann Author", "Bob Writer"]);
    assert_eq!(book.genre_names(), vec!["Fantasy"]);
    assert_eq!(book.files[0].narrator_names(), vec!["Sam Reader"]);
}
