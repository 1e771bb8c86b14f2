//! Data access for every catalog entity.
//!
//! The repository is deliberately dumb: it reads and writes what it is told.
//! Deciding *whether* a value should be written (source ranks, emptiness,
//! force refresh) belongs to the caller.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{
    Author, Book, BookField, BookId, BookRow, BookSeries, EntityId, EntityKind, File, FileField, FileId, FileRow,
    Library, LibraryId, LibraryRow, NamedEntity, NamedRow, NewBook, NewFile, Person, PersonId, PersonRow, Series,
    SeriesId, SeriesRow, now, path_str, to_u32,
};
use exn::ResultExt;
use quire_metadata::sort::{sort_name, sort_title};
use quire_metadata::{Chapter, DataSource, Identifier, IdentifierKind};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Row counts for a single library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryCounts {
    pub books: u64,
    pub files: u64,
    pub persons: u64,
    pub series: u64,
}

#[derive(sqlx::FromRow)]
struct AuthorRow {
    #[sqlx(flatten)]
    person: PersonRow,
    role: Option<String>,
}

#[derive(sqlx::FromRow)]
struct BookSeriesRow {
    #[sqlx(flatten)]
    series: SeriesRow,
    series_number: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct ChapterRow {
    id: i64,
    parent_id: Option<i64>,
    title: String,
    start_page: Option<i64>,
    start_timestamp_ms: Option<i64>,
    href: Option<String>,
}

/// Rebuild the chapter tree from flat rows, keeping sibling order.
fn chapter_tree(rows: Vec<ChapterRow>) -> Result<Vec<Chapter>> {
    fn attach(parent: Option<i64>, by_parent: &mut HashMap<Option<i64>, Vec<(i64, Chapter)>>) -> Vec<Chapter> {
        let siblings = by_parent.remove(&parent).unwrap_or_default();
        siblings
            .into_iter()
            .map(|(id, mut chapter)| {
                chapter.children = attach(Some(id), by_parent);
                chapter
            })
            .collect()
    }
    let mut by_parent: HashMap<Option<i64>, Vec<(i64, Chapter)>> = HashMap::new();
    for row in rows {
        let chapter = Chapter {
            title: row.title,
            start_page: to_u32(row.start_page, "chapter page")?,
            start_timestamp_ms: row
                .start_timestamp_ms
                .map(|ms| u64::try_from(ms).or_raise(|| ErrorKind::InvalidData("chapter timestamp")))
                .transpose()?,
            href: row.href,
            children: Vec::new(),
        };
        by_parent.entry(row.parent_id).or_default().push((row.id, chapter));
    }
    Ok(attach(None, &mut by_parent))
}

fn to_i64(value: u64, what: &'static str) -> Result<i64> {
    i64::try_from(value).or_raise(|| ErrorKind::InvalidData(what))
}

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Libraries
    // =========================================================================

    /// Insert or update a library by name, replacing its root paths.
    pub async fn sync_library(&self, name: &str, paths: &[PathBuf], organize_file_structure: bool) -> Result<Library> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let id: i64 = sqlx::query_scalar(include_str!("../queries/upsert_library.sql"))
            .bind(name)
            .bind(organize_file_structure)
            .bind(now())
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::query("DELETE FROM library_paths WHERE library_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for path in paths {
            sqlx::query("INSERT INTO library_paths (library_id, filepath) VALUES (?, ?)")
                .bind(id)
                .bind(path_str(path)?)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        self.retrieve_library(id).await
    }

    pub async fn retrieve_library(&self, id: LibraryId) -> Result<Library> {
        let row: Option<LibraryRow> = sqlx::query_as(concat!(include_str!("../queries/select_library.sql"), " WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some(row) = row else {
            exn::bail!(ErrorKind::NotFound("library", id));
        };
        let paths = self.library_paths(id).await?;
        row.into_model(paths)
    }

    async fn library_paths(&self, id: LibraryId) -> Result<Vec<PathBuf>> {
        let paths: Vec<String> = sqlx::query_scalar(include_str!("../queries/select_library_paths.sql"))
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(paths.into_iter().map(PathBuf::from).collect())
    }

    pub async fn counts(&self, library_id: LibraryId) -> Result<LibraryCounts> {
        let (books, files, persons, series): (i64, i64, i64, i64) =
            sqlx::query_as(include_str!("../queries/count_library.sql"))
                .bind(library_id)
                .fetch_one(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        let count = |n: i64| u64::try_from(n).or_raise(|| ErrorKind::InvalidData("count"));
        Ok(LibraryCounts { books: count(books)?, files: count(files)?, persons: count(persons)?, series: count(series)? })
    }

    // =========================================================================
    // Shared entities
    // =========================================================================

    /// Look up a person by name (case-insensitively), creating it if absent.
    pub async fn find_or_create_person(&self, library_id: LibraryId, name: &str) -> Result<Person> {
        let name = name.trim();
        exn::ensure!(!name.is_empty(), ErrorKind::InvalidData("person name"));
        sqlx::query(include_str!("../queries/find_or_create_person.sql"))
            .bind(library_id)
            .bind(name)
            .bind(sort_name(name))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let row: PersonRow = sqlx::query_as(include_str!("../queries/select_person.sql"))
            .bind(library_id)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.into())
    }

    /// Look up a series by name, creating it with `source` if absent.
    ///
    /// An existing series keeps its original `name_source`.
    pub async fn find_or_create_series(&self, library_id: LibraryId, name: &str, source: &DataSource) -> Result<Series> {
        let name = name.trim();
        exn::ensure!(!name.is_empty(), ErrorKind::InvalidData("series name"));
        sqlx::query(include_str!("../queries/find_or_create_series.sql"))
            .bind(library_id)
            .bind(name)
            .bind(source.to_string())
            .bind(sort_title(name))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let row: SeriesRow = sqlx::query_as(include_str!("../queries/select_series.sql"))
            .bind(library_id)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.into())
    }

    /// Look up a genre, tag, publisher or imprint, creating it if absent.
    pub async fn find_or_create_named(&self, kind: EntityKind, library_id: LibraryId, name: &str) -> Result<NamedEntity> {
        let name = name.trim();
        exn::ensure!(!name.is_empty(), ErrorKind::InvalidData("entity name"));
        let table = kind.table();
        let insert = format!("INSERT INTO {table} (library_id, name) VALUES (?, ?) ON CONFLICT (library_id, name) DO NOTHING");
        sqlx::query(&insert)
            .bind(library_id)
            .bind(name)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let select = format!("SELECT id, library_id, name FROM {table} WHERE library_id = ? AND name = ?");
        let row: NamedRow = sqlx::query_as(&select)
            .bind(library_id)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.into_model(kind))
    }

    // =========================================================================
    // Books
    // =========================================================================

    pub async fn create_book(&self, book: &NewBook) -> Result<Book> {
        let id: i64 = sqlx::query_scalar(include_str!("../queries/insert_book.sql"))
            .bind(book.library_id)
            .bind(path_str(&book.filepath)?)
            .bind(book.is_directory)
            .bind(&book.title)
            .bind(book.title_source.to_string())
            .bind(&book.sort_title)
            .bind(book.author_source.to_string())
            .bind(now())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        debug!(book_id = id, path = %book.filepath.display(), "inserted book");
        self.retrieve_book(id).await
    }

    /// Load a book with every relationship and all of its files.
    pub async fn retrieve_book(&self, id: BookId) -> Result<Book> {
        let row: Option<BookRow> = sqlx::query_as(concat!(include_str!("../queries/select_book.sql"), " WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => self.load_book(row).await,
            None => exn::bail!(ErrorKind::NotFound("book", id)),
        }
    }

    pub async fn find_book_by_path(&self, library_id: LibraryId, path: &Path) -> Result<Option<Book>> {
        let row: Option<BookRow> = sqlx::query_as(concat!(
            include_str!("../queries/select_book.sql"),
            " WHERE library_id = ? AND filepath = ?"
        ))
        .bind(library_id)
        .bind(path_str(path)?)
        .fetch_optional(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => Ok(Some(self.load_book(row).await?)),
            None => Ok(None),
        }
    }

    pub async fn list_book_ids(&self, library_id: LibraryId) -> Result<Vec<BookId>> {
        sqlx::query_scalar("SELECT id FROM books WHERE library_id = ? ORDER BY id")
            .bind(library_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    async fn load_book(&self, row: BookRow) -> Result<Book> {
        let mut book = row.into_model()?;
        let authors: Vec<AuthorRow> = sqlx::query_as(include_str!("../queries/select_book_authors.sql"))
            .bind(book.id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        book.authors = authors.into_iter().map(|a| Author { person: a.person.into(), role: a.role }).collect();
        let series: Vec<BookSeriesRow> = sqlx::query_as(include_str!("../queries/select_book_series.sql"))
            .bind(book.id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        book.series = series.into_iter().map(|s| BookSeries { series: s.series.into(), number: s.series_number }).collect();
        book.genres = self.book_entities(book.id, EntityKind::Genre).await?;
        book.tags = self.book_entities(book.id, EntityKind::Tag).await?;
        book.files = self.list_book_files(book.id).await?;
        Ok(book)
    }

    async fn book_entities(&self, book_id: BookId, kind: EntityKind) -> Result<Vec<NamedEntity>> {
        let query = match kind {
            EntityKind::Tag => include_str!("../queries/select_book_tags.sql"),
            _ => include_str!("../queries/select_book_genres.sql"),
        };
        let rows: Vec<NamedRow> = sqlx::query_as(query)
            .bind(book_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(|r| r.into_model(kind)).collect())
    }

    /// Write the listed columns of `book` (each together with its source).
    pub async fn update_book(&self, book: &Book, fields: &[BookField]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE books SET updated_at = ");
        query.push_bind(now());
        for field in fields {
            match field {
                BookField::Title => {
                    query.push(", title = ").push_bind(&book.title);
                    query.push(", title_source = ").push_bind(book.title_source.to_string());
                },
                BookField::SortTitle => {
                    query.push(", sort_title = ").push_bind(&book.sort_title);
                    query.push(", sort_title_source = ").push_bind(book.sort_title_source.to_string());
                },
                BookField::Subtitle => {
                    query.push(", subtitle = ").push_bind(book.subtitle.as_deref());
                    query.push(", subtitle_source = ").push_bind(book.subtitle_source.to_string());
                },
                BookField::Description => {
                    query.push(", description = ").push_bind(book.description.as_deref());
                    query.push(", description_source = ").push_bind(book.description_source.to_string());
                },
                BookField::Location => {
                    query.push(", filepath = ").push_bind(path_str(&book.filepath)?);
                    query.push(", is_directory = ").push_bind(book.is_directory);
                },
            }
        }
        query.push(" WHERE id = ").push_bind(book.id);
        let result = query.build().execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        exn::ensure!(result.rows_affected() > 0, ErrorKind::NotFound("book", book.id));
        debug!(book_id = book.id, ?fields, "updated book");
        Ok(())
    }

    /// Delete a book; its files and relationships cascade.
    pub async fn delete_book(&self, id: BookId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace a book's authors wholesale.
    pub async fn replace_authors(
        &self,
        book_id: BookId,
        authors: &[(PersonId, Option<String>)],
        source: &DataSource,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query("DELETE FROM authors WHERE book_id = ?")
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (order, (person_id, role)) in authors.iter().enumerate() {
            sqlx::query("INSERT INTO authors (book_id, person_id, role, sort_order) VALUES (?, ?, ?, ?)")
                .bind(book_id)
                .bind(person_id)
                .bind(role.as_deref())
                .bind(order as i64)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        sqlx::query("UPDATE books SET author_source = ?, updated_at = ? WHERE id = ?")
            .bind(source.to_string())
            .bind(now())
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    /// Replace a book's series memberships wholesale.
    pub async fn replace_book_series(
        &self,
        book_id: BookId,
        series: &[(SeriesId, Option<f64>)],
        source: &DataSource,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query("DELETE FROM book_series WHERE book_id = ?")
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (order, (series_id, number)) in series.iter().enumerate() {
            sqlx::query("INSERT INTO book_series (book_id, series_id, series_number, sort_order) VALUES (?, ?, ?, ?)")
                .bind(book_id)
                .bind(series_id)
                .bind(number)
                .bind(order as i64)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        sqlx::query("UPDATE books SET series_source = ?, updated_at = ? WHERE id = ?")
            .bind(source.to_string())
            .bind(now())
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    pub async fn replace_genres(&self, book_id: BookId, genres: &[EntityId], source: &DataSource) -> Result<()> {
        self.replace_book_entities(book_id, EntityKind::Genre, genres, source).await
    }

    pub async fn replace_tags(&self, book_id: BookId, tags: &[EntityId], source: &DataSource) -> Result<()> {
        self.replace_book_entities(book_id, EntityKind::Tag, tags, source).await
    }

    async fn replace_book_entities(
        &self,
        book_id: BookId,
        kind: EntityKind,
        ids: &[EntityId],
        source: &DataSource,
    ) -> Result<()> {
        let (delete, insert, update) = match kind {
            EntityKind::Tag => (
                "DELETE FROM book_tags WHERE book_id = ?",
                "INSERT OR IGNORE INTO book_tags (book_id, tag_id, sort_order) VALUES (?, ?, ?)",
                "UPDATE books SET tag_source = ?, updated_at = ? WHERE id = ?",
            ),
            _ => (
                "DELETE FROM book_genres WHERE book_id = ?",
                "INSERT OR IGNORE INTO book_genres (book_id, genre_id, sort_order) VALUES (?, ?, ?)",
                "UPDATE books SET genre_source = ?, updated_at = ? WHERE id = ?",
            ),
        };
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(delete).bind(book_id).execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        for (order, id) in ids.iter().enumerate() {
            sqlx::query(insert)
                .bind(book_id)
                .bind(id)
                .bind(order as i64)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        sqlx::query(update)
            .bind(source.to_string())
            .bind(now())
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Files
    // =========================================================================

    pub async fn create_file(&self, file: &NewFile) -> Result<File> {
        let id: i64 = sqlx::query_scalar(include_str!("../queries/insert_file.sql"))
            .bind(file.library_id)
            .bind(file.book_id)
            .bind(path_str(&file.filepath)?)
            .bind(file.file_type.extension())
            .bind(file.role.as_str())
            .bind(to_i64(file.size, "file size")?)
            .bind(now())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        debug!(file_id = id, book_id = file.book_id, path = %file.filepath.display(), "inserted file");
        self.retrieve_file(id).await
    }

    /// Load a file with its narrators, identifiers and chapters.
    pub async fn retrieve_file(&self, id: FileId) -> Result<File> {
        let row: Option<FileRow> = sqlx::query_as(concat!(include_str!("../queries/select_file.sql"), " WHERE f.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => self.load_file(row).await,
            None => exn::bail!(ErrorKind::NotFound("file", id)),
        }
    }

    pub async fn find_file_by_path(&self, path: &Path) -> Result<Option<File>> {
        let row: Option<FileRow> =
            sqlx::query_as(concat!(include_str!("../queries/select_file.sql"), " WHERE f.filepath = ?"))
                .bind(path_str(path)?)
                .fetch_optional(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => Ok(Some(self.load_file(row).await?)),
            None => Ok(None),
        }
    }

    pub async fn list_book_files(&self, book_id: BookId) -> Result<Vec<File>> {
        let rows: Vec<FileRow> =
            sqlx::query_as(concat!(include_str!("../queries/select_file.sql"), " WHERE f.book_id = ? ORDER BY f.id"))
                .bind(book_id)
                .fetch_all(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        let mut files = Vec::with_capacity(rows.len());
        for row in rows {
            files.push(self.load_file(row).await?);
        }
        Ok(files)
    }

    /// Id and path of every file in a library.
    pub async fn list_file_paths(&self, library_id: LibraryId) -> Result<Vec<(FileId, PathBuf)>> {
        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, filepath FROM files WHERE library_id = ? ORDER BY id")
            .bind(library_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(|(id, path)| (id, PathBuf::from(path))).collect())
    }

    async fn load_file(&self, row: FileRow) -> Result<File> {
        let mut file = row.into_model()?;
        let narrators: Vec<PersonRow> = sqlx::query_as(include_str!("../queries/select_file_narrators.sql"))
            .bind(file.id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        file.narrators = narrators.into_iter().map(Person::from).collect();
        let identifiers: Vec<(String, String)> = sqlx::query_as(include_str!("../queries/select_file_identifiers.sql"))
            .bind(file.id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        file.identifiers = identifiers
            .into_iter()
            .map(|(kind, value)| Identifier::new(IdentifierKind::from(kind.as_str()), value))
            .collect();
        let chapters: Vec<ChapterRow> = sqlx::query_as(include_str!("../queries/select_file_chapters.sql"))
            .bind(file.id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        file.chapters = chapter_tree(chapters)?;
        Ok(file)
    }

    /// Write the listed columns of `file` (each together with its source).
    pub async fn update_file(&self, file: &File, fields: &[FileField]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE files SET updated_at = ");
        query.push_bind(now());
        for field in fields {
            match field {
                FileField::Name => {
                    query.push(", name = ").push_bind(file.name.as_deref());
                    query.push(", name_source = ").push_bind(file.name_source.to_string());
                },
                FileField::Url => {
                    query.push(", url = ").push_bind(file.url.as_deref());
                    query.push(", url_source = ").push_bind(file.url_source.to_string());
                },
                FileField::ReleaseDate => {
                    let date = file.release_date.map(crate::models::format_date).transpose()?;
                    query.push(", release_date = ").push_bind(date);
                    query.push(", release_date_source = ").push_bind(file.release_date_source.to_string());
                },
                FileField::Publisher => {
                    query.push(", publisher_id = ").push_bind(file.publisher.as_ref().map(|p| p.id));
                    query.push(", publisher_source = ").push_bind(file.publisher_source.to_string());
                },
                FileField::Imprint => {
                    query.push(", imprint_id = ").push_bind(file.imprint.as_ref().map(|i| i.id));
                    query.push(", imprint_source = ").push_bind(file.imprint_source.to_string());
                },
                FileField::Cover => {
                    let cover = file.cover.as_ref();
                    let path = cover.map(|c| path_str(&c.path)).transpose()?;
                    query.push(", cover_image_path = ").push_bind(path);
                    query.push(", cover_mime_type = ").push_bind(cover.map(|c| c.mime_type.as_str()));
                    query.push(", cover_source = ").push_bind(cover.map(|c| c.source.to_string()));
                    query.push(", cover_page = ").push_bind(cover.and_then(|c| c.page));
                },
                FileField::Technical => {
                    query.push(", filesize_bytes = ").push_bind(to_i64(file.size, "file size")?);
                    query.push(", audiobook_duration_seconds = ").push_bind(file.duration);
                    query.push(", audiobook_bitrate_bps = ").push_bind(file.bitrate);
                    query.push(", page_count = ").push_bind(file.page_count);
                },
                FileField::Location => {
                    query.push(", filepath = ").push_bind(path_str(&file.filepath)?);
                },
            }
        }
        query.push(" WHERE id = ").push_bind(file.id);
        let result = query.build().execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        exn::ensure!(result.rows_affected() > 0, ErrorKind::NotFound("file", file.id));
        debug!(file_id = file.id, ?fields, "updated file");
        Ok(())
    }

    pub async fn delete_file(&self, id: FileId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace a file's narrators wholesale.
    pub async fn replace_narrators(&self, file_id: FileId, narrators: &[PersonId], source: &DataSource) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query("DELETE FROM narrators WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (order, person_id) in narrators.iter().enumerate() {
            sqlx::query("INSERT INTO narrators (file_id, person_id, sort_order) VALUES (?, ?, ?)")
                .bind(file_id)
                .bind(person_id)
                .bind(order as i64)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        sqlx::query("UPDATE files SET narrator_source = ?, updated_at = ? WHERE id = ?")
            .bind(source.to_string())
            .bind(now())
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    /// Replace a file's identifiers wholesale.
    pub async fn replace_identifiers(&self, file_id: FileId, identifiers: &[Identifier], source: &DataSource) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query("DELETE FROM file_identifiers WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (order, identifier) in identifiers.iter().enumerate() {
            sqlx::query("INSERT INTO file_identifiers (file_id, type, value, sort_order) VALUES (?, ?, ?, ?)")
                .bind(file_id)
                .bind(identifier.kind.as_str())
                .bind(&identifier.value)
                .bind(order as i64)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        sqlx::query("UPDATE files SET identifier_source = ?, updated_at = ? WHERE id = ?")
            .bind(source.to_string())
            .bind(now())
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    /// Replace a file's chapter tree wholesale.
    pub async fn replace_chapters(&self, file_id: FileId, chapters: &[Chapter], source: &DataSource) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query("DELETE FROM chapters WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        // Breadth-first so every parent row exists before its children.
        let mut pending: Vec<(Option<i64>, usize, &Chapter)> =
            chapters.iter().enumerate().map(|(order, c)| (None, order, c)).collect();
        while !pending.is_empty() {
            let mut next = Vec::new();
            for (parent_id, order, chapter) in pending {
                let timestamp = chapter.start_timestamp_ms.map(|ms| to_i64(ms, "chapter timestamp")).transpose()?;
                let result = sqlx::query(
                    "INSERT INTO chapters (file_id, parent_id, sort_order, title, start_page, start_timestamp_ms, href) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(file_id)
                .bind(parent_id)
                .bind(order as i64)
                .bind(&chapter.title)
                .bind(chapter.start_page)
                .bind(timestamp)
                .bind(chapter.href.as_deref())
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
                let id = result.last_insert_rowid();
                next.extend(chapter.children.iter().enumerate().map(|(order, c)| (Some(id), order, c)));
            }
            pending = next;
        }
        sqlx::query("UPDATE files SET chapter_source = ?, updated_at = ? WHERE id = ?")
            .bind(source.to_string())
            .bind(now())
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)
    }
}
