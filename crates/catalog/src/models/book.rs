use super::{BookId, File, FileRole, LibraryId, NamedEntity, Person, Series, source, timestamp};
use crate::error::Result;
use quire_metadata::DataSource;
use std::path::{Path, PathBuf};
use time::UtcDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub person: Person,
    /// Credit for comics (`writer`, `penciller`, ...); `None` for plain authorship.
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookSeries {
    pub series: Series,
    pub number: Option<f64>,
}

/// A book, loaded with every relationship and its files.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: BookId,
    pub library_id: LibraryId,
    /// The book's directory, or `<root>/<canonical stem>` for root-level books.
    pub filepath: PathBuf,
    pub is_directory: bool,
    pub title: String,
    pub title_source: DataSource,
    pub sort_title: String,
    pub sort_title_source: DataSource,
    pub subtitle: Option<String>,
    pub subtitle_source: DataSource,
    pub description: Option<String>,
    pub description_source: DataSource,
    pub authors: Vec<Author>,
    pub author_source: DataSource,
    pub series: Vec<BookSeries>,
    pub series_source: DataSource,
    pub genres: Vec<NamedEntity>,
    pub genre_source: DataSource,
    pub tags: Vec<NamedEntity>,
    pub tag_source: DataSource,
    pub files: Vec<File>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

impl Book {
    pub fn author_names(&self) -> Vec<&str> {
        self.authors.iter().map(|a| a.person.name.as_str()).collect()
    }

    pub fn genre_names(&self) -> Vec<&str> {
        self.genres.iter().map(|g| g.name.as_str()).collect()
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    /// `(name, number)` for every series membership, in order.
    pub fn series_entries(&self) -> Vec<(&str, Option<f64>)> {
        self.series.iter().map(|s| (s.series.name.as_str(), s.number)).collect()
    }

    pub fn main_files(&self) -> impl Iterator<Item = &File> {
        self.files.iter().filter(|f| f.role == FileRole::Main)
    }

    /// Directory the book's files live in.
    pub fn directory(&self) -> &Path {
        if self.is_directory { &self.filepath } else { self.filepath.parent().unwrap_or(&self.filepath) }
    }
}

/// Columns of a book that can be written, each with its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookField {
    Title,
    SortTitle,
    Subtitle,
    Description,
    /// `filepath` and `is_directory`.
    Location,
}

/// What is needed to insert a book; everything else starts empty.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub library_id: LibraryId,
    pub filepath: PathBuf,
    pub is_directory: bool,
    pub title: String,
    pub title_source: DataSource,
    pub sort_title: String,
    pub author_source: DataSource,
}

#[derive(sqlx::FromRow)]
pub(crate) struct BookRow {
    pub id: i64,
    pub library_id: i64,
    pub filepath: String,
    pub is_directory: bool,
    pub title: String,
    pub title_source: String,
    pub sort_title: String,
    pub sort_title_source: String,
    pub subtitle: Option<String>,
    pub subtitle_source: Option<String>,
    pub description: Option<String>,
    pub description_source: Option<String>,
    pub author_source: String,
    pub series_source: Option<String>,
    pub genre_source: Option<String>,
    pub tag_source: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
impl BookRow {
    /// Build the model without relationships; the repository fills those in.
    pub fn into_model(self) -> Result<Book> {
        Ok(Book {
            id: self.id,
            library_id: self.library_id,
            filepath: PathBuf::from(self.filepath),
            is_directory: self.is_directory,
            title: self.title,
            title_source: source(Some(self.title_source)),
            sort_title: self.sort_title,
            sort_title_source: source(Some(self.sort_title_source)),
            subtitle: self.subtitle,
            subtitle_source: source(self.subtitle_source),
            description: self.description,
            description_source: source(self.description_source),
            authors: Vec::new(),
            author_source: source(Some(self.author_source)),
            series: Vec::new(),
            series_source: source(self.series_source),
            genres: Vec::new(),
            genre_source: source(self.genre_source),
            tags: Vec::new(),
            tag_source: source(self.tag_source),
            files: Vec::new(),
            created_at: timestamp(self.created_at)?,
            updated_at: timestamp(self.updated_at)?,
        })
    }
}
