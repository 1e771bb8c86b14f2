use super::{BookId, FileId, LibraryId, NamedEntity, Person, source, timestamp, to_u32};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use quire_metadata::{Chapter, DataSource, FileType, Identifier};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use time::{Date, UtcDateTime, macros::format_description};

/// Whether a file drives its book's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileRole {
    Main,
    /// Companion material (PDFs, notes, artwork); never drives book fields.
    Supplement,
}
impl FileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileRole::Main => "main",
            FileRole::Supplement => "supplement",
        }
    }
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "main" => Ok(FileRole::Main),
            "supplement" => Ok(FileRole::Supplement),
            _ => exn::bail!(ErrorKind::InvalidData("file role")),
        }
    }
}
impl Display for FileRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A cover artifact stored next to its media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub path: PathBuf,
    pub mime_type: String,
    pub source: DataSource,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub id: FileId,
    pub library_id: LibraryId,
    pub book_id: BookId,
    pub filepath: PathBuf,
    pub file_type: FileType,
    pub role: FileRole,
    pub size: u64,
    /// Display name derived from metadata or the sidecar.
    pub name: Option<String>,
    pub name_source: DataSource,
    pub url: Option<String>,
    pub url_source: DataSource,
    pub release_date: Option<Date>,
    pub release_date_source: DataSource,
    pub publisher: Option<NamedEntity>,
    pub publisher_source: DataSource,
    pub imprint: Option<NamedEntity>,
    pub imprint_source: DataSource,
    pub narrators: Vec<Person>,
    pub narrator_source: DataSource,
    pub identifiers: Vec<Identifier>,
    pub identifier_source: DataSource,
    pub chapters: Vec<Chapter>,
    pub chapter_source: DataSource,
    pub cover: Option<CoverImage>,
    /// Audio length, in seconds.
    pub duration: Option<f64>,
    /// Audio bitrate, in bits per second.
    pub bitrate: Option<u32>,
    pub page_count: Option<u32>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

impl File {
    pub fn narrator_names(&self) -> Vec<&str> {
        self.narrators.iter().map(|n| n.name.as_str()).collect()
    }

    pub fn release_date_string(&self) -> String {
        self.release_date.and_then(|d| format_date(d).ok()).unwrap_or_default()
    }
}

pub(crate) fn format_date(date: Date) -> Result<String> {
    date.format(format_description!("[year]-[month]-[day]")).or_raise(|| ErrorKind::InvalidData("release date"))
}

fn parse_date(raw: &str) -> Result<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).or_raise(|| ErrorKind::InvalidData("release date"))
}

/// Columns of a file that can be written, each with its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileField {
    Name,
    Url,
    ReleaseDate,
    Publisher,
    Imprint,
    /// Cover path, MIME type, source and page.
    Cover,
    /// Size, duration, bitrate and page count.
    Technical,
    /// `filepath`.
    Location,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub library_id: LibraryId,
    pub book_id: BookId,
    pub filepath: PathBuf,
    pub file_type: FileType,
    pub role: FileRole,
    pub size: u64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    pub id: i64,
    pub library_id: i64,
    pub book_id: i64,
    pub filepath: String,
    pub file_type: String,
    pub file_role: String,
    pub filesize_bytes: i64,
    pub name: Option<String>,
    pub name_source: Option<String>,
    pub url: Option<String>,
    pub url_source: Option<String>,
    pub release_date: Option<String>,
    pub release_date_source: Option<String>,
    pub publisher_id: Option<i64>,
    pub publisher_name: Option<String>,
    pub publisher_source: Option<String>,
    pub imprint_id: Option<i64>,
    pub imprint_name: Option<String>,
    pub imprint_source: Option<String>,
    pub narrator_source: Option<String>,
    pub identifier_source: Option<String>,
    pub chapter_source: Option<String>,
    pub cover_image_path: Option<String>,
    pub cover_mime_type: Option<String>,
    pub cover_source: Option<String>,
    pub cover_page: Option<i64>,
    pub audiobook_duration_seconds: Option<f64>,
    pub audiobook_bitrate_bps: Option<i64>,
    pub page_count: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}
impl FileRow {
    /// Build the model without narrators, identifiers or chapters.
    pub fn into_model(self) -> Result<File> {
        let named = |id: Option<i64>, name: Option<String>, kind| match (id, name) {
            (Some(id), Some(name)) => Some(NamedEntity { id, library_id: self.library_id, kind, name }),
            _ => None,
        };
        let publisher = named(self.publisher_id, self.publisher_name, super::EntityKind::Publisher);
        let imprint = named(self.imprint_id, self.imprint_name, super::EntityKind::Imprint);
        let cover = match (self.cover_image_path, self.cover_mime_type) {
            (Some(path), Some(mime_type)) => Some(CoverImage {
                path: PathBuf::from(path),
                mime_type,
                source: source(self.cover_source),
                page: to_u32(self.cover_page, "cover page")?,
            }),
            _ => None,
        };
        Ok(File {
            id: self.id,
            library_id: self.library_id,
            book_id: self.book_id,
            filepath: PathBuf::from(self.filepath),
            file_type: FileType::from_extension(&self.file_type),
            role: FileRole::parse(&self.file_role)?,
            size: u64::try_from(self.filesize_bytes).or_raise(|| ErrorKind::InvalidData("file size"))?,
            name: self.name,
            name_source: source(self.name_source),
            url: self.url,
            url_source: source(self.url_source),
            release_date: self.release_date.as_deref().map(parse_date).transpose()?,
            release_date_source: source(self.release_date_source),
            publisher,
            publisher_source: source(self.publisher_source),
            imprint,
            imprint_source: source(self.imprint_source),
            narrators: Vec::new(),
            narrator_source: source(self.narrator_source),
            identifiers: Vec::new(),
            identifier_source: source(self.identifier_source),
            chapters: Vec::new(),
            chapter_source: source(self.chapter_source),
            cover,
            duration: self.audiobook_duration_seconds,
            bitrate: to_u32(self.audiobook_bitrate_bps, "bitrate")?,
            page_count: to_u32(self.page_count, "page count")?,
            created_at: timestamp(self.created_at)?,
            updated_at: timestamp(self.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_dates_round_trip_through_text() {
        let date = date!(2024 - 12 - 06);
        assert_eq!(parse_date(&format_date(date).unwrap()).unwrap(), date);
        assert!(parse_date("06/12/2024").is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(FileRole::parse("main").unwrap(), FileRole::Main);
        assert_eq!(FileRole::parse(FileRole::Supplement.as_str()).unwrap(), FileRole::Supplement);
        assert!(FileRole::parse("primary").is_err());
    }
}
