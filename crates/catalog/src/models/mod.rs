mod book;
mod entity;
mod file;
mod library;

pub use self::book::{Author, Book, BookField, BookSeries, NewBook};
pub use self::entity::{EntityKind, NamedEntity, Person, Series};
pub use self::file::{CoverImage, File, FileField, FileRole, NewFile};
pub use self::library::Library;
pub(crate) use self::book::BookRow;
pub(crate) use self::entity::{NamedRow, PersonRow, SeriesRow};
pub(crate) use self::file::{FileRow, format_date};
pub(crate) use self::library::LibraryRow;

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use quire_metadata::DataSource;
use std::path::Path;
use time::UtcDateTime;

pub type LibraryId = i64;
pub type BookId = i64;
pub type FileId = i64;
pub type PersonId = i64;
pub type SeriesId = i64;
pub type EntityId = i64;

pub(crate) fn source(raw: Option<String>) -> DataSource {
    raw.map(DataSource::from).unwrap_or_default()
}

pub(crate) fn timestamp(seconds: i64) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

pub(crate) fn now() -> i64 {
    UtcDateTime::now().unix_timestamp()
}

/// SQLite only stores UTF-8 paths.
pub(crate) fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))
}

pub(crate) fn to_u32(value: Option<i64>, what: &'static str) -> Result<Option<u32>> {
    value.map(|v| u32::try_from(v).or_raise(|| ErrorKind::InvalidData(what))).transpose()
}
