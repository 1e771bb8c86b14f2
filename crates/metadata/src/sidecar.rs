//! User-editable JSON documents that mirror catalog entities.
//!
//! Every field is optional: a missing field means the sidecar has no opinion,
//! and unknown fields are ignored so documents written by newer versions
//! still load.

use crate::error::{ErrorKind, Result};
use crate::models::{Identifier, IdentifierKind, ParsedAuthor};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::{Date, macros::format_description};

pub const SIDECAR_VERSION: u32 = 1;
/// Suffix shared by every sidecar file name.
pub const SIDECAR_SUFFIX: &str = ".metadata.json";

fn current_version() -> u32 {
    SIDECAR_VERSION
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidecarAuthor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidecarSeries {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidecarIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Book-level sidecar, stored next to the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSidecar {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<SidecarAuthor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<SidecarSeries>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}
impl Default for BookSidecar {
    fn default() -> Self {
        Self {
            version: SIDECAR_VERSION,
            title: None,
            subtitle: None,
            description: None,
            authors: Vec::new(),
            series: Vec::new(),
            genres: Vec::new(),
            tags: Vec::new(),
        }
    }
}
impl BookSidecar {
    pub fn authors(&self) -> Vec<ParsedAuthor> {
        self.authors
            .iter()
            .filter(|a| !a.name.trim().is_empty())
            .map(|a| ParsedAuthor { name: a.name.trim().to_string(), role: a.role.clone() })
            .collect()
    }
}

/// File-level sidecar, stored as `<file name>.metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSidecar {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imprint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub narrators: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<SidecarIdentifier>,
}
impl Default for FileSidecar {
    fn default() -> Self {
        Self {
            version: SIDECAR_VERSION,
            name: None,
            url: None,
            release_date: None,
            publisher: None,
            imprint: None,
            narrators: Vec::new(),
            identifiers: Vec::new(),
        }
    }
}
impl FileSidecar {
    /// The release date, if present and well-formed (`YYYY-MM-DD`).
    pub fn release_date(&self) -> Option<Date> {
        parse_date(self.release_date.as_deref()?)
    }

    pub fn identifiers(&self) -> Vec<Identifier> {
        self.identifiers
            .iter()
            .filter(|i| !i.value.trim().is_empty())
            .map(|i| Identifier::new(IdentifierKind::from(i.kind.as_str()), i.value.as_str()))
            .collect()
    }
}

/// Render a date the way sidecars store it.
pub fn format_date(date: Date) -> Option<String> {
    date.format(format_description!("[year]-[month]-[day]")).ok()
}

/// Read a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// Sidecar documents share versioning and (de)serialization.
pub trait Sidecar: Serialize + for<'de> Deserialize<'de> {
    fn version(&self) -> u32;

    fn from_json(bytes: &[u8]) -> Result<Self> {
        let sidecar: Self = serde_json::from_slice(bytes).or_raise(|| ErrorKind::InvalidSidecar)?;
        exn::ensure!(sidecar.version() <= SIDECAR_VERSION, ErrorKind::InvalidSidecar);
        Ok(sidecar)
    }

    fn to_json(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self).or_raise(|| ErrorKind::Serialize("sidecar"))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}
impl Sidecar for BookSidecar {
    fn version(&self) -> u32 {
        self.version
    }
}
impl Sidecar for FileSidecar {
    fn version(&self) -> u32 {
        self.version
    }
}

/// `<path>.metadata.json`, for a media file.
pub fn file_sidecar_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// `<key>/<key name>.metadata.json` for a directory book, `<key>.metadata.json`
/// for a book that lives directly in a library root.
pub fn book_sidecar_path(book_key: &Path, is_directory: bool) -> PathBuf {
    let stem = book_key.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let file_name = format!("{stem}{SIDECAR_SUFFIX}");
    if is_directory { book_key.join(file_name) } else { book_key.with_file_name(file_name) }
}

pub fn is_sidecar(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n.to_string_lossy().ends_with(SIDECAR_SUFFIX))
}
