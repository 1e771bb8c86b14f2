//! Data provenance and its trust ordering.
//!
//! Every value stored in the catalog carries the [`DataSource`] that produced
//! it. Merge decisions compare sources by [`DataSource::rank`]: a lower rank is
//! more trusted, and a source may overwrite a value whenever its rank is lower
//! than or equal to the rank of the value's current source.

use std::{
    convert::Infallible,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Trust tiers, most trusted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Edited by hand.
    Manual,
    /// Read from a user-editable sidecar document.
    Sidecar,
    /// Supplied by a plugin parser or enricher.
    Plugin,
    /// Embedded in the file by its format (OPF, ComicInfo, MP4 atoms).
    FileMetadata,
    /// Guessed from the file name or its directory.
    Filepath,
}

// Indexed by `Tier as usize`; the match in `Tier::rank` keeps this exhaustive.
const TIER_RANKS: [u8; 5] = [0, 1, 2, 3, 4];

impl Tier {
    pub const fn rank(self) -> u8 {
        TIER_RANKS[self as usize]
    }
}

/// Identity of a plugin, written as `scope/id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginId {
    pub scope: String,
    pub id: String,
}
impl PluginId {
    pub fn new(scope: impl Into<String>, id: impl Into<String>) -> Self {
        Self { scope: scope.into(), id: id.into() }
    }
}
impl Display for PluginId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.scope, self.id)
    }
}

/// Where a value came from.
///
/// Stored in the catalog by its string form (see [`Display`] and [`FromStr`]).
/// Unrecognised strings survive a round-trip as [`DataSource::Unknown`] and are
/// trusted as little as [`DataSource::Filepath`]; the empty string parses as
/// [`DataSource::Filepath`] directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum DataSource {
    Manual,
    Sidecar,
    Plugin(PluginId),
    EpubMetadata,
    CbzMetadata,
    M4bMetadata,
    /// A cover artifact that was already on disk before extraction.
    ExistingCover,
    #[default]
    Filepath,
    Unknown(String),
}

impl DataSource {
    /// The trust tier of this source.
    pub fn tier(&self) -> Tier {
        match self {
            DataSource::Manual => Tier::Manual,
            DataSource::Sidecar => Tier::Sidecar,
            DataSource::Plugin(_) => Tier::Plugin,
            DataSource::EpubMetadata
            | DataSource::CbzMetadata
            | DataSource::M4bMetadata
            | DataSource::ExistingCover => Tier::FileMetadata,
            DataSource::Filepath => Tier::Filepath,
            DataSource::Unknown(_) => Tier::Filepath,
        }
    }

    /// Lower is more trusted.
    pub fn rank(&self) -> u8 {
        self.tier().rank()
    }

    /// Whether a value from `self` may replace a value from `existing`.
    pub fn can_override(&self, existing: &DataSource) -> bool {
        self.rank() <= existing.rank()
    }

    pub fn plugin(scope: impl Into<String>, id: impl Into<String>) -> Self {
        DataSource::Plugin(PluginId::new(scope, id))
    }
}

impl Display for DataSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DataSource::Manual => f.write_str("manual"),
            DataSource::Sidecar => f.write_str("sidecar"),
            DataSource::Plugin(plugin) => write!(f, "plugin:{plugin}"),
            DataSource::EpubMetadata => f.write_str("epub_metadata"),
            DataSource::CbzMetadata => f.write_str("cbz_metadata"),
            DataSource::M4bMetadata => f.write_str("m4b_metadata"),
            DataSource::ExistingCover => f.write_str("existing_cover"),
            DataSource::Filepath => f.write_str("filepath"),
            DataSource::Unknown(raw) => f.write_str(raw),
        }
    }
}

impl FromStr for DataSource {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed {
            "" | "filepath" => DataSource::Filepath,
            "manual" => DataSource::Manual,
            "sidecar" => DataSource::Sidecar,
            "epub_metadata" => DataSource::EpubMetadata,
            "cbz_metadata" => DataSource::CbzMetadata,
            "m4b_metadata" => DataSource::M4bMetadata,
            "existing_cover" => DataSource::ExistingCover,
            other => match other.strip_prefix("plugin:").and_then(|rest| rest.split_once('/')) {
                Some((scope, id)) if !scope.is_empty() && !id.is_empty() => DataSource::plugin(scope, id),
                _ => DataSource::Unknown(other.to_string()),
            },
        })
    }
}
impl From<&str> for DataSource {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(source) => source,
            Err(infallible) => match infallible {},
        }
    }
}
impl From<String> for DataSource {
    fn from(value: String) -> Self {
        DataSource::from(value.as_str())
    }
}

/// Natively supported formats, plus extensions claimed by plugin parsers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileType {
    Epub,
    Cbz,
    M4b,
    /// Any other (lowercase) extension.
    Other(String),
}

impl FileType {
    /// Extensions that no plugin may claim.
    pub const RESERVED: [&'static str; 3] = ["epub", "cbz", "m4b"];

    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "epub" => FileType::Epub,
            "cbz" => FileType::Cbz,
            "m4b" => FileType::M4b,
            other => FileType::Other(other.to_string()),
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            FileType::Epub => "epub",
            FileType::Cbz => "cbz",
            FileType::M4b => "m4b",
            FileType::Other(extension) => extension,
        }
    }

    pub fn is_reserved(&self) -> bool {
        !matches!(self, FileType::Other(_))
    }

    /// The provenance of metadata embedded by this format, if it is native.
    pub fn metadata_source(&self) -> Option<DataSource> {
        match self {
            FileType::Epub => Some(DataSource::EpubMetadata),
            FileType::Cbz => Some(DataSource::CbzMetadata),
            FileType::M4b => Some(DataSource::M4bMetadata),
            FileType::Other(_) => None,
        }
    }

    /// Comics are numbered in volumes, so trailing numbers in their names mean something.
    pub fn has_volumes(&self) -> bool {
        matches!(self, FileType::Cbz)
    }
}
impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}
