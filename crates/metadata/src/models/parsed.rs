use super::{Chapter, Cover, Field, FieldDataSources, Identifier, non_blank};
use crate::source::DataSource;
use time::Date;

/// A person credited on a book, with an optional role (`writer`, `penciller`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedAuthor {
    pub name: String,
    pub role: Option<String>,
}
impl ParsedAuthor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), role: None }
    }
    pub fn with_role(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self { name: name.into(), role: Some(role.into()) }
    }
}

/// Normalized output of any metadata producer.
///
/// Transient: built fresh for each scan attempt and consumed by the merge
/// engine, never stored as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMetadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub authors: Vec<ParsedAuthor>,
    pub narrators: Vec<String>,
    pub series: Option<String>,
    pub series_number: Option<f64>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub publisher: Option<String>,
    pub imprint: Option<String>,
    pub url: Option<String>,
    pub release_date: Option<Date>,
    pub identifiers: Vec<Identifier>,
    pub chapters: Vec<Chapter>,
    pub cover: Option<Cover>,
    /// Length of the audio, in seconds.
    pub duration: Option<f64>,
    /// Audio bitrate, in bits per second.
    pub bitrate: Option<u32>,
    pub page_count: Option<u32>,
    /// Source of every field not listed in `field_sources`.
    pub data_source: DataSource,
    pub field_sources: FieldDataSources,
}

impl ParsedMetadata {
    pub fn new(data_source: DataSource) -> Self {
        Self { data_source, ..Default::default() }
    }

    /// The source that supplied `field`.
    pub fn source_for(&self, field: Field) -> &DataSource {
        self.field_sources.get(field).unwrap_or(&self.data_source)
    }

    pub fn title(&self) -> Option<&str> {
        non_blank(&self.title)
    }

    pub fn series(&self) -> Option<&str> {
        non_blank(&self.series)
    }

    /// Author names in credit order, without blanks.
    pub fn author_names(&self) -> Vec<&str> {
        self.authors.iter().map(|a| a.name.trim()).filter(|n| !n.is_empty()).collect()
    }

    /// Whether this metadata has a non-empty value for `field`.
    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::Title => non_blank(&self.title).is_some(),
            Field::Subtitle => non_blank(&self.subtitle).is_some(),
            Field::Description => non_blank(&self.description).is_some(),
            Field::Authors => !self.authors.is_empty(),
            Field::Narrators => !self.narrators.is_empty(),
            Field::Series => non_blank(&self.series).is_some(),
            Field::Genres => !self.genres.is_empty(),
            Field::Tags => !self.tags.is_empty(),
            Field::Publisher => non_blank(&self.publisher).is_some(),
            Field::Imprint => non_blank(&self.imprint).is_some(),
            Field::Url => non_blank(&self.url).is_some(),
            Field::ReleaseDate => self.release_date.is_some(),
            Field::Identifiers => !self.identifiers.is_empty(),
            Field::Chapters => !self.chapters.is_empty(),
        }
    }
}
