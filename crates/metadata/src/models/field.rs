use crate::source::DataSource;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Fields whose provenance is tracked individually.
///
/// Technical fields (duration, bitrate, page count, cover) are absent: they
/// only ever come from the format parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Title,
    Subtitle,
    Description,
    Authors,
    Narrators,
    /// Series name and number travel together.
    Series,
    Genres,
    Tags,
    Publisher,
    Imprint,
    Url,
    ReleaseDate,
    Identifiers,
    Chapters,
}
impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Subtitle => "subtitle",
            Field::Description => "description",
            Field::Authors => "authors",
            Field::Narrators => "narrators",
            Field::Series => "series",
            Field::Genres => "genres",
            Field::Tags => "tags",
            Field::Publisher => "publisher",
            Field::Imprint => "imprint",
            Field::Url => "url",
            Field::ReleaseDate => "release_date",
            Field::Identifiers => "identifiers",
            Field::Chapters => "chapters",
        }
    }
}
impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Per-field record of which source supplied each value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDataSources(BTreeMap<Field, DataSource>);
impl FieldDataSources {
    pub fn get(&self, field: Field) -> Option<&DataSource> {
        self.0.get(&field)
    }
    pub fn insert(&mut self, field: Field, source: DataSource) {
        self.0.insert(field, source);
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (Field, &DataSource)> {
        self.0.iter().map(|(field, source)| (*field, source))
    }
}
