use super::{EntityId, LibraryId, PersonId, SeriesId, source};
use quire_metadata::DataSource;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Person {
    pub id: PersonId,
    pub library_id: LibraryId,
    pub name: String,
    pub sort_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Series {
    pub id: SeriesId,
    pub library_id: LibraryId,
    pub name: String,
    /// Provenance of the series itself, independent of any book in it.
    pub name_source: DataSource,
    pub sort_name: String,
}

/// Shared entities that are nothing more than a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Genre,
    Tag,
    Publisher,
    Imprint,
}
impl EntityKind {
    pub(crate) fn table(&self) -> &'static str {
        match self {
            EntityKind::Genre => "genres",
            EntityKind::Tag => "tags",
            EntityKind::Publisher => "publishers",
            EntityKind::Imprint => "imprints",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedEntity {
    pub id: EntityId,
    pub library_id: LibraryId,
    pub kind: EntityKind,
    pub name: String,
}

#[derive(sqlx::FromRow)]
pub(crate) struct PersonRow {
    pub id: i64,
    pub library_id: i64,
    pub name: String,
    pub sort_name: String,
}
impl From<PersonRow> for Person {
    fn from(row: PersonRow) -> Self {
        Self { id: row.id, library_id: row.library_id, name: row.name, sort_name: row.sort_name }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SeriesRow {
    pub id: i64,
    pub library_id: i64,
    pub name: String,
    pub name_source: String,
    pub sort_name: String,
}
impl From<SeriesRow> for Series {
    fn from(row: SeriesRow) -> Self {
        Self {
            id: row.id,
            library_id: row.library_id,
            name: row.name,
            name_source: source(Some(row.name_source)),
            sort_name: row.sort_name,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct NamedRow {
    pub id: i64,
    pub library_id: i64,
    pub name: String,
}
impl NamedRow {
    pub fn into_model(self, kind: EntityKind) -> NamedEntity {
        NamedEntity { id: self.id, library_id: self.library_id, kind, name: self.name }
    }
}
