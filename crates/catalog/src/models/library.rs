use super::{LibraryId, timestamp};
use crate::error::Result;
use std::path::PathBuf;
use time::UtcDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    /// Whether files should be renamed into the canonical layout.
    pub organize_file_structure: bool,
    pub paths: Vec<PathBuf>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct LibraryRow {
    pub id: i64,
    pub name: String,
    pub organize_file_structure: bool,
    pub created_at: i64,
    pub updated_at: i64,
}
impl LibraryRow {
    pub fn into_model(self, paths: Vec<PathBuf>) -> Result<Library> {
        Ok(Library {
            id: self.id,
            name: self.name,
            organize_file_structure: self.organize_file_structure,
            paths,
            created_at: timestamp(self.created_at)?,
            updated_at: timestamp(self.updated_at)?,
        })
    }
}
