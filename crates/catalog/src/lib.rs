//! Persistent catalog of libraries, books, files and the shared entities
//! (people, series, genres, tags, publishers, imprints) around them.
//!
//! Every mutable field that can come from more than one place is stored
//! alongside a `*_source` column holding the [`DataSource`](quire_metadata::DataSource)
//! of its current value. The repository writes a value and its source in the
//! same statement; relationship sets are replaced wholesale in a single
//! transaction together with their owner's source column.

mod db;
pub mod error;
pub mod models;
mod repo;

pub use crate::db::Database;
pub use crate::repo::{LibraryCounts, Repository};
