//! Keeping the catalog in step with the files on disk.
//!
//! [`Scanner::scan`] handles a single path, file or book;
//! [`Scanner::scan_libraries`] walks whole libraries. Both decide field by
//! field which source wins using [`quire_metadata::merge`], and resolve shared
//! entities through the scanner's [`EntityCache`](crate::EntityCache).

mod book;
mod controller;
mod create;
pub(crate) mod error;
mod file;
mod path;
mod stream;
mod update;

#[cfg(test)]
mod tests;

pub use self::controller::{ScanMode, ScanOptions, ScanOutcome, ScanTarget, Scanner};
pub use self::stream::{ScanEvent, ScanSummary};
