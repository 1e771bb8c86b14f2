//! Moving books to their canonical place on disk.
//!
//! Books are named `[Author One, Author Two] Title[ vN]`: a directory of that
//! name for books that have one, a file stem for books at a library root.
//! During a library walk this runs once every library has been walked (see
//! [`Scanner::scan_libraries`](crate::Scanner::scan_libraries)); a resync runs
//! it straight away when a title or author changes.

mod book;
pub mod error;

pub use self::book::{Action, organize_book};
