//! Search-index sink.
//!
//! Scans push every reloaded book here after its fields are written. Index
//! failures never fail a scan; the caller logs and moves on.

use crate::error::Result;
use async_trait::async_trait;
use quire_catalog::models::{Book, BookId};

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or refresh a book (with its files) in the index.
    async fn index_book(&self, book: &Book) -> Result<()>;
    async fn remove_book(&self, book_id: BookId) -> Result<()>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIndex;

#[async_trait]
impl SearchIndex for NoopIndex {
    async fn index_book(&self, _book: &Book) -> Result<()> {
        Ok(())
    }
    async fn remove_book(&self, _book_id: BookId) -> Result<()> {
        Ok(())
    }
}
