use crate::scan::controller::{ScanMode, ScanOutcome, Scanner};
use crate::scan::error::{ErrorKind, Result};
use exn::ResultExt;
use quire_catalog::models::BookId;
use tracing::{info, instrument, warn};

impl Scanner {
    /// Resync every file of a book.
    ///
    /// One file failing does not stop the others. A book with no files left is
    /// removed, and the loop stops as soon as a file deletion takes the book
    /// with it.
    #[instrument(skip(self))]
    pub(crate) async fn scan_book(&self, book_id: BookId, force: bool) -> Result<ScanOutcome> {
        let book = self.repo.retrieve_book(book_id).await.or_raise(|| ErrorKind::Catalog)?;
        if book.files.is_empty() {
            self.repo.delete_book(book_id).await.or_raise(|| ErrorKind::Catalog)?;
            if let Err(err) = self.index.remove_book(book_id).await {
                warn!(error = ?err, "could not remove book from search index");
            }
            info!("empty book deleted");
            return Ok(ScanOutcome::BookDeleted { book_id, file_id: None });
        }

        let mut files = 0;
        for file_id in book.files.iter().map(|f| f.id) {
            match self.scan_file(file_id, ScanMode::Resync, force).await {
                Ok(outcome @ ScanOutcome::BookDeleted { .. }) => return Ok(outcome),
                Ok(_) => files += 1,
                Err(err) => warn!(file_id, error = ?err, "could not resync file; continuing with the rest of the book"),
            }
        }
        Ok(ScanOutcome::BookResynced { book_id, files })
    }
}
