//! Reading and writing sidecar documents for catalog entities.
//!
//! Sidecars are best-effort in both directions: a missing or broken sidecar
//! reads as "no opinion" and a failed write is only logged by the caller.

use crate::error::{ErrorKind, Result};
use crate::mounts::Mounts;
use exn::ResultExt;
use quire_catalog::models::{Book, File};
use quire_metadata::sidecar::{
    BookSidecar, FileSidecar, Sidecar, SidecarAuthor, SidecarIdentifier, SidecarSeries, book_sidecar_path,
    file_sidecar_path, format_date,
};
use std::path::Path;
use tracing::{debug, warn};

async fn read<S: Sidecar>(mounts: &Mounts, path: &Path) -> Option<S> {
    match mounts.stat(path).await {
        Ok(Some(_)) => {},
        Ok(None) => return None,
        Err(err) => {
            warn!(path = %path.display(), error = ?err, "could not stat sidecar");
            return None;
        },
    }
    let bytes = match mounts.read(path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %path.display(), error = ?err, "could not read sidecar");
            return None;
        },
    };
    match S::from_json(&bytes) {
        Ok(sidecar) => Some(sidecar),
        Err(err) => {
            warn!(path = %path.display(), error = ?err, "ignoring unparseable sidecar");
            None
        },
    }
}

/// Write `sidecar` to `path` unless the same bytes are already there.
///
/// Returns whether anything was written.
async fn write<S: Sidecar>(mounts: &Mounts, path: &Path, sidecar: &S) -> Result<bool> {
    let bytes = sidecar.to_json().or_raise(|| ErrorKind::Storage)?;
    if mounts.stat(path).await?.is_some() && mounts.read(path).await? == bytes {
        return Ok(false);
    }
    mounts.write(path, &bytes).await?;
    debug!(path = %path.display(), "sidecar written");
    Ok(true)
}

pub async fn read_book(mounts: &Mounts, book: &Book) -> Option<BookSidecar> {
    read(mounts, &book_sidecar_path(&book.filepath, book.is_directory)).await
}

pub async fn read_file(mounts: &Mounts, file: &Path) -> Option<FileSidecar> {
    read(mounts, &file_sidecar_path(file)).await
}

pub async fn write_book(mounts: &Mounts, book: &Book) -> Result<bool> {
    write(mounts, &book_sidecar_path(&book.filepath, book.is_directory), &book_sidecar(book)).await
}

pub async fn write_file(mounts: &Mounts, file: &File) -> Result<bool> {
    write(mounts, &file_sidecar_path(&file.filepath), &file_sidecar(file)).await
}

/// The book as its sidecar document describes it.
pub fn book_sidecar(book: &Book) -> BookSidecar {
    BookSidecar {
        title: Some(book.title.clone()),
        subtitle: book.subtitle.clone(),
        description: book.description.clone(),
        authors: book
            .authors
            .iter()
            .map(|a| SidecarAuthor { name: a.person.name.clone(), role: a.role.clone() })
            .collect(),
        series: book
            .series
            .iter()
            .map(|s| SidecarSeries { name: s.series.name.clone(), number: s.number })
            .collect(),
        genres: book.genres.iter().map(|g| g.name.clone()).collect(),
        tags: book.tags.iter().map(|t| t.name.clone()).collect(),
        ..BookSidecar::default()
    }
}

pub fn file_sidecar(file: &File) -> FileSidecar {
    FileSidecar {
        name: file.name.clone(),
        url: file.url.clone(),
        release_date: file.release_date.and_then(format_date),
        publisher: file.publisher.as_ref().map(|p| p.name.clone()),
        imprint: file.imprint.as_ref().map(|i| i.name.clone()),
        narrators: file.narrators.iter().map(|n| n.name.clone()).collect(),
        identifiers: file
            .identifiers
            .iter()
            .map(|i| SidecarIdentifier { kind: i.kind.as_str().to_string(), value: i.value.clone() })
            .collect(),
        ..FileSidecar::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_storage::backend::MockBackend;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn mounts(files: &[(&str, &[u8])]) -> (Mounts, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::with_files(files.iter().map(|(p, d)| (*p, d.to_vec()))));
        let mut mounts = Mounts::new();
        mounts.mount(1, "/library", backend.clone());
        (mounts, backend)
    }

    #[tokio::test]
    async fn test_missing_and_invalid_read_as_none() {
        let (mounts, _) = mounts(&[("Dune/Dune.epub.metadata.json", b"{not json")]);
        assert!(read_file(&mounts, Path::new("/library/Dune/Dune.epub")).await.is_none());
        assert!(read_file(&mounts, Path::new("/library/Dune/Other.epub")).await.is_none());
    }

    #[tokio::test]
    async fn test_reads_file_sidecar() {
        let json = br#"{"version": 1, "publisher": "Ace", "narrators": ["Scott Brick"]}"#;
        let (mounts, _) = mounts(&[("Dune/Dune.m4b.metadata.json", json)]);
        let sidecar = read_file(&mounts, Path::new("/library/Dune/Dune.m4b")).await.unwrap();
        assert_eq!(sidecar.publisher.as_deref(), Some("Ace"));
        assert_eq!(sidecar.narrators, vec!["Scott Brick"]);
    }

    #[tokio::test]
    async fn test_write_skips_identical_bytes() {
        let (mounts, backend) = mounts(&[]);
        let path = PathBuf::from("/library/Dune/Dune.epub.metadata.json");
        let sidecar = FileSidecar { name: Some("Dune".into()), ..FileSidecar::default() };
        assert!(write(&mounts, &path, &sidecar).await.unwrap());
        assert!(!write(&mounts, &path, &sidecar).await.unwrap());
        assert_eq!(backend.paths().await, vec![PathBuf::from("Dune/Dune.epub.metadata.json")]);
        let back: FileSidecar = read(&mounts, &path).await.unwrap();
        assert_eq!(back, sidecar);
    }
}
