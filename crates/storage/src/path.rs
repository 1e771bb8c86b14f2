//! Path validation.
//!
//! Backends only accept paths relative to their root. The catalog stores
//! absolute paths, so [`relative_to`] is the bridge between the two.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage path, resolving `.` and `..` without ever leaving the
/// storage root.
///
/// Null bytes and platform prefixes are rejected, as is anything that
/// resolves to the root itself.
///
/// ```
/// use std::path::Path;
/// use quire_storage::validate_path;
/// assert!(validate_path("Frank Herbert/Dune.epub").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert_eq!(
///     validate_path("a/../Comics/./Saga v1.cbz/").unwrap(),
///     Path::new("Comics/Saga v1.cbz")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes survive Path::components() on Unix but truncate in syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
    }
    Ok(components.into_iter().collect())
}

/// The validated path of `absolute` relative to `root`.
pub fn relative_to(root: &Path, absolute: &Path) -> Result<PathBuf> {
    match absolute.strip_prefix(root) {
        Ok(relative) => validate(relative),
        Err(_) => exn::bail!(ErrorKind::InvalidPath(absolute.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate("Author/Book/book.epub").unwrap(), Path::new("Author/Book/book.epub"));
        assert_eq!(validate("book.m4b").unwrap(), Path::new("book.m4b"));
        assert_eq!(validate("Comics//Saga/./v1.cbz/").unwrap(), Path::new("Comics/Saga/v1.cbz"));
        assert_eq!(validate("a/b/..").unwrap(), Path::new("a"));
    }

    #[test]
    fn test_escaping_root_rejected() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("..").is_err());
    }

    #[test]
    fn test_empty_and_null_rejected() {
        for path in ["", ".", "./", "//", "a\0b"] {
            assert!(validate(path).is_err(), "{path:?} should be rejected");
        }
    }

    #[test]
    fn test_relative_to() {
        let root = Path::new("/media/books");
        assert_eq!(
            relative_to(root, Path::new("/media/books/Dune/Dune.epub")).unwrap(),
            Path::new("Dune/Dune.epub")
        );
        assert!(relative_to(root, Path::new("/media/comics/x.cbz")).is_err());
        assert!(relative_to(root, root).is_err());
    }
}
