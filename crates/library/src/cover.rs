//! Cover artifacts: `<file name>.cover.<ext>` next to the media file.
//!
//! An artifact that is already on disk always wins over the embedded image
//! and is never overwritten.

use crate::error::Result;
use crate::mounts::Mounts;
use quire_catalog::models::CoverImage;
use quire_metadata::models::cover_extension;
use quire_metadata::{Cover, DataSource};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const COVER_INFIX: &str = ".cover.";
const COVER_TYPES: [(&str, &str); 4] =
    [("jpg", "image/jpeg"), ("png", "image/png"), ("webp", "image/webp"), ("gif", "image/gif")];

pub fn cover_path(file: &Path, extension: &str) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(COVER_INFIX);
    name.push(extension);
    PathBuf::from(name)
}

pub fn is_cover(path: &Path) -> bool {
    cover_owner(path).is_some()
}

/// The media file a cover artifact belongs to.
pub fn cover_owner(cover: &Path) -> Option<PathBuf> {
    let name = cover.file_name()?.to_string_lossy();
    COVER_TYPES
        .iter()
        .find_map(|(ext, _)| name.strip_suffix(&format!("{COVER_INFIX}{ext}")))
        .filter(|owner| !owner.is_empty())
        .map(|owner| cover.with_file_name(owner))
}

/// Where `cover` goes when its media file moves to `to`.
pub fn moved_cover_path(cover: &Path, to: &Path) -> PathBuf {
    let extension = cover.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_else(|| "jpg".to_string());
    cover_path(to, &extension)
}

/// An artifact already next to `file`, if any.
pub async fn find_existing(mounts: &Mounts, file: &Path) -> Result<Option<CoverImage>> {
    for (extension, mime_type) in COVER_TYPES {
        let path = cover_path(file, extension);
        if mounts.stat(&path).await?.is_some() {
            return Ok(Some(CoverImage {
                path,
                mime_type: mime_type.to_string(),
                source: DataSource::ExistingCover,
                page: None,
            }));
        }
    }
    Ok(None)
}

/// Write an embedded cover to `path` as-is.
pub async fn write(mounts: &Mounts, path: &Path, cover: &Cover) -> Result<()> {
    mounts.write(path, &cover.data).await?;
    info!(path = %path.display(), "cover extracted");
    Ok(())
}

/// The cover for `file`: an existing artifact, else the embedded image written
/// out with provenance `source`.
pub async fn extract(mounts: &Mounts, file: &Path, cover: Option<&Cover>, source: &DataSource) -> Result<Option<CoverImage>> {
    if let Some(existing) = find_existing(mounts, file).await? {
        debug!(path = %existing.path.display(), "keeping existing cover");
        return Ok(Some(existing));
    }
    let Some(cover) = cover.filter(|c| !c.data.is_empty()) else {
        return Ok(None);
    };
    let Some(mime_type) = cover.resolved_mime() else {
        debug!(file = %file.display(), "embedded cover has an unsupported image type");
        return Ok(None);
    };
    let Some(extension) = cover_extension(&mime_type) else {
        return Ok(None);
    };
    let path = cover_path(file, extension);
    write(mounts, &path, cover).await?;
    Ok(Some(CoverImage { path, mime_type, source: source.clone(), page: cover.page }))
}
