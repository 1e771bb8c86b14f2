use crate::cover::{cover_owner, moved_cover_path};
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::organize::error::{ErrorKind as OrganizeErrorKind, Result as OrganizeResult};
use crate::scan::Scanner;
use exn::{OptionExt, ResultExt};
use quire_catalog::models::{Book, BookField, BookId, File, FileField, FileRole};
use quire_metadata::FileType;
use quire_metadata::filename::{canonical_file_name, canonical_stem};
use quire_metadata::sidecar::{book_sidecar_path, file_sidecar_path};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Give up looking for a free name after this many numbered candidates.
const MAX_NAME_ATTEMPTS: usize = 100;

/// The outcome of (successfully) organizing a single book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The book's files were moved; `from` and `to` are its old and new keys.
    Renamed { from: PathBuf, to: PathBuf },
    /// Everything was already where it belongs.
    AlreadyCorrect(PathBuf),
    /// The book's library does not organize its files.
    Skipped(PathBuf),
}

/// Every move needed to put one book in its canonical place.
#[derive(Debug, Default)]
struct Plan {
    key: PathBuf,
    moves: BTreeMap<PathBuf, PathBuf>,
}

impl Plan {
    fn new(key: PathBuf) -> Self {
        Self { key, moves: BTreeMap::new() }
    }

    fn insert(&mut self, from: PathBuf, to: PathBuf) {
        if from != to {
            self.moves.insert(from, to);
        }
    }

    /// Carry the sidecar and cover artifacts of `from` along to `to`.
    fn follow(&mut self, on_disk: &HashSet<PathBuf>, from: &Path, to: &Path) {
        let sidecar = file_sidecar_path(from);
        if on_disk.contains(&sidecar) {
            self.insert(sidecar, file_sidecar_path(to));
        }
        for path in on_disk {
            if cover_owner(path).is_some_and(|owner| owner == from) {
                self.insert(path.clone(), moved_cover_path(path, to));
            }
        }
    }

    fn target(&self, path: &Path) -> PathBuf {
        self.moves.get(path).cloned().unwrap_or_else(|| path.to_path_buf())
    }
}

fn numbered(stem: &str, attempt: usize) -> String {
    if attempt == 1 { stem.to_string() } else { format!("{stem} ({attempt})") }
}

fn extension_of(path: &Path) -> String {
    path.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Narrators only appear in audiobook file names.
fn file_name_for(file: &File, stem: &str) -> String {
    let narrators = if file.file_type == FileType::M4b { file.narrator_names() } else { Vec::new() };
    canonical_file_name(stem, &narrators, &extension_of(&file.filepath))
}

/// The canonical `[Authors] Title[ vN]` stem for a book.
pub(crate) fn book_stem(book: &Book) -> String {
    let volume = book
        .main_files()
        .any(|f| f.file_type.has_volumes())
        .then(|| book.series.first().and_then(|s| s.number))
        .flatten();
    canonical_stem(&book.author_names(), &book.title, volume)
}

/// Move a book's files to their canonical names.
///
/// Directory books get a directory named after the book, with each main file
/// named after it too; everything else in the directory keeps its relative
/// place. Root-level books rename their main files in place, along with any
/// supplements sharing their stem. Covers and sidecars always travel with
/// their file, and each file's row is updated as soon as it has moved.
///
/// # Errors
/// Returns [`Exn<LibraryErrorKind::Organize>`](LibraryErrorKind::Organize)
/// raised from an inner [`Exn<OrganizeErrorKind>`](OrganizeErrorKind).
pub async fn organize_book(scanner: &Scanner, book_id: BookId) -> LibraryResult<Action> {
    organize_book_inner(scanner, book_id).await.or_raise(|| LibraryErrorKind::Organize)
}

#[instrument(skip(scanner))]
async fn organize_book_inner(scanner: &Scanner, book_id: BookId) -> OrganizeResult<Action> {
    let _guard = scanner.cache.lock_book(book_id).await;
    let book = scanner.repo.retrieve_book(book_id).await.or_raise(|| OrganizeErrorKind::Catalog)?;
    let library = scanner.repo.retrieve_library(book.library_id).await.or_raise(|| OrganizeErrorKind::Catalog)?;
    if !library.organize_file_structure {
        return Ok(Action::Skipped(book.filepath));
    }

    let stem = book_stem(&book);
    let plan = if book.is_directory {
        plan_directory(scanner, &book, &stem).await?
    } else {
        plan_root_level(scanner, &book, &stem).await?
    };
    if plan.moves.is_empty() && plan.key == book.filepath {
        debug!("book already organized");
        return Ok(Action::AlreadyCorrect(book.filepath));
    }
    execute(scanner, &book, plan).await
}

/// Whether `candidate` is free for a file currently at `current`.
async fn is_free(scanner: &Scanner, plan: &Plan, candidate: &Path, current: &Path) -> OrganizeResult<bool> {
    if candidate == current {
        return Ok(true);
    }
    if plan.moves.values().any(|taken| taken == candidate) {
        return Ok(false);
    }
    let exists = scanner.mounts.exists(candidate).await.or_raise(|| OrganizeErrorKind::Storage)?;
    Ok(!exists)
}

/// The first free path in `dir` for `file`, numbering the stem on collisions.
async fn free_file_path(scanner: &Scanner, plan: &Plan, dir: &Path, file: &File, stem: &str) -> OrganizeResult<PathBuf> {
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let candidate = dir.join(file_name_for(file, &numbered(stem, attempt)));
        if is_free(scanner, plan, &candidate, &file.filepath).await? {
            return Ok(candidate);
        }
    }
    exn::bail!(OrganizeErrorKind::Conflict(file_name_for(file, stem)))
}

/// Whether `path`, found under `book`'s directory, belongs to another book:
/// either it is cataloged for one or it sits below another book's directory.
async fn owned_elsewhere(
    scanner: &Scanner,
    book: &Book,
    path: &Path,
    other_keys: &mut HashMap<PathBuf, bool>,
) -> OrganizeResult<bool> {
    if let Some(file) = scanner.repo.find_file_by_path(path).await.or_raise(|| OrganizeErrorKind::Catalog)? {
        return Ok(file.book_id != book.id);
    }
    for dir in path.ancestors().skip(1) {
        if dir == book.filepath || !dir.starts_with(&book.filepath) {
            break;
        }
        let other = match other_keys.get(dir) {
            Some(other) => *other,
            None => {
                let found = scanner
                    .repo
                    .find_book_by_path(book.library_id, dir)
                    .await
                    .or_raise(|| OrganizeErrorKind::Catalog)?;
                let other = found.is_some_and(|b| b.id != book.id);
                other_keys.insert(dir.to_path_buf(), other);
                other
            },
        };
        if other {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn plan_directory(scanner: &Scanner, book: &Book, stem: &str) -> OrganizeResult<Plan> {
    let old_dir = &book.filepath;
    let parent = old_dir.parent().unwrap_or(old_dir);
    let mut new_dir = None;
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let candidate = parent.join(numbered(stem, attempt));
        if &candidate == old_dir || !scanner.mounts.exists(&candidate).await.or_raise(|| OrganizeErrorKind::Storage)? {
            new_dir = Some(candidate);
            break;
        }
    }
    let new_dir = new_dir.ok_or_raise(|| OrganizeErrorKind::Conflict(stem.to_string()))?;

    let on_disk: HashSet<PathBuf> = scanner
        .mounts
        .files_under(old_dir)
        .await
        .or_raise(|| OrganizeErrorKind::Storage)?
        .into_iter()
        .map(|f| f.path)
        .collect();
    let mut plan = Plan::new(new_dir.clone());

    let old_sidecar = book_sidecar_path(old_dir, true);
    if on_disk.contains(&old_sidecar) {
        plan.insert(old_sidecar, book_sidecar_path(&new_dir, true));
    }
    let mut mains: Vec<&File> = book.main_files().collect();
    mains.sort_by_key(|f| f.id);
    for file in mains {
        // Main files nested below the book directory keep their relative place.
        let target_dir = match file.filepath.parent() {
            Some(dir) if dir == old_dir => new_dir.clone(),
            _ => continue,
        };
        let to = free_file_path(scanner, &plan, &target_dir, file, stem).await?;
        plan.follow(&on_disk, &file.filepath, &to);
        plan.insert(file.filepath.clone(), to);
    }
    // Books nested below this one stay where they are.
    let mut other_keys = HashMap::new();
    for path in &on_disk {
        if plan.moves.contains_key(path) || owned_elsewhere(scanner, book, path, &mut other_keys).await? {
            continue;
        }
        if let Ok(relative) = path.strip_prefix(old_dir) {
            plan.insert(path.clone(), new_dir.join(relative));
        }
    }
    Ok(plan)
}

async fn plan_root_level(scanner: &Scanner, book: &Book, stem: &str) -> OrganizeResult<Plan> {
    let root = book.filepath.parent().unwrap_or(&book.filepath).to_path_buf();
    let on_disk: HashSet<PathBuf> = scanner
        .mounts
        .children(&root)
        .await
        .or_raise(|| OrganizeErrorKind::Storage)?
        .into_iter()
        .filter(|e| e.is_file())
        .map(|e| e.path)
        .collect();
    let new_key = root.join(stem);
    let mut plan = Plan::new(new_key.clone());

    let old_sidecar = book_sidecar_path(&book.filepath, false);
    if on_disk.contains(&old_sidecar) {
        plan.insert(old_sidecar, book_sidecar_path(&new_key, false));
    }
    let mut mains: Vec<&File> = book.main_files().collect();
    mains.sort_by_key(|f| f.id);
    let mut stems = BTreeMap::new();
    for file in mains {
        let to = free_file_path(scanner, &plan, &root, file, stem).await?;
        if let (Some(old), Some(new)) = (file.filepath.file_stem(), to.file_stem()) {
            stems.entry(old.to_os_string()).or_insert_with(|| new.to_os_string());
        }
        plan.follow(&on_disk, &file.filepath, &to);
        plan.insert(file.filepath.clone(), to);
    }
    for file in book.files.iter().filter(|f| f.role == FileRole::Supplement) {
        let Some(new_stem) = file.filepath.file_stem().and_then(|s| stems.get(s)) else {
            continue;
        };
        let mut name = new_stem.clone();
        if let Some(extension) = file.filepath.extension() {
            name.push(".");
            name.push(extension);
        }
        let to = root.join(name);
        if !is_free(scanner, &plan, &to, &file.filepath).await? {
            warn!(path = %file.filepath.display(), "supplement target is taken; leaving it in place");
            continue;
        }
        plan.follow(&on_disk, &file.filepath, &to);
        plan.insert(file.filepath.clone(), to);
    }
    Ok(plan)
}

async fn rename(scanner: &Scanner, from: &Path, to: &Path) -> OrganizeResult<()> {
    scanner.mounts.rename(from, to).await.or_raise(|| OrganizeErrorKind::Storage)?;
    debug!(from = %from.display(), to = %to.display(), "moved");
    Ok(())
}

async fn execute(scanner: &Scanner, book: &Book, mut plan: Plan) -> OrganizeResult<Action> {
    for file in &book.files {
        let to = plan.target(&file.filepath);
        let cover_to = file.cover.as_ref().map(|c| (c.path.clone(), plan.target(&c.path)));
        if to == file.filepath && cover_to.as_ref().is_none_or(|(from, to)| from == to) {
            continue;
        }
        if let Some(to) = plan.moves.remove(&file.filepath) {
            rename(scanner, &file.filepath, &to).await?;
        }
        let mut moved = file.clone();
        moved.filepath = to;
        if let (Some(cover), Some((from, to))) = (moved.cover.as_mut(), cover_to) {
            if let Some(to) = plan.moves.remove(&from) {
                rename(scanner, &from, &to).await?;
            }
            cover.path = to;
        }
        scanner
            .repo
            .update_file(&moved, &[FileField::Location, FileField::Cover])
            .await
            .or_raise(|| OrganizeErrorKind::Catalog)?;
    }
    for (from, to) in &plan.moves {
        rename(scanner, from, to).await?;
    }

    let mut moved = book.clone();
    moved.filepath = plan.key.clone();
    scanner.repo.update_book(&moved, &[BookField::Location]).await.or_raise(|| OrganizeErrorKind::Catalog)?;
    if book.is_directory
        && plan.key != book.filepath
        && let Err(err) = scanner.mounts.remove_dir(&book.filepath).await
    {
        debug!(path = %book.filepath.display(), error = ?err, "old book directory left in place");
    }
    info!(from = %book.filepath.display(), to = %plan.key.display(), "book organized");
    Ok(Action::Renamed { from: book.filepath.clone(), to: plan.key })
}
