use crate::scan::controller::{ScanMode, ScanOutcome, Scanner};
use crate::scan::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::Path;
use tracing::{debug, instrument};

impl Scanner {
    /// Scan a path found by discovery (or named by a caller).
    ///
    /// Known paths are resynced in discovery mode; a path that vanished before
    /// it was reached is skipped rather than reported.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub(crate) async fn scan_path(&self, path: &Path, force: bool) -> Result<ScanOutcome> {
        if let Some(file) = self.repo.find_file_by_path(path).await.or_raise(|| ErrorKind::Catalog)? {
            return self.scan_file(file.id, ScanMode::Discovery, force).await;
        }
        let Some(info) = self.mounts.stat(path).await.or_raise(|| ErrorKind::Storage)? else {
            debug!("path disappeared before it was scanned");
            return Ok(ScanOutcome::Skipped(path.to_path_buf()));
        };
        let mount = self.mounts.locate(path).or_raise(|| ErrorKind::Storage)?;
        self.create_file(mount.library_id, &mount.root, path, info.size, force).await
    }
}
