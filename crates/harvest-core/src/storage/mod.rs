//! Output root and temp namespace lifecycle.
//!
//! Bodies stream into partial artifacts under `<root>/.tmp/<batch>/` and are
//! renamed into `<root>/<name>` only once complete, so a destination path is
//! either absent or whole. Each batch owns its own scratch directory; batches
//! sharing an output root never touch each other's artifacts.

mod artifact;

pub use artifact::{PartialArtifact, Persisted};

use crate::error::SetupError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Directory under the output root that holds per-batch scratch directories.
pub const TEMP_DIR_NAME: &str = ".tmp";
/// Prefix of a batch scratch directory inside `.tmp`.
pub const BATCH_DIR_PREFIX: &str = "batch-";
pub(crate) const TEMP_PREFIX: &str = "harvest-";
/// Suffix of partial artifacts.
pub const TEMP_SUFFIX: &str = ".part";
/// Scratch directories untouched for this long belong to a dead run.
pub const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

const CREATE_ATTEMPTS: usize = 3;

/// `<root>/.tmp`.
pub fn temp_dir(root: &Path) -> PathBuf {
    root.join(TEMP_DIR_NAME)
}

/// Scratch directory owned by one batch. Dropping it removes the directory
/// and anything left inside.
#[derive(Debug)]
pub struct BatchTempDir {
    dir: TempDir,
    root: PathBuf,
}

impl BatchTempDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes this batch's scratch directory, then `.tmp` itself if no
    /// other batch is still using it.
    pub fn close(self) {
        let BatchTempDir { dir, root } = self;
        let path = dir.path().to_path_buf();
        if let Err(e) = dir.close() {
            tracing::warn!(dir = %path.display(), "could not remove batch temp dir: {}", e);
        }
        remove_temp_dir_if_unused(&root);
    }
}

/// Creates the output root, the shared `.tmp` namespace and a fresh scratch
/// directory for this batch, proving all are writable. Scratch directories
/// abandoned by crashed runs (older than `STALE_AFTER`) are removed.
pub fn prepare_output_root(root: &Path) -> Result<BatchTempDir, SetupError> {
    let setup_err = |source: io::Error| SetupError::OutputRoot {
        path: root.to_path_buf(),
        source,
    };

    fs::create_dir_all(root).map_err(setup_err)?;
    let tmp = temp_dir(root);

    let swept = match sweep_stale_batches(&tmp, STALE_AFTER) {
        Ok(n) => n,
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => return Err(setup_err(e)),
    };
    if swept > 0 {
        tracing::info!(count = swept, dir = %tmp.display(), "removed stale batch temp dirs");
    }

    let dir = create_batch_dir(&tmp).map_err(setup_err)?;
    let probe = tempfile::Builder::new()
        .prefix(".probe-")
        .tempfile_in(dir.path())
        .map_err(setup_err)?;
    drop(probe);

    Ok(BatchTempDir {
        dir,
        root: root.to_path_buf(),
    })
}

/// A sibling batch may remove an empty `.tmp` between our create and our
/// mkdir, so a vanished parent is retried.
fn create_batch_dir(tmp: &Path) -> io::Result<TempDir> {
    let mut last = None;
    for _ in 0..CREATE_ATTEMPTS {
        fs::create_dir_all(tmp)?;
        match tempfile::Builder::new().prefix(BATCH_DIR_PREFIX).tempdir_in(tmp) {
            Ok(dir) => return Ok(dir),
            Err(e) if e.kind() == io::ErrorKind::NotFound => last = Some(e),
            Err(e) => return Err(e),
        }
    }
    Err(last.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotFound)))
}

/// Removes batch directories whose newest entry is older than `max_age`.
fn sweep_stale_batches(tmp: &Path, max_age: Duration) -> io::Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in fs::read_dir(tmp)? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(BATCH_DIR_PREFIX) || !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        let newest = newest_mtime(&path)?;
        let age = now.duration_since(newest).unwrap_or(Duration::ZERO);
        if age >= max_age {
            match fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
    }
    Ok(removed)
}

fn newest_mtime(dir: &Path) -> io::Result<SystemTime> {
    let mut newest = fs::metadata(dir)?.modified()?;
    for entry in fs::read_dir(dir)? {
        let modified = entry?.metadata()?.modified()?;
        newest = newest.max(modified);
    }
    Ok(newest)
}

/// Removes `.tmp` when it is empty. A non-empty namespace means another
/// batch is still running (or left something unrelated) and is kept.
fn remove_temp_dir_if_unused(root: &Path) {
    let tmp = temp_dir(root);
    let in_use = match fs::read_dir(&tmp) {
        Ok(mut entries) => entries.next().is_some(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => {
            tracing::warn!(dir = %tmp.display(), "could not inspect temp dir: {}", e);
            return;
        }
    };
    if in_use {
        tracing::debug!(dir = %tmp.display(), "temp dir still in use; kept");
        return;
    }
    match fs::remove_dir(&tmp) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        // A sibling batch created its scratch dir in the meantime.
        Err(_) if tmp.read_dir().map(|mut d| d.next().is_some()).unwrap_or(false) => {}
        Err(e) => tracing::warn!(dir = %tmp.display(), "could not remove temp dir: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_creates_root_and_batch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("downloads/nested");
        let batch = prepare_output_root(&root).unwrap();
        assert_eq!(batch.path().parent(), Some(temp_dir(&root).as_path()));
        assert!(batch.path().is_dir());
        assert_eq!(fs::read_dir(batch.path()).unwrap().count(), 0, "probe must not linger");
    }

    #[test]
    fn prepare_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("not-a-dir");
        fs::write(&root, b"x").unwrap();
        let err = prepare_output_root(&root).unwrap_err();
        assert!(matches!(err, SetupError::OutputRoot { .. }));
    }

    #[test]
    fn concurrent_batches_get_separate_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let first = prepare_output_root(dir.path()).unwrap();
        fs::write(first.path().join("harvest-live.part"), b"in flight").unwrap();

        let second = prepare_output_root(dir.path()).unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first.path().join("harvest-live.part").exists());

        second.close();
        assert!(temp_dir(dir.path()).is_dir(), "first batch still needs .tmp");
        assert!(first.path().join("harvest-live.part").exists());

        first.close();
        assert!(!temp_dir(dir.path()).exists());
    }

    #[test]
    fn sweep_removes_only_old_batch_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = temp_dir(dir.path());
        fs::create_dir_all(tmp.join("batch-dead")).unwrap();
        fs::write(tmp.join("batch-dead/harvest-x.part"), b"partial").unwrap();
        fs::write(tmp.join("keep.txt"), b"unrelated").unwrap();

        assert_eq!(sweep_stale_batches(&tmp, STALE_AFTER).unwrap(), 0);
        assert!(tmp.join("batch-dead").exists());

        assert_eq!(sweep_stale_batches(&tmp, Duration::ZERO).unwrap(), 1);
        assert!(!tmp.join("batch-dead").exists());
        assert!(tmp.join("keep.txt").exists());
    }

    #[test]
    fn close_keeps_namespace_with_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let batch = prepare_output_root(dir.path()).unwrap();
        fs::write(temp_dir(dir.path()).join("keep.txt"), b"x").unwrap();
        batch.close();
        assert!(temp_dir(dir.path()).join("keep.txt").exists());
    }

    #[test]
    fn close_removes_empty_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let batch = prepare_output_root(dir.path()).unwrap();
        let path = batch.path().to_path_buf();
        batch.close();
        assert!(!path.exists());
        assert!(!temp_dir(dir.path()).exists());
    }
}
