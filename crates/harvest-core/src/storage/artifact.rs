//! Partial artifact: the temp file a single task streams into.

use crate::checksum::HashingWriter;
use crate::error::TaskError;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{TEMP_PREFIX, TEMP_SUFFIX};

const WRITE_BUFFER: usize = 64 * 1024;

/// A fully written and promoted body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persisted {
    pub destination: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

/// Temp file owned by one task while its body streams in.
///
/// Dropping an artifact that was never promoted deletes the temp file, so
/// every failure path (fetch error, timeout, write error, panic) cleans up
/// the same way.
pub struct PartialArtifact {
    writer: HashingWriter<BufWriter<NamedTempFile>>,
    temp_path: PathBuf,
}

impl PartialArtifact {
    /// Create a fresh temp file in `temp_dir`, which must be on the same
    /// filesystem as the destination.
    pub fn create(temp_dir: &Path) -> Result<Self, TaskError> {
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(temp_dir)
            .map_err(|e| {
                TaskError::storage(format!("create temp file in {}", temp_dir.display()), e)
            })?;
        let temp_path = file.path().to_path_buf();
        Ok(Self {
            writer: HashingWriter::new(BufWriter::with_capacity(WRITE_BUFFER, file)),
            temp_path,
        })
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn bytes_written(&self) -> u64 {
        self.writer.bytes_written()
    }

    /// Flush, sync and atomically rename into `destination`.
    ///
    /// With `overwrite == false` an existing destination is a collision and
    /// is left untouched. On any error the temp file is removed.
    pub fn promote(self, destination: &Path, overwrite: bool) -> Result<Persisted, TaskError> {
        let (buffered, bytes, sha256) = self.writer.finish();
        let file = buffered
            .into_inner()
            .map_err(|e| TaskError::storage("flush temp file", e.into_error()))?;
        file.as_file()
            .sync_all()
            .map_err(|e| TaskError::storage("sync temp file", e))?;

        let persisted = if overwrite {
            file.persist(destination)
        } else {
            file.persist_noclobber(destination)
        };
        persisted.map_err(|e| {
            TaskError::storage(format!("promote to {}", destination.display()), e.error)
        })?;

        Ok(Persisted {
            destination: destination.to_path_buf(),
            bytes,
            sha256,
        })
    }
}

impl Write for PartialArtifact {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promote_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join(".tmp");
        std::fs::create_dir(&tmp).unwrap();
        let dest = dir.path().join("a.jpg");

        let mut artifact = PartialArtifact::create(&tmp).unwrap();
        let temp_path = artifact.temp_path().to_path_buf();
        artifact.write_all(b"hello\n").unwrap();
        assert!(temp_path.exists());
        assert!(!dest.exists());

        let p = artifact.promote(&dest, false).unwrap();
        assert_eq!(p.bytes, 6);
        assert_eq!(
            p.sha256,
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
        assert!(!temp_path.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello\n");
    }

    #[test]
    fn drop_without_promote_deletes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifact = PartialArtifact::create(dir.path()).unwrap();
        let temp_path = artifact.temp_path().to_path_buf();
        artifact.write_all(&[0u8; 1000]).unwrap();
        drop(artifact);
        assert!(!temp_path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn collision_without_overwrite_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.jpg");
        std::fs::write(&dest, b"original").unwrap();

        let mut artifact = PartialArtifact::create(dir.path()).unwrap();
        let temp_path = artifact.temp_path().to_path_buf();
        artifact.write_all(b"new body").unwrap();
        let err = artifact.promote(&dest, false).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Storage);
        assert_eq!(std::fs::read(&dest).unwrap(), b"original");
        assert!(!temp_path.exists());
    }

    #[test]
    fn overwrite_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.jpg");
        std::fs::write(&dest, b"original").unwrap();

        let mut artifact = PartialArtifact::create(dir.path()).unwrap();
        artifact.write_all(b"new body").unwrap();
        artifact.promote(&dest, true).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"new body");
    }
}
