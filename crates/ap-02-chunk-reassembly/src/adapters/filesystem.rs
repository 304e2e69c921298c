//! # Filesystem Artifact Sink
//!
//! Writes each artifact to a hidden temp file in the output directory,
//! fsyncs it, then renames it over the final name. A reader never sees a
//! partially written artifact under its final name.
//!
//! A write cancelled mid-flight (the engine wraps writes in a timeout) drops
//! its temp file through `TempFileGuard`. Anything a crash left behind is
//! swept when the directory is opened.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::lock::{LockError, OutputDirLock};
use crate::domain::errors::SinkError;
use crate::ports::outbound::ArtifactSink;

/// Artifact sink backed by a local directory.
///
/// Holds an exclusive `LOCK` on the directory for its whole lifetime.
#[derive(Debug)]
pub struct FileSystemSink {
    dir: PathBuf,
    _lock: OutputDirLock,
}

impl FileSystemSink {
    /// Create `dir` if needed, lock it and remove stale temp files.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, LockError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(LockError::CreateFailed)?;
        let lock = OutputDirLock::acquire(&dir)?;

        let swept = sweep_temp_files(&dir);
        if swept > 0 {
            warn!(dir = %dir.display(), swept, "Removed stale temp files from output directory");
        }

        Ok(Self { dir, _lock: lock })
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!(".{name}{TEMP_SUFFIX}"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final path for an artifact name.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, SinkError> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }
}

const TEMP_SUFFIX: &str = ".tmp";

/// Only called while holding the directory lock, so no live write owns them.
fn sweep_temp_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    entries
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
        })
        .filter(|entry| std::fs::remove_file(entry.path()).is_ok())
        .count()
}

/// Deletes the temp file on drop unless the write was committed.
struct TempFileGuard {
    path: PathBuf,
    committed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Names are single path components: no separators, no `..`, not empty,
/// and not the lock file.
fn validate_name(name: &str) -> Result<(), SinkError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name == OutputDirLock::LOCK_FILE;

    if bad {
        return Err(SinkError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ArtifactSink for FileSystemSink {
    async fn write(&self, name: &str, data: &[u8]) -> Result<(), SinkError> {
        let final_path = self.path_for(name)?;
        let temp_path = self.temp_path(name);
        let guard = TempFileGuard::new(temp_path.clone());

        let result = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&temp_path, &final_path).await
        }
        .await;

        match result {
            Ok(()) => guard.commit(),
            Err(e) => return Err(SinkError::Io(e.to_string())),
        }

        debug!(path = %final_path.display(), bytes = data.len(), "Artifact persisted");
        Ok(())
    }
}
