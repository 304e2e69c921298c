//! # Output Directory Locking
//!
//! Prevents two processes from writing artifacts into the same directory.
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on Windows).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Errors from output directory locking
#[derive(Debug, Error)]
pub enum LockError {
    /// Lock file could not be created
    #[error("Failed to create lock file: {0}")]
    CreateFailed(#[source] io::Error),

    /// Directory is already locked by another sink
    #[error("Output directory already in use ({})", path.display())]
    AlreadyLocked { path: PathBuf },

    /// Failed to write PID to lock file
    #[error("Failed to write PID to lock file: {0}")]
    WriteFailed(#[source] io::Error),
}

/// Exclusive lock on an output directory.
///
/// Acquired when the sink opens, released on drop (RAII).
#[derive(Debug)]
pub struct OutputDirLock {
    file: File,
    path: PathBuf,
}

impl OutputDirLock {
    /// Lock file name
    pub const LOCK_FILE: &'static str = "LOCK";

    /// Try once to take the lock on `dir`.
    pub fn acquire(dir: &Path) -> Result<Self, LockError> {
        let path = dir.join(Self::LOCK_FILE);

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(LockError::CreateFailed)?;

        if file.try_lock_exclusive().is_err() {
            return Err(LockError::AlreadyLocked { path });
        }

        let mut file = file;
        file.set_len(0).map_err(LockError::WriteFailed)?;
        writeln!(file, "{}", std::process::id()).map_err(LockError::WriteFailed)?;
        file.sync_all().map_err(LockError::WriteFailed)?;

        Ok(Self { file, path })
    }

    /// Path to the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OutputDirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
