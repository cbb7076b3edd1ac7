//! Cross-process exclusion for updates.
//!
//! Only one update or rollback may touch an installation at a time. The lock
//! is an OS advisory lock on a hidden sibling file of the installation and is
//! released when the [`UpdateLock`] is dropped.
//!
//! A busy lock fails immediately instead of waiting: a second update started
//! while one is running would only repeat the same work.

use crate::core::SlashError;
use crate::update::installation::Installation;
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive lock over one installation.
///
/// The lock file itself is left on disk; removing it while another process
/// holds an open handle would let two processes lock different inodes.
#[derive(Debug)]
pub struct UpdateLock {
    /// The file handle - lock is released when this is dropped
    _file: File,
    lock_path: PathBuf,
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        debug!(lock_path = %self.lock_path.display(), "Update lock released");
    }
}

impl UpdateLock {
    /// Try to take the update lock for `installation`.
    ///
    /// # Errors
    ///
    /// - [`SlashError::ConcurrentUpdate`] if another process holds the lock
    /// - [`SlashError::FileSystem`] if the lock file cannot be opened
    pub async fn try_acquire(installation: &Installation) -> Result<Self, SlashError> {
        Self::try_acquire_at(installation.lock_path()).await
    }

    async fn try_acquire_at(lock_path: PathBuf) -> Result<Self, SlashError> {
        let path = lock_path.clone();
        tokio::task::spawn_blocking(move || Self::try_acquire_blocking(path))
            .await
            .map_err(|e| SlashError::Other {
                message: format!("lock task failed: {e}"),
            })?
            .inspect(|_| debug!(lock_path = %lock_path.display(), "Update lock acquired"))
    }

    fn try_acquire_blocking(lock_path: PathBuf) -> Result<Self, SlashError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| SlashError::fs("open lock file", &lock_path, e))?;

        match file.try_lock_exclusive() {
            Ok(true) => Ok(Self {
                _file: file,
                lock_path,
            }),
            Ok(false) => Err(SlashError::ConcurrentUpdate {
                lock_path: lock_path.display().to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(SlashError::ConcurrentUpdate {
                    lock_path: lock_path.display().to_string(),
                })
            }
            Err(e) => Err(SlashError::fs("lock", &lock_path, e)),
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}
