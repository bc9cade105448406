//! Exclusive store-directory lock held for the lifetime of a session.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::types::{BatchError, Result};

/// Name of the lock file inside the store directory.
pub const STORE_LOCK_FILE: &str = "store_lock";

/// Holds an advisory exclusive lock on `<store>/store_lock`.
pub struct StoreLocker {
    file: Option<File>,
    path: PathBuf,
}

impl StoreLocker {
    /// Acquires the lock, failing with `StoreLocked` when another session holds it.
    pub fn acquire(store_dir: &Path) -> Result<Self> {
        let path = store_dir.join(STORE_LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        file.try_lock_exclusive()
            .map_err(|_| BatchError::StoreLocked(store_dir.to_path_buf()))?;
        debug!(path = %path.display(), "store_lock.acquired");
        Ok(Self {
            file: Some(file),
            path,
        })
    }

    /// Releases the lock; calling it twice is a no-op.
    pub fn release(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.unlock()?;
            debug!(path = %self.path.display(), "store_lock.released");
        }
        Ok(())
    }

    /// Whether the lock is still held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for StoreLocker {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
