//! Advisory file lock for the local store backend.
//!
//! Cross-platform (fs2):
//! - Exclusive: одна пишущая операция (load → apply → rewrite store.json).
//! - Shared: чтения (list/get) не блокируют друг друга.
//!
//! Lock file path: <store_dir>/LOCK. Lock is released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub fn lock_file_path(store_dir: &Path) -> PathBuf {
    store_dir.join("LOCK")
}

fn open_lock_file(store_dir: &Path) -> Result<(File, PathBuf)> {
    let path = lock_file_path(store_dir);
    let f = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    Ok((f, path))
}

/// Blocks until the lock is acquired.
pub fn acquire_lock(store_dir: &Path, mode: LockMode) -> Result<StoreLock> {
    let (file, path) = open_lock_file(store_dir)?;
    match mode {
        LockMode::Shared => file
            .lock_shared()
            .with_context(|| format!("lock_shared {}", path.display()))?,
        LockMode::Exclusive => file
            .lock_exclusive()
            .with_context(|| format!("lock_exclusive {}", path.display()))?,
    }
    Ok(StoreLock { file })
}

/// Non-blocking variant; Err if someone holds a conflicting lock.
/// Used by `LocalStore::writer_active` (doctor).
pub fn try_acquire_lock(store_dir: &Path, mode: LockMode) -> Result<StoreLock> {
    let (file, path) = open_lock_file(store_dir)?;
    match mode {
        LockMode::Shared => file
            .try_lock_shared()
            .with_context(|| format!("try_lock_shared failed: {}", path.display()))?,
        LockMode::Exclusive => file
            .try_lock_exclusive()
            .with_context(|| format!("try_lock_exclusive failed: {}", path.display()))?,
    }
    Ok(StoreLock { file })
}
