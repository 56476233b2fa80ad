//! File-based advisory locking for the journal directory.
//!
//! fs2 locks on `<root>/LOCK`:
//! - Exclusive: one writer (append, populate, contributor commits).
//! - Shared: read-only opens (page, get, status); several may coexist.
//!
//! Acquisition never blocks: a held lock is reported as an error so a second
//! writer fails fast instead of hanging. The lock is released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = "LOCK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
pub struct LockGuard {
    file: std::fs::File,
    path: PathBuf,
    mode: LockMode,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Try to take the lock on `<root>/LOCK` in `mode`. Errors if it is already held incompatibly.
pub fn try_acquire_lock(root: &Path, mode: LockMode) -> Result<LockGuard> {
    let path = root.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    match mode {
        LockMode::Shared => file
            .try_lock_shared()
            .with_context(|| format!("journal is locked by a writer: {}", path.display()))?,
        LockMode::Exclusive => file
            .try_lock_exclusive()
            .with_context(|| format!("journal is already locked: {}", path.display()))?,
    }
    Ok(LockGuard { file, path, mode })
}
