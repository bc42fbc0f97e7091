//! Advisory lock held for the duration of an import

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

const LOCK_FILE: &str = "import.lock";

/// Exclusive lock on `<data dir>/import.lock`, released on drop
#[derive(Debug)]
pub struct ImportLock {
    file: File,
    path: PathBuf,
}

impl ImportLock {
    /// Take the lock, failing immediately when another import holds it
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        file.try_lock_exclusive()
            .with_context(|| "Another import is already running".to_string())?;
        tracing::debug!(path = %path.display(), "acquired import lock");

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ImportLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release import lock: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_lock_fails_until_released() {
        let dir = tempdir().unwrap();
        let first = ImportLock::acquire(dir.path()).unwrap();
        assert!(first.path().exists());

        let err = ImportLock::acquire(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Another import"));

        drop(first);
        assert!(ImportLock::acquire(dir.path()).is_ok());
    }
}
