//! Store-wide exclusive lock using flock(2), shared by every process that
//! mutates the credential document or the ledger.

use crate::error::{Result, VaultError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// An exclusive file lock. Released on drop (file close releases flock).
#[derive(Debug)]
pub struct FileLock {
    _file: File,
}

impl FileLock {
    /// Acquire an exclusive lock, blocking until available.
    pub fn exclusive(path: &Path) -> Result<Self> {
        let file = open(path)?;
        file.lock_exclusive().map_err(|source| VaultError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { _file: file })
    }

    /// Try to acquire the lock without blocking; `Ok(None)` if it is held.
    pub fn try_exclusive(path: &Path) -> Result<Option<Self>> {
        let file = open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file })),
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            // fs2 on Linux may return Other instead of WouldBlock
            Err(ref e) if e.raw_os_error() == Some(11) => Ok(None), // EAGAIN
            Err(source) => Err(VaultError::Lock {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

fn open(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|source| VaultError::Lock {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| VaultError::Lock {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_creates_missing_parent() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("nested").join("vault.lock");
        let lock = FileLock::exclusive(&lock_path).unwrap();
        assert!(lock_path.exists());
        drop(lock);
    }

    #[test]
    fn test_second_holder_is_refused() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("vault.lock");
        let _held = FileLock::exclusive(&lock_path).unwrap();
        assert!(FileLock::try_exclusive(&lock_path).unwrap().is_none());
    }

    #[test]
    fn test_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("vault.lock");
        {
            let _held = FileLock::exclusive(&lock_path).unwrap();
        }
        assert!(FileLock::try_exclusive(&lock_path).unwrap().is_some());
    }
}
