//! Filesystem-backed file storage.
//!
//! Product bytes live under a root directory, addressed by the
//! `file_key` stored in the catalog. Keys are treated as opaque
//! relative paths; anything escaping the root is rejected.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, StoreError};

/// File store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Read the bytes for a file key. `Ok(None)` if no such file exists.
    pub fn load(&self, file_key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(file_key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Write the bytes for a file key, creating parent directories.
    pub fn store(&self, file_key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(file_key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(())
    }

    fn resolve(&self, file_key: &str) -> Result<PathBuf> {
        let key = Path::new(file_key);
        let traverses = key.components().any(|c| {
            !matches!(c, Component::Normal(_) | Component::CurDir)
        });
        if file_key.is_empty() || traverses {
            return Err(StoreError::invalid_data(format!(
                "invalid file key: {file_key:?}"
            )));
        }
        Ok(self.root.join(key))
    }
}
