//! Photo blob store for friend pictures downloaded from the directory.
//!
//! # Invariants
//! - `save` returns a bare filename; callers never see absolute paths.
//! - Deleting a missing file is not an error.
//! - Filenames containing path separators are rejected.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Photo store failures.
#[derive(Debug, Error)]
pub enum PhotoStoreError {
    #[error("photo store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid photo filename: {0}")]
    InvalidName(String),

    #[error("photo payload is empty")]
    EmptyPayload,
}

/// Blob storage for friend photos.
pub trait PhotoStore {
    /// Stores `bytes` and returns the generated filename.
    fn save(&self, bytes: &[u8]) -> Result<String, PhotoStoreError>;
    /// Removes one stored photo by filename.
    fn delete(&self, filename: &str) -> Result<(), PhotoStoreError>;
}

/// Photo store writing one file per photo into a directory.
#[derive(Debug, Clone)]
pub struct FsPhotoStore {
    dir: PathBuf,
}

impl FsPhotoStore {
    /// Creates the store, creating `dir` when missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PhotoStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, filename: &str) -> Result<PathBuf, PhotoStoreError> {
        let trimmed = filename.trim();
        if trimmed.is_empty()
            || trimmed.contains(['/', '\\'])
            || trimmed == "."
            || trimmed == ".."
        {
            return Err(PhotoStoreError::InvalidName(filename.to_string()));
        }
        Ok(self.dir.join(trimmed))
    }
}

impl PhotoStore for FsPhotoStore {
    fn save(&self, bytes: &[u8]) -> Result<String, PhotoStoreError> {
        if bytes.is_empty() {
            return Err(PhotoStoreError::EmptyPayload);
        }
        let filename = format!("{}.jpg", Uuid::new_v4());
        fs::write(self.dir.join(&filename), bytes)?;
        Ok(filename)
    }

    fn delete(&self, filename: &str) -> Result<(), PhotoStoreError> {
        let path = self.path_of(filename)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
