// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Read-only view of a filesystem, used to load operator-supplied
/// certificate and key files.
///
/// The proxy may serve files from an overlay or in-memory tree, so the TLS
/// builder never touches `std::fs` directly for mapping files.
pub trait FileSource: Send + Sync {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// The host filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSource;

impl FileSource for OsFileSource {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// In-memory filesystem keyed by exact path.
#[derive(Debug, Default)]
pub struct MemoryFileSource {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), contents.into());
        }
    }
}

impl FileSource for MemoryFileSource {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        let files = self
            .files
            .read()
            .map_err(|_| std::io::Error::other("memory file source lock poisoned"))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
    }
}

/// Create `dir` and its parents if missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| Error::CreateDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    // Same directory so the rename stays on one filesystem
    let parent = path
        .parent()
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?;
    let random_suffix: u64 = rand::Rng::random(&mut rand::rng());
    Ok(parent.join(format!(".tmp-{:x}", random_suffix)))
}

fn rename_into_place(temp_path: &Path, path: &Path) -> Result<()> {
    std::fs::rename(temp_path, path).map_err(|e| {
        // Clean up temp file on error - but only if it still exists
        if temp_path.exists() {
            let _ = std::fs::remove_file(temp_path);
        }
        Error::WriteFile {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

/// Atomically write data to a file using a temporary file and rename.
/// Readers never observe a half-written certificate.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;

    let temp_path = temp_path_for(path)?;

    // Write to temp file
    let mut file = std::fs::File::create(&temp_path).map_err(|e| Error::WriteFile {
        path: temp_path.clone(),
        source: e,
    })?;

    file.write_all(contents).map_err(|e| Error::WriteFile {
        path: temp_path.clone(),
        source: e,
    })?;

    // Ensure data is flushed to disk before rename
    file.sync_all().map_err(|e| Error::WriteFile {
        path: temp_path.clone(),
        source: e,
    })?;

    drop(file); // Close file before rename

    rename_into_place(&temp_path, path)
}

/// Atomically write a secret file that only the owner can read or write.
pub fn atomic_write_secret(path: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = temp_path_for(path)?;
    // Write to temp file with secure permissions
    write_secret_file(&temp_path, contents)?;
    rename_into_place(&temp_path, path)
}

#[cfg(unix)]
pub fn write_secret_file(path: &Path, contents: &[u8]) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| Error::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;

    file.write_all(contents).map_err(|e| Error::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    file.sync_all().map_err(|e| Error::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

// TODO: restrict the ACL to the current user on Windows, as `0600` does on unix.
#[cfg(not(unix))]
pub fn write_secret_file(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| Error::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}
