//! Read-only index of the files a server offers.
//!
//! Built once at startup from a single directory level and shared between
//! connection tasks without locking.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::IndexError;
use crate::protocol::FILENAMES_DELIMITER;

/// One servable regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Name as sent on the wire
    pub name: Vec<u8>,
    /// Size in bytes at scan time
    pub size: u64,
    /// Location on disk
    pub path: PathBuf,
}

/// Ordered, immutable set of servable files.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    files: Vec<FileInfo>,
    by_name: HashMap<Vec<u8>, usize>,
}

impl FileIndex {
    /// Index the regular files directly inside `dir`, sorted by name.
    /// Directories, symlinks and other special files are skipped.
    pub fn scan(dir: &Path) -> Result<Self, IndexError> {
        let read_dir_err = |source| IndexError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_dir_err)? {
            let entry = entry.map_err(read_dir_err)?;
            // DirEntry metadata does not follow symlinks.
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if !metadata.file_type().is_file() {
                continue;
            }
            files.push(FileInfo {
                name: name_bytes(entry.file_name()),
                size: metadata.len(),
                path: entry.path(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        Self::from_entries(files)
    }

    /// Build an index from already known entries, keeping their order.
    pub fn from_entries(files: Vec<FileInfo>) -> Result<Self, IndexError> {
        let mut by_name = HashMap::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            if file.name.contains(&FILENAMES_DELIMITER) {
                return Err(IndexError::InvalidName(
                    String::from_utf8_lossy(&file.name).into_owned(),
                ));
            }
            // First entry wins on duplicate names.
            by_name.entry(file.name.clone()).or_insert(i);
        }
        Ok(Self { files, by_name })
    }

    pub fn get(&self, name: &[u8]) -> Option<&FileInfo> {
        self.by_name.get(name).map(|&i| &self.files[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileInfo> {
        self.files.iter()
    }

    /// Names in index order.
    pub fn filenames(&self) -> Vec<&[u8]> {
        self.files.iter().map(|f| f.name.as_slice()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(unix)]
fn name_bytes(name: OsString) -> Vec<u8> {
    use std::os::unix::ffi::OsStringExt;
    name.into_vec()
}

#[cfg(not(unix))]
fn name_bytes(name: OsString) -> Vec<u8> {
    name.to_string_lossy().into_owned().into_bytes()
}
