//! Local file access for serving and persisting chunks.

use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, SeekFrom};

use crate::error::StorageError;

/// Default directory for downloaded chunks
pub const RECEIVED_FILES_DIR: &str = "tmp";

/// Open `path` read-only, positioned at `offset`.
pub async fn open_for_read_at(path: &Path, offset: u64) -> std::io::Result<File> {
    let mut file = File::open(path).await?;
    if offset != 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }
    Ok(file)
}

/// Open `path` for writing at `offset`, creating it if missing.
/// Existing content is kept so chunks can land in a partial download.
pub async fn open_for_write_at(path: &Path, offset: u64) -> std::io::Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .await?;
    if offset != 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }
    Ok(file)
}

pub async fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir).await
}

/// Map a filename received from a server onto a path inside `dir`.
///
/// Only a single plain path component is accepted.
pub fn local_path_for(dir: &Path, filename: &[u8]) -> Result<PathBuf, StorageError> {
    let unsafe_name = || StorageError::UnsafeFilename(String::from_utf8_lossy(filename).into_owned());

    let name = std::str::from_utf8(filename).map_err(|_| unsafe_name())?;
    if name.is_empty() || name.contains(&['/', '\\', '\0'][..]) {
        return Err(unsafe_name());
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dir.join(name)),
        _ => Err(unsafe_name()),
    }
}
