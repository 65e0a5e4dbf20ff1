//! Filesystem helpers shared by the state file, sidecars and tile images

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::fs;

use crate::errors::{AppError, AppResult};

/// Replace `path` with `bytes` in one rename
///
/// The temp file lives in the destination directory so the rename never
/// crosses filesystems; readers see either the old or the new content.
pub async fn write_atomic(path: &Path, bytes: Vec<u8>) -> AppResult<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(&dir).await?;

    let dest = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> AppResult<()> {
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| AppError::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::internal(format!("file writer task failed: {e}")))?
}

/// Modification time, or None when the file does not exist
pub async fn modified_time(path: &Path) -> AppResult<Option<std::time::SystemTime>> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.modified()?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_atomic_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("file.json");

        write_atomic(&path, b"one".to_vec()).await.unwrap();
        write_atomic(&path, b"two".to_vec()).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_modified_time_of_missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(modified_time(&dir.path().join("missing")).await.unwrap().is_none());
    }
}
