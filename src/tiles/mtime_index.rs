//! Snapshot of icon modification times
//!
//! Built once at the start of a compositor run from the on-disk icon tree
//! and read-only afterwards. Keys are paths relative to the icon root, the
//! same shape [`IconStorage::relative_path`] produces.
//!
//! [`IconStorage::relative_path`]: crate::acquisition::IconStorage::relative_path

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs;
use tracing::{debug, warn};

use crate::errors::AppResult;

pub trait ModificationIndex: Send + Sync {
    fn modified(&self, relative: &Path) -> Option<SystemTime>;

    fn contains(&self, relative: &Path) -> bool {
        self.modified(relative).is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FsModificationIndex {
    entries: HashMap<PathBuf, SystemTime>,
}

impl FsModificationIndex {
    /// Walk `root` and record the mtime of every regular file
    ///
    /// A missing root yields an empty index; nothing has been acquired yet.
    pub async fn build(root: &Path) -> AppResult<Self> {
        let mut entries = HashMap::new();
        if !fs::try_exists(root).await? {
            debug!("Icon root {} does not exist, mtime index is empty", root.display());
            return Ok(Self { entries });
        }

        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut reader = fs::read_dir(&dir).await?;
            while let Some(item) = reader.next_entry().await? {
                let file_type = item.file_type().await?;
                let path = item.path();
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                let modified = match item.metadata().await.and_then(|m| m.modified()) {
                    Ok(modified) => modified,
                    Err(e) => {
                        warn!("Cannot stat icon {}: {}", path.display(), e);
                        continue;
                    }
                };
                if let Ok(relative) = path.strip_prefix(root) {
                    entries.insert(relative.to_path_buf(), modified);
                }
            }
        }

        debug!("Indexed {} icons under {}", entries.len(), root.display());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(PathBuf, SystemTime)> for FsModificationIndex {
    fn from_iter<I: IntoIterator<Item = (PathBuf, SystemTime)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl ModificationIndex for FsModificationIndex {
    fn modified(&self, relative: &Path) -> Option<SystemTime> {
        self.entries.get(relative).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::IconStorage;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_build_indexes_nested_icons_by_relative_path() {
        let dir = tempdir().unwrap();
        let storage = IconStorage::new(dir.path());
        let path = storage.write_icon("example.com", b"png").await.unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

        let index = FsModificationIndex::build(dir.path()).await.unwrap();

        let relative = IconStorage::relative_path("example.com");
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.modified(&relative),
            Some(std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000))
        );
        assert!(!index.contains(&IconStorage::relative_path("other.example")));
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let index = FsModificationIndex::build(&dir.path().join("icons"))
            .await
            .unwrap();
        assert!(index.is_empty());
    }
}
