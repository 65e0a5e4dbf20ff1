use std::path::{Path, PathBuf};

use crate::errors::AppResult;
use crate::utils::fs::write_atomic;

/// Content-addressed icon tree
///
/// `{domain}.png` is hashed with MD5; the first two hex characters name the
/// first-level directory and the next two the second level, which keeps
/// per-directory fan-out bounded for very large catalogues.
#[derive(Debug, Clone)]
pub struct IconStorage {
    root: PathBuf,
}

impl IconStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_name(domain: &str) -> String {
        format!("{domain}.png")
    }

    /// Path relative to the storage root, e.g. `3f/a2/example.com.png`
    pub fn relative_path(domain: &str) -> PathBuf {
        let file_name = Self::file_name(domain);
        let digest = format!("{:x}", md5::compute(file_name.as_bytes()));
        PathBuf::from(&digest[0..2])
            .join(&digest[2..4])
            .join(file_name)
    }

    pub fn path_for(&self, domain: &str) -> PathBuf {
        self.root.join(Self::relative_path(domain))
    }

    /// Replace the icon for `domain`; a killed run never leaves a partial PNG
    pub async fn write_icon(&self, domain: &str, png_bytes: &[u8]) -> AppResult<PathBuf> {
        let path = self.path_for(domain);
        write_atomic(&path, png_bytes.to_vec()).await?;
        Ok(path)
    }
}
