//! Ordered domain lists stored next to each rendered image

use std::path::Path;

use tokio::fs;
use tracing::warn;

use crate::errors::AppResult;
use crate::utils::fs::write_atomic;

/// Read a sidecar; missing or unreadable JSON is reported as `None`
///
/// A corrupt sidecar cannot be trusted for comparison, so it is treated
/// exactly like a missing one and rewritten.
pub async fn read_sidecar(path: &Path) -> AppResult<Option<Vec<String>>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice(&bytes) {
        Ok(domains) => Ok(Some(domains)),
        Err(e) => {
            warn!("Ignoring unreadable sidecar {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

pub async fn write_sidecar(path: &Path, domains: &[String]) -> AppResult<()> {
    write_atomic(path, serde_json::to_vec(domains)?).await
}
