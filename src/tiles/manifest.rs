//! `tiles.json`: the tile list handed to the presentation layer

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::config::TilesConfig;
use crate::errors::AppResult;
use crate::utils::fs::write_atomic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileReference {
    pub index: usize,
    pub image: String,
    pub sidecar: String,
    pub entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileManifest {
    pub grid_size: u32,
    pub icon_size: u32,
    pub border_size: u32,
    pub cell_size: u32,
    pub tiles: Vec<TileReference>,
}

impl TileManifest {
    pub fn new(config: &TilesConfig) -> Self {
        Self {
            grid_size: config.grid_size,
            icon_size: config.icon_size,
            border_size: config.border_size,
            cell_size: config.cell_size(),
            tiles: Vec::new(),
        }
    }

    /// Write the manifest unless the file already holds identical bytes
    pub async fn write_if_changed(&self, path: &Path) -> AppResult<bool> {
        let bytes = serde_json::to_vec_pretty(self)?;
        match fs::read(path).await {
            Ok(existing) if existing == bytes => {
                debug!("Manifest {} unchanged", path.display());
                return Ok(false);
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        write_atomic(path, bytes).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_manifest_only_rewritten_on_change() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiles.json");
        let mut manifest = TileManifest::new(&TilesConfig::default());
        manifest.tiles.push(TileReference {
            index: 1,
            image: "1.webp".to_string(),
            sidecar: "1.json".to_string(),
            entries: 3,
        });

        assert!(manifest.write_if_changed(&path).await.unwrap());
        assert!(!manifest.write_if_changed(&path).await.unwrap());

        manifest.tiles[0].entries = 4;
        assert!(manifest.write_if_changed(&path).await.unwrap());

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["gridSize"], 100);
        assert_eq!(json["cellSize"], 18);
        assert_eq!(json["tiles"][0]["entries"], 4);
    }
}
