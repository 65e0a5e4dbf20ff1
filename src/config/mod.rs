use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::errors::{AppError, AppResult};

pub const DEFAULT_CONFIG_FILE: &str = "favicon-atlas.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub tiles: TilesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Ranked catalogue produced by the upstream dedup/rank join
    pub catalogue: PathBuf,
    /// Persisted catalogue state, read and rewritten by both subsystems
    pub state: PathBuf,
    pub icons_dir: PathBuf,
    pub tiles_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub max_entries: usize,
    pub request_timeout_secs: u64,
    pub retry_cap: u32,
    pub skip_window_hours: u64,
    /// Side length of the normalized icon written to the icon tree
    pub icon_size: u32,
    pub checkpoint_interval: usize,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TilesConfig {
    pub grid_size: u32,
    pub icon_size: u32,
    pub border_size: u32,
    pub force: bool,
    pub force_preview: bool,
    pub preview_width: u32,
    pub preview_height: u32,
    pub synthetic_tiles: usize,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalogue: PathBuf::from("./data/ranked.json"),
            state: PathBuf::from("./data/favicons.json"),
            icons_dir: PathBuf::from("./data/icons"),
            tiles_dir: PathBuf::from("./data/tiles"),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_entries: 500_000,
            request_timeout_secs: 10,
            retry_cap: 3,
            skip_window_hours: 24,
            icon_size: 64,
            checkpoint_interval: 100,
            user_agent: format!("favicon-atlas/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self {
            grid_size: 100,
            icon_size: 16,
            border_size: 1,
            force: false,
            force_preview: false,
            preview_width: 1200,
            preview_height: 630,
            synthetic_tiles: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            acquisition: AcquisitionConfig::default(),
            tiles: TilesConfig::default(),
        }
    }
}

impl AcquisitionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// None when the hour count does not fit a `chrono::Duration`
    pub fn try_skip_window(&self) -> Option<chrono::Duration> {
        i64::try_from(self.skip_window_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
    }

    /// Oversized windows saturate; `Config::validate` rejects them first
    pub fn skip_window(&self) -> chrono::Duration {
        self.try_skip_window().unwrap_or(chrono::Duration::MAX)
    }
}

impl TilesConfig {
    /// Pixel side of one grid cell: the icon plus a border on each side
    pub fn cell_size(&self) -> u32 {
        self.icon_size + 2 * self.border_size
    }

    pub fn entries_per_tile(&self) -> usize {
        (self.grid_size as usize) * (self.grid_size as usize)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file = std::env::var("CONFIG_FILE")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            let config = toml::from_str(&contents)?;
            info!("Configuration loaded from: {}", config_file);
            Ok(config)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }

    /// Reject option values that would make a run meaningless
    pub fn validate(&self) -> AppResult<()> {
        let acquisition = &self.acquisition;
        if acquisition.checkpoint_interval == 0 {
            return Err(AppError::configuration(
                "acquisition.checkpoint_interval must be at least 1",
            ));
        }
        if acquisition.icon_size == 0 {
            return Err(AppError::configuration(
                "acquisition.icon_size must be at least 1",
            ));
        }
        if acquisition.try_skip_window().is_none() {
            return Err(AppError::configuration(format!(
                "acquisition.skip_window_hours {} is too large",
                acquisition.skip_window_hours
            )));
        }
        if acquisition.request_timeout_secs == 0 {
            return Err(AppError::configuration(
                "acquisition.request_timeout_secs must be at least 1",
            ));
        }

        let tiles = &self.tiles;
        if tiles.grid_size == 0 || tiles.icon_size == 0 {
            return Err(AppError::configuration(
                "tiles.grid_size and tiles.icon_size must be at least 1",
            ));
        }
        if tiles.preview_width < tiles.cell_size() || tiles.preview_height < tiles.cell_size() {
            return Err(AppError::configuration(format!(
                "preview {}x{} cannot hold a single {}px cell",
                tiles.preview_width,
                tiles.preview_height,
                tiles.cell_size()
            )));
        }
        Ok(())
    }
}
