//! Grid geometry shared by tiles and the preview

use crate::config::TilesConfig;

pub const PREVIEW_STEM: &str = "preview";
pub const SYNTHETIC_STEM: &str = "synthetic";
pub const MANIFEST_FILE: &str = "tiles.json";

/// Row-major placement of equally sized cells
///
/// A cell is the icon plus `border` pixels on each side; cell `(row, col)`
/// has its icon drawn at `(col * cell + border, row * cell + border)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellLayout {
    pub columns: u32,
    pub rows: u32,
    pub icon_size: u32,
    pub border: u32,
}

impl CellLayout {
    /// Square `grid_size x grid_size` tile layout
    pub fn tile(config: &TilesConfig) -> Self {
        Self {
            columns: config.grid_size,
            rows: config.grid_size,
            icon_size: config.icon_size,
            border: config.border_size,
        }
    }

    /// As many whole cells as fit in the preview canvas
    pub fn preview(config: &TilesConfig) -> Self {
        let cell = config.cell_size();
        Self {
            columns: config.preview_width / cell,
            rows: config.preview_height / cell,
            icon_size: config.icon_size,
            border: config.border_size,
        }
    }

    pub fn cell_size(&self) -> u32 {
        self.icon_size + 2 * self.border
    }

    pub fn capacity(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// `(row, col)` of position `index`
    pub fn cell_of(&self, index: usize) -> (u32, u32) {
        let columns = self.columns.max(1) as usize;
        ((index / columns) as u32, (index % columns) as u32)
    }

    /// Top-left pixel of the icon drawn at `(row, col)`
    pub fn icon_origin(&self, row: u32, col: u32) -> (u32, u32) {
        let cell = self.cell_size();
        (col * cell + self.border, row * cell + self.border)
    }

    /// Canvas size covering every cell
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.columns * self.cell_size(), self.rows * self.cell_size())
    }
}

pub fn tile_image_name(index: usize) -> String {
    format!("{index}.webp")
}

pub fn tile_sidecar_name(index: usize) -> String {
    format!("{index}.json")
}

pub fn image_name(stem: &str) -> String {
    format!("{stem}.webp")
}

pub fn sidecar_name(stem: &str) -> String {
    format!("{stem}.json")
}

/// Tile index encoded in a file name like `12.webp`
pub fn parse_tile_index(file_name: &str) -> Option<usize> {
    file_name
        .strip_suffix(".webp")
        .and_then(|stem| stem.parse::<usize>().ok())
        .filter(|&index| index > 0)
}
