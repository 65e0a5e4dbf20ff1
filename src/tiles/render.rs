//! Compositing icons onto a canvas

use std::io::Cursor;
use std::path::PathBuf;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::warn;

use super::layout::CellLayout;
use crate::errors::AppResult;

/// One icon and the cell it goes into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub source: PathBuf,
    pub row: u32,
    pub col: u32,
}

#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// Lossless WebP bytes
    pub bytes: Vec<u8>,
    /// Icons that could not be read and were left blank
    pub omitted: usize,
}

/// Draw every placement onto a transparent `width x height` canvas
///
/// Unreadable icons leave their cell empty rather than failing the tile.
pub fn render(
    layout: &CellLayout,
    width: u32,
    height: u32,
    placements: &[Placement],
) -> AppResult<RenderedImage> {
    let mut canvas = RgbaImage::new(width, height);
    let mut omitted = 0;

    for placement in placements {
        let icon = match image::open(&placement.source) {
            Ok(icon) => fit_icon(icon, layout.icon_size),
            Err(e) => {
                warn!("Leaving cell blank, cannot read {}: {}", placement.source.display(), e);
                omitted += 1;
                continue;
            }
        };
        let (x, y) = layout.icon_origin(placement.row, placement.col);
        imageops::overlay(&mut canvas, &icon, x as i64, y as i64);
    }

    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(canvas).write_to(&mut Cursor::new(&mut bytes), ImageFormat::WebP)?;
    Ok(RenderedImage { bytes, omitted })
}

fn fit_icon(icon: DynamicImage, size: u32) -> RgbaImage {
    let rgba = icon.to_rgba8();
    if rgba.width() == size && rgba.height() == size {
        rgba
    } else {
        imageops::resize(&rgba, size, size, FilterType::Lanczos3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::decode::test_support::png_bytes;
    use crate::config::TilesConfig;
    use tempfile::tempdir;

    const GREEN: [u8; 4] = [0, 255, 0, 255];

    #[test]
    fn test_icons_land_inside_their_cells() {
        let dir = tempdir().unwrap();
        let icon = dir.path().join("icon.png");
        std::fs::write(&icon, png_bytes(4, 4, GREEN)).unwrap();

        let layout = CellLayout::tile(&TilesConfig {
            grid_size: 2,
            icon_size: 4,
            border_size: 1,
            ..TilesConfig::default()
        });
        let (w, h) = layout.canvas_size();
        let placements = vec![Placement {
            source: icon,
            row: 1,
            col: 0,
        }];

        let rendered = render(&layout, w, h, &placements).unwrap();
        assert_eq!(rendered.omitted, 0);

        let decoded = image::load_from_memory_with_format(&rendered.bytes, ImageFormat::WebP)
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded.dimensions(), (12, 12));
        // Cell (1, 0) spans y 6..12; the icon sits one pixel in
        assert_eq!(decoded.get_pixel(1, 7).0, GREEN);
        assert_eq!(decoded.get_pixel(0, 6).0[3], 0);
        assert_eq!(decoded.get_pixel(7, 1).0[3], 0);
    }

    #[test]
    fn test_unreadable_icon_is_omitted() {
        let dir = tempdir().unwrap();
        let layout = CellLayout::tile(&TilesConfig {
            grid_size: 1,
            ..TilesConfig::default()
        });
        let placements = vec![Placement {
            source: dir.path().join("missing.png"),
            row: 0,
            col: 0,
        }];

        let rendered = render(&layout, 18, 18, &placements).unwrap();
        assert_eq!(rendered.omitted, 1);
        assert!(!rendered.bytes.is_empty());
    }
}
