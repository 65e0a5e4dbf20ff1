//! ICO-aware decoding and normalization of downloaded favicons
//!
//! ICO files bundle several sizes of the same icon. The directory is parsed
//! here so the widest embedded image can be chosen explicitly; the chosen
//! image is then re-packed as a one-entry ICO and handed to the `image`
//! crate, which understands both PNG and BMP payloads.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::errors::{DecodeError, DecodeResult};

const ICO_HEADER_LEN: usize = 6;
const ICO_DIR_ENTRY_LEN: usize = 16;

/// One record of an ICO directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcoDirEntry {
    pub width: u32,
    pub height: u32,
    raw: [u8; ICO_DIR_ENTRY_LEN],
    pub size: u32,
    pub offset: u32,
}

/// Whether the bytes start with an ICO header
pub fn looks_like_ico(bytes: &[u8]) -> bool {
    bytes.len() >= ICO_HEADER_LEN && bytes[..4] == [0, 0, 1, 0]
}

/// Parse the directory of an ICO container
pub fn parse_ico_directory(bytes: &[u8]) -> DecodeResult<Vec<IcoDirEntry>> {
    if !looks_like_ico(bytes) {
        return Err(DecodeError::container("missing ICO header"));
    }

    let count = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;
    if count == 0 {
        return Err(DecodeError::container("directory is empty"));
    }

    let dir_end = ICO_HEADER_LEN + count * ICO_DIR_ENTRY_LEN;
    if bytes.len() < dir_end {
        return Err(DecodeError::container(format!(
            "directory of {count} entries truncated at {} bytes",
            bytes.len()
        )));
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let start = ICO_HEADER_LEN + i * ICO_DIR_ENTRY_LEN;
        let mut raw = [0u8; ICO_DIR_ENTRY_LEN];
        raw.copy_from_slice(&bytes[start..start + ICO_DIR_ENTRY_LEN]);

        let size = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]);
        let offset = u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]);
        let end = offset as usize + size as usize;
        if size == 0 || end > bytes.len() || (offset as usize) < dir_end {
            return Err(DecodeError::container(format!(
                "entry {i} points outside the file (offset {offset}, size {size})"
            )));
        }

        entries.push(IcoDirEntry {
            // A stored zero means 256 pixels
            width: if raw[0] == 0 { 256 } else { raw[0] as u32 },
            height: if raw[1] == 0 { 256 } else { raw[1] as u32 },
            raw,
            size,
            offset,
        });
    }

    Ok(entries)
}

/// The widest entry; ties go to the one listed first
pub fn select_widest(entries: &[IcoDirEntry]) -> Option<&IcoDirEntry> {
    entries.iter().fold(None, |best: Option<&IcoDirEntry>, entry| match best {
        Some(current) if entry.width <= current.width => Some(current),
        _ => Some(entry),
    })
}

fn repack_single_entry(bytes: &[u8], entry: &IcoDirEntry) -> Vec<u8> {
    let payload = &bytes[entry.offset as usize..(entry.offset + entry.size) as usize];
    let mut out = Vec::with_capacity(ICO_HEADER_LEN + ICO_DIR_ENTRY_LEN + payload.len());
    out.extend_from_slice(&[0, 0, 1, 0, 1, 0]);

    let mut dir = entry.raw;
    let new_offset = (ICO_HEADER_LEN + ICO_DIR_ENTRY_LEN) as u32;
    dir[12..16].copy_from_slice(&new_offset.to_le_bytes());
    out.extend_from_slice(&dir);
    out.extend_from_slice(payload);
    out
}

fn decode_ico_container(bytes: &[u8]) -> DecodeResult<DynamicImage> {
    let entries = parse_ico_directory(bytes)?;
    let chosen = select_widest(&entries)
        .ok_or_else(|| DecodeError::container("directory is empty"))?;
    debug!(
        "ICO container has {} images, using {}x{}",
        entries.len(),
        chosen.width,
        chosen.height
    );
    let single = repack_single_entry(bytes, chosen);
    image::load_from_memory_with_format(&single, ImageFormat::Ico).map_err(DecodeError::Raster)
}

/// Decode favicon bytes into a raster
///
/// ICO parsing is attempted when the content has an ICO header or the URL
/// ends in `.ico`; any failure there falls back to format sniffing.
pub fn decode_icon(bytes: &[u8], ico_hint: bool) -> DecodeResult<DynamicImage> {
    if ico_hint || looks_like_ico(bytes) {
        match decode_ico_container(bytes) {
            Ok(img) => return Ok(img),
            Err(e) => debug!("ICO decoding failed, falling back to generic decoder: {}", e),
        }
    }
    image::load_from_memory(bytes).map_err(DecodeError::Raster)
}

/// Resize to a `size`-pixel square and encode as PNG
pub fn normalize_to_png(img: &DynamicImage, size: u32) -> DecodeResult<Vec<u8>> {
    let resized = if img.width() == size && img.height() == size {
        img.clone()
    } else {
        img.resize_exact(size, size, FilterType::Lanczos3)
    };
    let rgba = DynamicImage::ImageRgba8(resized.to_rgba8());

    let mut png_bytes = Vec::new();
    rgba.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(DecodeError::Encode)?;
    Ok(png_bytes)
}

/// Decode, select, resize and re-encode in one step
pub fn normalize_icon(bytes: &[u8], ico_hint: bool, size: u32) -> DecodeResult<Vec<u8>> {
    let img = decode_icon(bytes, ico_hint)?;
    normalize_to_png(&img, size)
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    pub fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Assemble an ICO container from PNG payloads
    pub fn ico_bytes(images: &[(u32, u32, Vec<u8>)]) -> Vec<u8> {
        let mut out = vec![0, 0, 1, 0];
        out.extend_from_slice(&(images.len() as u16).to_le_bytes());
        let mut offset = 6 + 16 * images.len();
        for (w, h, payload) in images {
            out.push(if *w >= 256 { 0 } else { *w as u8 });
            out.push(if *h >= 256 { 0 } else { *h as u8 });
            out.extend_from_slice(&[0, 0]);
            out.extend_from_slice(&1u16.to_le_bytes());
            out.extend_from_slice(&32u16.to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&(offset as u32).to_le_bytes());
            offset += payload.len();
        }
        for (_, _, payload) in images {
            out.extend_from_slice(payload);
        }
        out
    }
}
