//! Image decode/encode at the edges of the raster pipeline
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use prep_core::{Channels, Frame, PrepError, Raster};

use crate::raster::RasterError;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif"];

/// Output encodings accepted by the image modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Jpg,
    Jpeg,
    Bmp,
    Tiff,
}

impl SaveFormat {
    /// Unknown names fall back to png; the flag reports whether that happened.
    pub fn resolve(name: Option<&str>) -> (Self, bool) {
        match name.map(str::to_lowercase).as_deref() {
            None | Some("png") => (SaveFormat::Png, false),
            Some("jpg") => (SaveFormat::Jpg, false),
            Some("jpeg") => (SaveFormat::Jpeg, false),
            Some("bmp") => (SaveFormat::Bmp, false),
            Some("tiff") => (SaveFormat::Tiff, false),
            Some(_) => (SaveFormat::Png, true),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpg => "jpg",
            SaveFormat::Jpeg => "jpeg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tiff => "tiff",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            SaveFormat::Png => ImageFormat::Png,
            SaveFormat::Jpg | SaveFormat::Jpeg => ImageFormat::Jpeg,
            SaveFormat::Bmp => ImageFormat::Bmp,
            SaveFormat::Tiff => ImageFormat::Tiff,
        }
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files under `path`, sorted by name. A single file is returned as
/// is; a missing path is an I/O error for the whole modality.
pub fn list_images(path: &Path) -> Result<Vec<PathBuf>, PrepError> {
    let meta = std::fs::metadata(path).map_err(|e| PrepError::io(path, e))?;
    if meta.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)
        .map_err(|e| PrepError::io(path, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    files.sort();
    Ok(files)
}

/// Decode to a normalized raster. Images with color become RGB (alpha
/// dropped); everything else becomes single-channel.
pub fn decode(source: &str, bytes: &[u8]) -> Result<Frame, RasterError> {
    let img = image::load_from_memory(bytes).map_err(|e| RasterError::Decode {
        file: source.to_string(),
        message: e.to_string(),
    })?;
    let raster = if img.color().has_color() {
        let rgb = img.to_rgb8();
        Raster::from_u8(rgb.width(), rgb.height(), Channels::Rgb, rgb.as_raw())
    } else {
        let luma = img.to_luma8();
        Raster::from_u8(luma.width(), luma.height(), Channels::Gray, luma.as_raw())
    }
    .map_err(|e| RasterError::Decode {
        file: source.to_string(),
        message: e.to_string(),
    })?;
    Ok(Frame {
        source: source.to_string(),
        raster,
    })
}

/// Rescale to 8-bit and encode in `format`.
pub fn encode(frame: &Frame, format: SaveFormat) -> Result<Vec<u8>, RasterError> {
    let err = |message: String| RasterError::Encode {
        file: frame.source.clone(),
        message,
    };
    let raster = &frame.raster;
    let pixels = raster.to_u8();
    let img = match raster.channels() {
        Channels::Gray => GrayImage::from_raw(raster.width(), raster.height(), pixels).map(DynamicImage::ImageLuma8),
        Channels::Rgb => RgbImage::from_raw(raster.width(), raster.height(), pixels).map(DynamicImage::ImageRgb8),
    }
    .ok_or_else(|| err("pixel buffer does not match dimensions".to_string()))?;

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format.image_format())
        .map_err(|e| err(e.to_string()))?;
    Ok(buf.into_inner())
}
