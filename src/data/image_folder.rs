//! Images read from a flat directory of image files, e.g. SVHN crops exported as png.

use crate::data::{ImageDataset, ImageItem};
use crate::error::{Error, Result};
use image::RgbImage;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Loads every image of `dir` (sorted by file name) as `size x size` RGB.
pub fn load(dir: &Path, size: usize) -> Result<ImageDataset> {
    let files = image_files(dir)?;
    tracing::info!(dir = ?dir, files = files.len(), "reading images");

    let items = files
        .iter()
        .map(|path| {
            let image = image::open(path)
                .map_err(|source| Error::Image {
                    path: path.clone(),
                    source,
                })?
                .to_rgb8();
            to_item(&image, size)
        })
        .collect::<Result<Vec<_>>>()?;

    ImageDataset::from_items(items, &dir.display().to_string())
}

/// Image files directly inside `dir`, by name.
pub fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = std::fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()).map_err(|e| Error::io(dir, e)))
        .collect::<Result<Vec<_>>>()?;
    files.retain(|path| {
        path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    });
    files.sort();
    Ok(files)
}

/// Resizes to `size x size` if needed and reorders HWC pixels into CHW.
pub fn to_item(image: &RgbImage, size: usize) -> Result<ImageItem> {
    let side = size as u32;
    let resized;
    let image = if image.dimensions() == (side, side) {
        image
    } else {
        resized = image::imageops::resize(image, side, side, FilterType::Triangle);
        &resized
    };

    let plane = size * size;
    let mut pixels = vec![0u8; 3 * plane];
    for (i, pixel) in image.pixels().enumerate() {
        for (c, value) in pixel.0.iter().enumerate() {
            pixels[c * plane + i] = *value;
        }
    }
    ImageItem::new(pixels, 3, size, size)
}
