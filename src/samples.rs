//! Rendering of generated images.

use crate::error::{Error, Result};
use burn::prelude::*;
use image::{Rgb, RgbImage};
use std::path::Path;

/// Gap, in pixels, between grid cells.
const GAP: u32 = 1;

/// Maps values from `[-1, 1]` to bytes, clamping anything outside.
///
/// # Shapes
///   - Input [n, channels, height, width]
///   - Output [n * channels * height * width], same layout
pub fn to_pixels<B: Backend>(images: Tensor<B, 4>) -> Vec<u8> {
    let values = ((images + 1.) * 127.5).clamp(0., 255.).into_data();
    values
        .convert::<f32>()
        .to_vec::<f32>()
        .unwrap_or_default()
        .into_iter()
        .map(|v| v.round() as u8)
        .collect()
}

/// Tiles `images` row-major into a grid of `columns` cells.
///
/// Single-channel images are rendered as gray. Only the first three channels are used otherwise.
pub fn image_grid<B: Backend>(images: Tensor<B, 4>, columns: usize) -> Result<RgbImage> {
    let [n, channels, height, width] = images.dims();
    if n == 0 || columns == 0 {
        return Err(Error::Shape(format!(
            "cannot tile {n} images into {columns} columns"
        )));
    }
    if channels != 1 && channels < 3 {
        return Err(Error::Shape(format!(
            "cannot render images with {channels} channels"
        )));
    }

    let pixels = to_pixels(images);
    let rows = n.div_ceil(columns);
    let cell_w = width as u32 + GAP;
    let cell_h = height as u32 + GAP;
    let mut grid = RgbImage::new(
        columns as u32 * cell_w - GAP,
        rows as u32 * cell_h - GAP,
    );

    let plane = height * width;
    for index in 0..n {
        let image = &pixels[index * channels * plane..(index + 1) * channels * plane];
        let x0 = (index % columns) as u32 * cell_w;
        let y0 = (index / columns) as u32 * cell_h;
        for y in 0..height {
            for x in 0..width {
                let at = |c: usize| image[c * plane + y * width + x];
                let rgb = if channels == 1 {
                    [at(0); 3]
                } else {
                    [at(0), at(1), at(2)]
                };
                grid.put_pixel(x0 + x as u32, y0 + y as u32, Rgb(rgb));
            }
        }
    }
    Ok(grid)
}

/// Renders `images` with [`image_grid`] and writes it to `path` (format from the extension).
pub fn save_grid<B: Backend>(images: Tensor<B, 4>, columns: usize, path: &Path) -> Result<()> {
    let grid = image_grid(images, columns)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    grid.save(path).map_err(|source| Error::Image {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = ?path, "saved samples");
    Ok(())
}
