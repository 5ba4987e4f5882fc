//! MNIST digits, read from the IDX files of the CVDF mirror.
//!
//! Labels are not needed to train the generator, so only the image files are fetched.

use crate::data::{ImageDataset, ImageItem};
use crate::error::{Error, Result};
use burn_common::network::downloader::download_file_as_bytes;
use flate2::read::GzDecoder;
use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

// CVDF mirror of http://yann.lecun.com/exdb/mnist/
const URL: &str = "https://storage.googleapis.com/cvdf-datasets/mnist/";
const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";

/// Magic number of an IDX file holding unsigned bytes in 3 dimensions.
const IMAGES_MAGIC: u32 = 0x0000_0803;

pub const WIDTH: usize = 28;
pub const HEIGHT: usize = 28;

/// The 60,000 training digits.
pub fn train() -> Result<ImageDataset> {
    load(TRAIN_IMAGES)
}

fn load(name: &str) -> Result<ImageDataset> {
    let path = download(name, &cache_dir()?)?;
    let bytes = std::fs::read(&path).map_err(|e| Error::io(&path, e))?;
    let items = parse_images(&bytes, name)?
        .into_iter()
        .map(|pixels| ImageItem::new(pixels, 1, HEIGHT, WIDTH))
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(name, items = items.len(), "loaded mnist images");
    ImageDataset::from_items(items, name)
}

fn cache_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        Error::io(
            "~",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no home directory"),
        )
    })?;
    Ok(home.join(".cache").join("dcgan").join("mnist"))
}

/// Downloads and decompresses `name` into `dest_dir` unless it is already there.
fn download(name: &str, dest_dir: &Path) -> Result<PathBuf> {
    let file_name = dest_dir.join(name);
    if file_name.exists() {
        return Ok(file_name);
    }
    create_dir_all(dest_dir).map_err(|e| Error::io(dest_dir, e))?;

    tracing::info!(url = %format!("{URL}{name}.gz"), "downloading");
    let bytes = download_file_as_bytes(&format!("{URL}{name}.gz"), name);

    // decompress next to the target first, so an interrupted write isn't taken as cached
    let partial = file_name.with_extension("partial");
    let mut output_file = File::create(&partial).map_err(|e| Error::io(&partial, e))?;
    let mut gz_buffer = GzDecoder::new(&bytes[..]);
    std::io::copy(&mut gz_buffer, &mut output_file).map_err(|e| Error::io(&partial, e))?;
    std::fs::rename(&partial, &file_name).map_err(|e| Error::io(&file_name, e))?;

    Ok(file_name)
}

/// Splits an IDX3 image file into one byte vector per image.
///
/// Header: magic (u32), count (u32), rows (u32), cols (u32), all big-endian.
pub fn parse_images(bytes: &[u8], name: &str) -> Result<Vec<Vec<u8>>> {
    let malformed = |reason: String| Error::Idx {
        name: name.to_owned(),
        reason,
    };
    let header = |i: usize| -> Result<u32> {
        bytes
            .get(i * 4..i * 4 + 4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| malformed(format!("truncated header ({} bytes)", bytes.len())))
    };

    let magic = header(0)?;
    if magic != IMAGES_MAGIC {
        return Err(malformed(format!("unexpected magic number {magic:#010x}")));
    }
    let count = header(1)? as usize;
    let rows = header(2)? as usize;
    let cols = header(3)? as usize;
    if (rows, cols) != (HEIGHT, WIDTH) {
        return Err(malformed(format!("images are {rows}x{cols}, expected 28x28")));
    }

    let body = &bytes[16..];
    if body.len() != count * rows * cols {
        return Err(malformed(format!(
            "{count} images need {} bytes, found {}",
            count * rows * cols,
            body.len()
        )));
    }

    Ok(body.chunks(rows * cols).map(|chunk| chunk.to_vec()).collect())
}
