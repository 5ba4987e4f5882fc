//! Training images and their batching.

pub mod batcher;
pub mod image_folder;
pub mod mnist;

use crate::error::{Error, Result};
use burn_dataset::{Dataset, InMemDataset};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

pub use batcher::{GanBatcher, ImageBatch};

/// The image sets the networks are shaped for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetKind {
    /// Handwritten digits, 28x28 grayscale.
    Mnist,
    /// House numbers, 32x32 RGB.
    Svhn,
}

impl DatasetKind {
    pub fn image_size(&self) -> usize {
        match self {
            DatasetKind::Mnist => mnist::WIDTH,
            DatasetKind::Svhn => 32,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            DatasetKind::Mnist => 1,
            DatasetKind::Svhn => 3,
        }
    }
}

impl FromStr for DatasetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mnist" => Ok(DatasetKind::Mnist),
            "svhn" => Ok(DatasetKind::Svhn),
            _ => Err(Error::UnknownDataset(s.to_owned())),
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetKind::Mnist => f.write_str("mnist"),
            DatasetKind::Svhn => f.write_str("svhn"),
        }
    }
}

/// A single training image.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ImageItem {
    /// Raw brightness values in `[0, 255]`.
    ///
    /// # Shape
    /// [channels * height * width], channel-major
    pub pixels: Vec<u8>,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ImageItem {
    pub fn new(pixels: Vec<u8>, channels: usize, height: usize, width: usize) -> Result<Self> {
        if pixels.len() != channels * height * width {
            return Err(Error::Shape(format!(
                "expected {channels}x{height}x{width} pixels, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            pixels,
            channels,
            height,
            width,
        })
    }
}

/// In-memory set of same-shaped images.
pub struct ImageDataset {
    dataset: InMemDataset<ImageItem>,
    shape: [usize; 3],
}

impl Dataset<ImageItem> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl ImageDataset {
    /// Rejects empty sets and images that don't share one shape.
    pub fn from_items(items: Vec<ImageItem>, name: &str) -> Result<Self> {
        let first = items
            .first()
            .ok_or_else(|| Error::EmptyDataset(name.to_owned()))?;
        let shape = [first.channels, first.height, first.width];
        if let Some(odd) = items
            .iter()
            .find(|item| [item.channels, item.height, item.width] != shape)
        {
            return Err(Error::Shape(format!(
                "{name}: image of shape {:?} in a set of {shape:?}",
                [odd.channels, odd.height, odd.width]
            )));
        }
        Ok(Self {
            dataset: InMemDataset::new(items),
            shape,
        })
    }

    /// `[channels, height, width]` of every image.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Training split of the given kind.
    ///
    /// MNIST is downloaded on first use. SVHN images are read from `data_dir`,
    /// which must hold the already extracted image files.
    pub fn load(kind: DatasetKind, data_dir: Option<&Path>) -> Result<Self> {
        match kind {
            DatasetKind::Mnist => mnist::train(),
            DatasetKind::Svhn => {
                let dir = data_dir.ok_or_else(|| Error::MissingDataDir(kind.to_string()))?;
                image_folder::load(dir, kind.image_size())
            }
        }
    }
}
