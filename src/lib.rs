pub mod artifacts;
pub mod backend;
pub mod data;
pub mod error;
pub mod gan;
pub mod inference;
pub mod model;
pub mod samples;
pub mod training;

pub mod prelude {
    pub use crate::artifacts::Artifacts;
    pub use crate::data::{DatasetKind, ImageDataset};
    pub use crate::error::{Error, Result};
    pub use crate::gan::{GanLoss, GanLossConfig};
    pub use crate::model::*;
    pub use crate::training::{GanTrainer, LossHistory, LossRecord, TrainingConfig};
}

pub mod utils;
