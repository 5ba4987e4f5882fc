use crate::artifacts::{Artifacts, GENERATOR_NAME};
use crate::error::{Error, Result};
use crate::model::Generator;
use crate::samples;
use crate::training::TrainingConfig;
use burn::prelude::*;
use burn::tensor::Distribution;
use std::path::PathBuf;

pub const GENERATED_NAME: &str = "generated.png";

/// Loads the trained generator saved in `artifacts`.
pub fn load_generator<B: Backend>(
    config: &TrainingConfig,
    artifacts: &Artifacts,
    device: &B::Device,
) -> Result<Generator<B>> {
    config.generator.check()?;
    let init = config.generator.init::<B>(device);
    artifacts
        .load_module::<B, _>(GENERATOR_NAME, init, device)?
        .ok_or_else(|| Error::MissingRecord {
            what: GENERATOR_NAME,
            path: artifacts.record_path::<B>(GENERATOR_NAME),
        })
}

/// Generates `count` images from random latent vectors.
///
/// # Shapes
///   - Output [count, channels, image_size, image_size]
pub fn generate<B: Backend>(generator: &Generator<B>, count: usize, device: &B::Device) -> Tensor<B, 4> {
    let z = Tensor::random(
        [count, generator.latent_size()],
        Distribution::Uniform(-1., 1.),
        device,
    );
    generator.forward(z)
}

/// Generates `count` images with the saved generator and writes them as one grid.
///
/// Returns the path of the written image.
pub fn infer<B: Backend>(
    config: &TrainingConfig,
    artifacts: &Artifacts,
    count: usize,
    device: B::Device,
) -> Result<PathBuf> {
    B::seed(&device, config.seed);
    let generator = load_generator::<B>(config, artifacts, &device)?;
    let images = generate(&generator, count, &device);

    let path = artifacts.dir().join(GENERATED_NAME);
    samples::save_grid(images, config.sample_columns.min(count.max(1)), &path)?;
    tracing::info!(path = ?path, count, "generated images");
    Ok(path)
}
