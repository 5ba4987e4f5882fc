use crate::artifacts::{
    Artifacts, DISCRIMINATOR_NAME, DISCRIMINATOR_OPTIM_NAME, GENERATOR_NAME, GENERATOR_OPTIM_NAME,
};
use crate::data::{DatasetKind, GanBatcher, ImageBatch, ImageDataset};
use crate::error::{Error, Result};
use crate::gan::{GanLoss, GanLossConfig};
use crate::model::{Discriminator, DiscriminatorConfig, Generator, GeneratorConfig};
use crate::samples;
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::module::AutodiffModule;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer, adaptor::OptimizerAdaptor};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{Distribution, ElementConversion};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Config, Debug)]
pub struct TrainingConfig {
    pub dataset: DatasetKind,
    pub generator: GeneratorConfig,
    pub discriminator: DiscriminatorConfig,
    pub optimizer: AdamConfig,
    #[config(default = "GanLossConfig::new()")]
    pub loss: GanLossConfig,
    #[config(default = 25)]
    pub num_epochs: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    #[config(default = 2)]
    pub num_workers: usize,
    #[config(default = 2e-4)]
    pub lr: f64,
    #[config(default = 0)]
    pub seed: u64,
    /// Steps between loss reports.
    #[config(default = 10)]
    pub print_every: usize,
    /// Steps between rendered sample grids.
    #[config(default = 100)]
    pub show_every: usize,
    /// Size of the fixed latent batch rendered during training.
    #[config(default = 72)]
    pub num_samples: usize,
    #[config(default = 12)]
    pub sample_columns: usize,
    /// Stops a training call after it has taken this many steps, across epochs.
    #[config(default = "None")]
    pub max_steps: Option<usize>,
}

/// Adam with `beta_1 = 0.5`, as in the DCGAN paper.
pub fn optimizer_config<AutoB: AutodiffBackend>() -> AdamConfig {
    AdamConfig::new()
        .with_beta_1(0.5)
        .with_epsilon(crate::utils::div_eps_f32::<AutoB>())
}

impl TrainingConfig {
    /// Networks shaped for `kind`, with the usual DCGAN hyperparameters.
    pub fn for_dataset<AutoB: AutodiffBackend>(kind: DatasetKind) -> Self {
        let (generator, discriminator) = match kind {
            DatasetKind::Mnist => (GeneratorConfig::mnist(), DiscriminatorConfig::mnist()),
            DatasetKind::Svhn => (GeneratorConfig::svhn(), DiscriminatorConfig::svhn()),
        };
        Self::new(kind, generator, discriminator, optimizer_config::<AutoB>())
    }

    /// Checks that the networks can be built, that they agree with each other and with
    /// the images `[channels, height, width]`, and that the loop settings are usable.
    pub fn validate(&self, image_shape: [usize; 3]) -> Result<()> {
        self.generator.check()?;
        self.discriminator.check()?;
        self.loss.check()?;

        let [channels, height, width] = image_shape;
        let generated = [
            self.generator.channels,
            self.generator.image_size(),
            self.generator.image_size(),
        ];
        let scored = [
            self.discriminator.channels,
            self.discriminator.image_size,
            self.discriminator.image_size,
        ];
        if generated != image_shape || scored != image_shape {
            return Err(Error::Shape(format!(
                "images are {channels}x{height}x{width}, \
                 the generator makes {generated:?} and the discriminator scores {scored:?}"
            )));
        }
        let positive = [
            (self.batch_size, "batch_size"),
            (self.print_every, "print_every"),
            (self.show_every, "show_every"),
            (self.sample_columns, "sample_columns"),
        ];
        if let Some((_, name)) = positive.iter().find(|(value, _)| *value == 0) {
            return Err(Error::Shape(format!("{name} must be positive")));
        }
        Ok(())
    }
}

/// Losses of one adversarial step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLosses {
    pub discriminator: f32,
    pub generator: f32,
}

/// A reported point of the loss history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    pub epoch: usize,
    pub step: usize,
    pub discriminator: f32,
    pub generator: f32,
}

/// Loss history of a run, carried across resumed training calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossHistory {
    /// Adversarial steps taken so far.
    pub steps: usize,
    /// Epochs completed so far.
    pub epochs: usize,
    pub records: Vec<LossRecord>,
}

/// Both networks and their optimizers.
pub struct GanTrainer<B: AutodiffBackend> {
    pub generator: Generator<B>,
    pub discriminator: Discriminator<B>,
    generator_optim: OptimizerAdaptor<Adam, Generator<B>, B>,
    discriminator_optim: OptimizerAdaptor<Adam, Discriminator<B>, B>,
    loss: GanLoss,
    lr: f64,
}

impl<B: AutodiffBackend> GanTrainer<B> {
    /// Freshly initialized networks and optimizers.
    pub fn new(config: &TrainingConfig, device: &B::Device) -> Self {
        Self {
            generator: config.generator.init(device),
            discriminator: config.discriminator.init(device),
            generator_optim: config.optimizer.init::<B, Generator<B>>(),
            discriminator_optim: config.optimizer.init::<B, Discriminator<B>>(),
            loss: config.loss.init(),
            lr: config.lr,
        }
    }

    /// Resumes from the records in `artifacts`, initializing whatever was never saved.
    pub fn load_or_init(
        config: &TrainingConfig,
        artifacts: &Artifacts,
        device: &B::Device,
    ) -> Result<Self> {
        let mut trainer = Self::new(config, device);

        if let Some(generator) =
            artifacts.load_module::<B, _>(GENERATOR_NAME, trainer.generator.clone(), device)?
        {
            trainer.generator = generator;
        }
        if let Some(discriminator) = artifacts.load_module::<B, _>(
            DISCRIMINATOR_NAME,
            trainer.discriminator.clone(),
            device,
        )? {
            trainer.discriminator = discriminator;
        }
        if let Some(optim) = artifacts.load_optim::<B, Generator<B>, _>(
            GENERATOR_OPTIM_NAME,
            config.optimizer.init::<B, Generator<B>>(),
            device,
        )? {
            trainer.generator_optim = optim;
        }
        if let Some(optim) = artifacts.load_optim::<B, Discriminator<B>, _>(
            DISCRIMINATOR_OPTIM_NAME,
            config.optimizer.init::<B, Discriminator<B>>(),
            device,
        )? {
            trainer.discriminator_optim = optim;
        }

        Ok(trainer)
    }

    /// Saves both networks and both optimizer states.
    pub fn save(&self, artifacts: &Artifacts) -> Result<()> {
        artifacts.save_module(GENERATOR_NAME, &self.generator)?;
        artifacts.save_module(DISCRIMINATOR_NAME, &self.discriminator)?;
        artifacts.save_optim(GENERATOR_OPTIM_NAME, &self.generator_optim)?;
        artifacts.save_optim(DISCRIMINATOR_OPTIM_NAME, &self.discriminator_optim)
    }

    /// Uniform latent vectors in `[-1, 1]`.
    pub fn latent(&self, batch_size: usize, device: &B::Device) -> Tensor<B, 2> {
        Tensor::random(
            [batch_size, self.generator.latent_size()],
            Distribution::Uniform(-1., 1.),
            device,
        )
    }

    /// Updates the discriminator on a real batch and fakes made from `z`.
    ///
    /// The fakes are detached, so the generator receives no gradient.
    pub fn discriminator_step(&mut self, real: Tensor<B, 4>, z: Tensor<B, 2>) -> f32 {
        let fake = self.generator.forward(z).detach();
        let real_logits = self.discriminator.forward(real);
        let fake_logits = self.discriminator.forward(fake);
        let loss = self.loss.discriminator(real_logits, fake_logits).total;
        let value = loss.clone().into_scalar().elem::<f32>();

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.discriminator);
        self.discriminator =
            self.discriminator_optim
                .step(self.lr, self.discriminator.clone(), grads);
        value
    }

    /// Updates the generator so that the discriminator scores its fakes from `z` as real.
    ///
    /// Only the generator parameters are stepped.
    pub fn generator_step(&mut self, z: Tensor<B, 2>) -> f32 {
        let fake = self.generator.forward(z);
        let loss = self.loss.generator(self.discriminator.forward(fake));
        let value = loss.clone().into_scalar().elem::<f32>();

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.generator);
        self.generator = self
            .generator_optim
            .step(self.lr, self.generator.clone(), grads);
        value
    }

    /// One adversarial step: a discriminator update, then a generator update
    /// against the updated discriminator, both from the same latent batch.
    pub fn step(&mut self, real: Tensor<B, 4>) -> StepLosses {
        let [batch_size, _, _, _] = real.dims();
        let z = self.latent(batch_size, &real.device());
        let discriminator = self.discriminator_step(real, z.clone());
        let generator = self.generator_step(z);
        StepLosses {
            discriminator,
            generator,
        }
    }

    /// Images from `z` with the generator in evaluation mode.
    ///
    /// # Shapes
    ///   - Input [n, latent_size]
    ///   - Output [n, channels, image_size, image_size]
    pub fn sample(&self, z: Tensor<B::InnerBackend, 2>) -> Tensor<B::InnerBackend, 4> {
        self.generator.valid().forward(z)
    }
}

type Dataloader<B> = Arc<dyn DataLoader<B, ImageBatch<B>> + 'static>;

/// Trains on `dataset` for `num_epochs` more epochs, resuming from and saving into `artifacts`.
///
/// Step and epoch numbers continue from the loss history saved by earlier calls.
/// Returns the whole history, earlier calls included.
pub fn train<B: AutodiffBackend>(
    config: &TrainingConfig,
    dataset: ImageDataset,
    artifacts: &Artifacts,
    device: B::Device,
) -> Result<LossHistory> {
    config.validate(dataset.shape())?;
    B::seed(&device, config.seed);

    let mut trainer = GanTrainer::<B>::load_or_init(config, artifacts, &device)?;
    let mut history: LossHistory = artifacts.load_losses()?.unwrap_or_default();
    if history.steps > 0 {
        tracing::info!(
            step = history.steps,
            epoch = history.epochs,
            "resuming from saved loss history"
        );
    }

    // drawn once so that the rendered grids are comparable across steps
    let fixed_z: Tensor<B::InnerBackend, 2> = Tensor::random(
        [config.num_samples, config.generator.latent_size],
        Distribution::Uniform(-1., 1.),
        &device,
    );

    let dataloader: Dataloader<B> = DataLoaderBuilder::new(GanBatcher::default())
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(dataset);
    let batches_per_epoch = dataloader.num_items().div_ceil(config.batch_size);
    let stop_at = config
        .max_steps
        .map_or(usize::MAX, |max_steps| history.steps + max_steps);
    let last_epoch = history.epochs + config.num_epochs;
    let columns = config.sample_columns.min(config.num_samples);

    tracing::info!(
        items = dataloader.num_items(),
        epochs = config.num_epochs,
        "starting training"
    );

    'epochs: for epoch in history.epochs + 1..last_epoch + 1 {
        for (b, batch) in dataloader.iter().enumerate() {
            if history.steps >= stop_at {
                break 'epochs;
            }
            history.steps += 1;
            let step = history.steps;
            let losses = trainer.step(batch.images);

            if step % config.print_every == 0 {
                tracing::info!(
                    "Epoch {epoch}/{last_epoch}, Batch {:0>4}/{batches_per_epoch}, Discriminator Loss {:.4}, Generator Loss {:.4}",
                    b + 1,
                    losses.discriminator,
                    losses.generator,
                );
                history.records.push(LossRecord {
                    epoch,
                    step,
                    discriminator: losses.discriminator,
                    generator: losses.generator,
                });
            }

            if step % config.show_every == 0 && config.num_samples > 0 {
                let path = artifacts
                    .samples_dir()
                    .join(format!("step_{step:06}.png"));
                samples::save_grid(trainer.sample(fixed_z.clone()), columns, &path)?;
                tracing::info!(path = ?path, "rendered samples");
            }
        }

        history.epochs = epoch;
        trainer.save(artifacts)?;
        artifacts.save_losses(&history)?;
        tracing::info!(epoch, step = history.steps, "epoch finished, saved checkpoint");
    }

    trainer.save(artifacts)?;
    artifacts.save_losses(&history)?;
    tracing::info!(step = history.steps, "training finished");

    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ImageItem;
    use burn::backend::{Autodiff, NdArray};
    use temp_dir::TempDir;

    type B = Autodiff<NdArray<f32>>;

    fn tiny_config() -> TrainingConfig {
        TrainingConfig::new(
            DatasetKind::Mnist,
            GeneratorConfig::new(2, vec![4, 2], 1).with_latent_size(4),
            DiscriminatorConfig::new(8, 1).with_filters(vec![2, 4]),
            optimizer_config::<B>(),
        )
        .with_batch_size(4)
        .with_num_workers(1)
        .with_lr(1e-2)
        .with_num_samples(4)
        .with_sample_columns(2)
    }

    fn tiny_dataset(n: usize) -> ImageDataset {
        let items = (0..n)
            .map(|i| ImageItem::new(vec![(i * 31 % 256) as u8; 64], 1, 8, 8).unwrap())
            .collect();
        ImageDataset::from_items(items, "tiny").unwrap()
    }

    fn weights<const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn presets_fit_their_datasets() {
        let mnist = TrainingConfig::for_dataset::<B>(DatasetKind::Mnist);
        assert!(mnist.validate([1, 28, 28]).is_ok());
        let svhn = TrainingConfig::for_dataset::<B>(DatasetKind::Svhn);
        assert!(svhn.validate([3, 32, 32]).is_ok());
        assert!(matches!(svhn.validate([1, 28, 28]), Err(Error::Shape(_))));

        let optimizer = serde_json::to_value(&mnist.optimizer).unwrap();
        assert_eq!(optimizer["beta_1"], 0.5);
    }

    #[test]
    fn unbuildable_networks_fail_validation() {
        let empty = TrainingConfig {
            discriminator: DiscriminatorConfig::new(8, 1).with_filters(vec![]),
            ..tiny_config()
        };
        assert!(matches!(empty.validate([1, 8, 8]), Err(Error::Shape(m)) if m.contains("filter")));

        let even = TrainingConfig {
            generator: GeneratorConfig::new(2, vec![4, 2], 1)
                .with_latent_size(4)
                .with_kernel_size(4),
            ..tiny_config()
        };
        assert!(matches!(even.validate([1, 8, 8]), Err(Error::Shape(m)) if m.contains("kernel_size")));

        let no_columns = tiny_config().with_sample_columns(0);
        assert!(matches!(no_columns.validate([1, 8, 8]), Err(Error::Shape(m)) if m.contains("sample_columns")));

        let full_smoothing = tiny_config().with_loss(GanLossConfig::new().with_smooth(1.));
        assert!(full_smoothing.validate([1, 8, 8]).is_err());
    }

    #[test]
    fn train_reports_unbuildable_networks_as_errors() {
        let tmp = TempDir::new().unwrap();
        let artifacts = Artifacts::create::<B>(tmp.path(), false).unwrap();
        let config = TrainingConfig {
            discriminator: DiscriminatorConfig::new(8, 1).with_filters(vec![]),
            ..tiny_config()
        };
        assert!(matches!(
            train::<B>(&config, tiny_dataset(4), &artifacts, Default::default()),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn discriminator_step_leaves_the_generator_alone() {
        let device = Default::default();
        let mut trainer = GanTrainer::<B>::new(&tiny_config(), &device);
        let real = Tensor::<B, 4>::random([4, 1, 8, 8], Distribution::Uniform(-1., 1.), &device);
        let z = trainer.latent(4, &device);

        let generator_before = weights(trainer.generator.project.weight.val());
        let head_before = weights(trainer.discriminator.head.weight.val());
        let loss = trainer.discriminator_step(real, z);

        assert!(loss.is_finite());
        assert_eq!(generator_before, weights(trainer.generator.project.weight.val()));
        assert_ne!(head_before, weights(trainer.discriminator.head.weight.val()));
    }

    #[test]
    fn generator_step_leaves_the_discriminator_alone() {
        let device = Default::default();
        let mut trainer = GanTrainer::<B>::new(&tiny_config(), &device);
        let z = trainer.latent(4, &device);

        let generator_before = weights(trainer.generator.project.weight.val());
        let head_before = weights(trainer.discriminator.head.weight.val());
        let loss = trainer.generator_step(z);

        assert!(loss.is_finite());
        assert_ne!(generator_before, weights(trainer.generator.project.weight.val()));
        assert_eq!(head_before, weights(trainer.discriminator.head.weight.val()));
    }

    #[test]
    fn samples_come_from_the_inner_backend() {
        let device = Default::default();
        let trainer = GanTrainer::<B>::new(&tiny_config(), &device);
        let z = Tensor::<NdArray<f32>, 2>::zeros([3, 4], &device);
        assert_eq!(trainer.sample(z).dims(), [3, 1, 8, 8]);
    }

    #[test]
    fn short_run_saves_checkpoints_samples_and_losses() {
        let tmp = TempDir::new().unwrap();
        let artifacts = Artifacts::create::<B>(tmp.path(), false).unwrap();
        let config = tiny_config()
            .with_num_epochs(3)
            .with_print_every(1)
            .with_show_every(2)
            .with_max_steps(Some(5));

        // 10 items in batches of 4: 3 batches per epoch, cut at step 5
        let history = train::<B>(&config, tiny_dataset(10), &artifacts, Default::default()).unwrap();
        assert_eq!(history.steps, 5);
        // the second epoch was cut short
        assert_eq!(history.epochs, 1);
        assert_eq!(history.records.len(), 5);
        assert_eq!(history.records.last().unwrap().step, 5);
        assert_eq!(history.records.last().unwrap().epoch, 2);
        assert!(
            history
                .records
                .iter()
                .all(|r| r.discriminator.is_finite() && r.generator.is_finite())
        );

        assert!(artifacts.samples_dir().join("step_000002.png").exists());
        assert!(artifacts.samples_dir().join("step_000004.png").exists());
        assert!(!artifacts.samples_dir().join("step_000005.png").exists());
        for name in [
            GENERATOR_NAME,
            DISCRIMINATOR_NAME,
            GENERATOR_OPTIM_NAME,
            DISCRIMINATOR_OPTIM_NAME,
        ] {
            assert!(artifacts.record_path::<B>(name).exists(), "{name}");
        }
        let saved: LossHistory = serde_json::from_str(
            &std::fs::read_to_string(artifacts.dir().join(crate::artifacts::LOSSES_NAME)).unwrap(),
        )
        .unwrap();
        assert_eq!(saved, history);
        // the caller owns the config file
        assert!(!artifacts.training_config_path().exists());
    }

    #[test]
    fn second_call_continues_steps_epochs_and_history() {
        let tmp = TempDir::new().unwrap();
        let artifacts = Artifacts::create::<B>(tmp.path(), false).unwrap();
        let config = tiny_config()
            .with_num_epochs(1)
            .with_print_every(1)
            .with_show_every(2);

        // 8 items in batches of 4: 2 steps per call
        let first = train::<B>(&config, tiny_dataset(8), &artifacts, Default::default()).unwrap();
        assert_eq!((first.steps, first.epochs), (2, 1));

        let second = train::<B>(&config, tiny_dataset(8), &artifacts, Default::default()).unwrap();
        assert_eq!((second.steps, second.epochs), (4, 2));
        let steps: Vec<usize> = second.records.iter().map(|r| r.step).collect();
        let epochs: Vec<usize> = second.records.iter().map(|r| r.epoch).collect();
        assert_eq!(steps, vec![1, 2, 3, 4]);
        assert_eq!(epochs, vec![1, 1, 2, 2]);
        assert_eq!(second.records[..2], first.records[..]);

        assert_eq!(artifacts.load_losses::<LossHistory>().unwrap(), Some(second));
        assert!(artifacts.samples_dir().join("step_000002.png").exists());
        assert!(artifacts.samples_dir().join("step_000004.png").exists());
    }

    #[test]
    fn max_steps_counts_from_the_resumed_step() {
        let tmp = TempDir::new().unwrap();
        let artifacts = Artifacts::create::<B>(tmp.path(), false).unwrap();
        let config = tiny_config().with_num_epochs(5).with_max_steps(Some(3));

        let first = train::<B>(&config, tiny_dataset(8), &artifacts, Default::default()).unwrap();
        assert_eq!(first.steps, 3);
        let second = train::<B>(&config, tiny_dataset(8), &artifacts, Default::default()).unwrap();
        assert_eq!(second.steps, 6);
    }

    #[test]
    fn sample_grid_has_no_empty_columns() {
        let tmp = TempDir::new().unwrap();
        let artifacts = Artifacts::create::<B>(tmp.path(), false).unwrap();
        let config = tiny_config()
            .with_num_samples(2)
            .with_sample_columns(12)
            .with_show_every(1)
            .with_max_steps(Some(1));

        train::<B>(&config, tiny_dataset(4), &artifacts, Default::default()).unwrap();
        let grid = image::open(artifacts.samples_dir().join("step_000001.png")).unwrap();
        // two 8x8 cells and a 1px gap
        assert_eq!((grid.width(), grid.height()), (17, 8));
    }

    #[test]
    fn resume_restores_both_networks_and_optimizers() {
        let tmp = TempDir::new().unwrap();
        let artifacts = Artifacts::create::<B>(tmp.path(), false).unwrap();
        let device = Default::default();
        let config = tiny_config();
        let real = Tensor::<B, 4>::random([4, 1, 8, 8], Distribution::Uniform(-1., 1.), &device);

        // one step so that both Adam states hold moments
        let mut trained = GanTrainer::<B>::new(&config, &device);
        trained.step(real.clone());
        trained.save(&artifacts).unwrap();

        let mut resumed = GanTrainer::<B>::load_or_init(&config, &artifacts, &device).unwrap();
        assert_eq!(
            weights(trained.generator.project.weight.val()),
            weights(resumed.generator.project.weight.val())
        );
        assert_eq!(
            weights(trained.discriminator.head.weight.val()),
            weights(resumed.discriminator.head.weight.val())
        );

        // same latent draws: a restored trainer takes exactly the same next step
        B::seed(&device, 7);
        let trained_losses = trained.step(real.clone());
        B::seed(&device, 7);
        let resumed_losses = resumed.step(real);
        assert_eq!(trained_losses, resumed_losses);
        assert_eq!(
            weights(trained.generator.project.weight.val()),
            weights(resumed.generator.project.weight.val())
        );
        assert_eq!(
            weights(trained.discriminator.head.weight.val()),
            weights(resumed.discriminator.head.weight.val())
        );
    }

    #[test]
    fn mismatched_dataset_is_rejected_before_training() {
        let tmp = TempDir::new().unwrap();
        let artifacts = Artifacts::create::<B>(tmp.path(), false).unwrap();
        let items = vec![ImageItem::new(vec![0; 3 * 64], 3, 8, 8).unwrap()];
        let dataset = ImageDataset::from_items(items, "rgb").unwrap();
        assert!(matches!(
            train::<B>(&tiny_config(), dataset, &artifacts, Default::default()),
            Err(Error::Shape(_))
        ));
    }
}
