use burn::nn::conv::{ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Initializer, LeakyRelu, LeakyReluConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::tanh;

use crate::error::{Error, Result};

#[derive(Config, Debug)]
pub struct GeneratorConfig {
    /// Size of the latent vector `z`.
    #[config(default = 100)]
    pub latent_size: usize,

    /// Spatial side of the first feature map, right after the dense projection.
    pub base_size: usize,

    /// Channels of the first feature map, followed by the channels of each
    /// intermediate upsampling stage.
    ///
    /// Every entry after the first adds a stride-2 stage, and the output
    /// stage adds one more, so the image side is `base_size * 2^filters.len()`.
    pub filters: Vec<usize>,

    /// Output image channels.
    pub channels: usize,

    #[config(default = 5)]
    pub kernel_size: usize,

    /// Leaky ReLU slope for negative inputs.
    #[config(default = 0.2)]
    pub negative_slope: f64,

    /// Standard deviation of the normal weight initializer.
    #[config(default = 0.02)]
    pub init_std: f64,
}

impl GeneratorConfig {
    /// 100 -> 7x7x256 -> 14x14x128 -> 28x28x1.
    pub fn mnist() -> Self {
        Self::new(7, vec![256, 128], 1)
    }

    /// 100 -> 4x4x512 -> 8x8x256 -> 16x16x128 -> 32x32x3.
    pub fn svhn() -> Self {
        Self::new(4, vec![512, 256, 128], 3)
    }

    /// Side of the generated (square) images.
    pub fn image_size(&self) -> usize {
        self.base_size << self.filters.len()
    }

    /// Checks the invariants [`init`](Self::init) relies on.
    pub fn check(&self) -> Result<()> {
        let checks = [
            (self.latent_size > 0, "latent_size must be positive"),
            (self.base_size > 0, "base_size must be positive"),
            (self.channels > 0, "channels must be positive"),
            (!self.filters.is_empty(), "at least one filter count is required"),
            (self.filters.iter().all(|&f| f > 0), "filter counts must be positive"),
            (self.kernel_size % 2 == 1, "kernel_size must be odd"),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, problem)) => Err(Error::Shape(format!("generator: {problem}"))),
            None => Ok(()),
        }
    }

    /// Returns the initialized model.
    ///
    /// # Panics
    /// If [`check`](Self::check) fails.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        if let Err(e) = self.check() {
            panic!("{e}");
        }

        let initializer = Initializer::Normal {
            mean: 0.,
            std: self.init_std,
        };
        let first = self.filters[0];

        let project = LinearConfig::new(self.latent_size, first * self.base_size * self.base_size)
            .with_initializer(initializer.clone())
            .init(device);
        let project_norm = BatchNormConfig::new(first).init(device);

        let stages = self
            .filters
            .windows(2)
            .map(|pair| UpStage {
                conv: self.upsample(pair[0], pair[1]).init(device),
                norm: BatchNormConfig::new(pair[1]).init(device),
            })
            .collect();

        let last = *self.filters.last().unwrap_or(&first);
        let output = self.upsample(last, self.channels).init(device);

        Generator {
            project,
            project_norm,
            stages,
            output,
            activation: LeakyReluConfig::new()
                .with_negative_slope(self.negative_slope)
                .init(),
            base_size: self.base_size,
        }
    }

    /// Stride-2 transposed convolution that exactly doubles the spatial side.
    fn upsample(&self, channels_in: usize, channels_out: usize) -> ConvTranspose2dConfig {
        let padding = (self.kernel_size - 1) / 2;
        ConvTranspose2dConfig::new(
            [channels_in, channels_out],
            [self.kernel_size, self.kernel_size],
        )
        .with_stride([2, 2])
        .with_padding([padding, padding])
        .with_padding_out([1, 1])
        .with_initializer(Initializer::Normal {
            mean: 0.,
            std: self.init_std,
        })
    }
}

#[derive(Module, Debug)]
pub struct UpStage<B: Backend> {
    pub conv: ConvTranspose2d<B>,
    pub norm: BatchNorm<B>,
}

#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    /// Input channel: latent size.
    /// Output channel: `filters[0] * base_size²`.
    pub project: Linear<B>,
    pub project_norm: BatchNorm<B>,
    pub stages: Vec<UpStage<B>>,
    pub output: ConvTranspose2d<B>,
    pub activation: LeakyRelu,
    pub base_size: usize,
}

impl<B: Backend> Generator<B> {
    pub fn latent_size(&self) -> usize {
        let [latent_size, _] = self.project.weight.dims();
        latent_size
    }

    /// Image values before the `tanh` squashing.
    ///
    /// # Shapes
    ///   - Input [batch, latent_size]
    ///   - Output [batch, channels, image_size, image_size]
    pub fn logits(&self, z: Tensor<B, 2>) -> Tensor<B, 4> {
        let [batch, _latent] = z.dims();
        let [_, projected] = self.project.weight.dims();
        let side = self.base_size;
        let filters = projected / (side * side);

        let x = self.project.forward(z).reshape([batch, filters, side, side]);
        let x = self.activation.forward(self.project_norm.forward(x));

        let x = self.stages.iter().fold(x, |x, stage| {
            let x = stage.norm.forward(stage.conv.forward(x));
            self.activation.forward(x)
        });

        self.output.forward(x)
    }

    /// Generated images in `[-1, 1]`.
    ///
    /// # Shapes
    ///   - Input [batch, latent_size]
    ///   - Output [batch, channels, image_size, image_size]
    pub fn forward(&self, z: Tensor<B, 2>) -> Tensor<B, 4> {
        tanh(self.logits(z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray<f32>;

    #[test]
    fn presets_match_the_dataset_sides() {
        assert_eq!(GeneratorConfig::mnist().image_size(), 28);
        assert_eq!(GeneratorConfig::svhn().image_size(), 32);
    }

    #[test]
    fn forward_shapes_and_range() {
        let device = Default::default();
        let config = GeneratorConfig::new(2, vec![8, 4], 3).with_latent_size(6);
        let generator = config.init::<B>(&device);
        assert_eq!(generator.latent_size(), 6);

        let z = Tensor::<B, 2>::random([5, 6], Distribution::Uniform(-1., 1.), &device);
        let images = generator.forward(z);
        assert_eq!(images.dims(), [5, 3, 8, 8]);

        let values = images.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn single_filter_generator_upsamples_once() {
        let device = Default::default();
        let config = GeneratorConfig::new(3, vec![4], 1).with_latent_size(2);
        let generator = config.init::<B>(&device);
        assert!(generator.stages.is_empty());
        let z = Tensor::<B, 2>::zeros([2, 2], &device);
        assert_eq!(generator.logits(z).dims(), [2, 1, 6, 6]);
    }

    #[test]
    #[should_panic(expected = "at least one filter count")]
    fn rejects_empty_filters() {
        GeneratorConfig::new(4, vec![], 1).init::<B>(&Default::default());
    }

    #[test]
    fn check_reports_the_broken_field() {
        assert!(GeneratorConfig::mnist().check().is_ok());
        let even = GeneratorConfig::new(4, vec![8], 1).with_kernel_size(4);
        assert!(matches!(even.check(), Err(Error::Shape(m)) if m.contains("kernel_size")));
        let no_latent = GeneratorConfig::new(4, vec![8], 1).with_latent_size(0);
        assert!(matches!(no_latent.check(), Err(Error::Shape(m)) if m.contains("latent_size")));
        let zero_filter = GeneratorConfig::new(4, vec![8, 0], 1);
        assert!(zero_filter.check().is_err());
    }
}
