use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{
    BatchNorm, BatchNormConfig, Initializer, LeakyRelu, LeakyReluConfig, Linear, LinearConfig,
    PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;

use crate::error::{Error, Result};

#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    /// Side of the (square) input images.
    pub image_size: usize,

    /// Input image channels.
    pub channels: usize,

    /// Output channels of each stride-2 convolution stage.
    #[config(default = "vec![64, 128, 256]")]
    pub filters: Vec<usize>,

    #[config(default = 5)]
    pub kernel_size: usize,

    /// Leaky ReLU slope for negative inputs.
    #[config(default = 0.2)]
    pub negative_slope: f64,

    /// Standard deviation of the normal weight initializer.
    #[config(default = 0.02)]
    pub init_std: f64,
}

impl DiscriminatorConfig {
    /// 28x28x1 -> 14x14x64 -> 7x7x128 -> 4x4x256 -> 1.
    pub fn mnist() -> Self {
        Self::new(28, 1)
    }

    /// 32x32x3 -> 16x16x64 -> 8x8x128 -> 4x4x256 -> 1.
    pub fn svhn() -> Self {
        Self::new(32, 3)
    }

    /// Spatial side after the convolution stack.
    pub fn final_size(&self) -> usize {
        self.filters
            .iter()
            .fold(self.image_size, |side, _| side.div_ceil(2))
    }

    /// Number of features fed into the dense head.
    pub fn flat_size(&self) -> usize {
        let side = self.final_size();
        self.filters.last().copied().unwrap_or(self.channels) * side * side
    }

    /// Checks the invariants [`init`](Self::init) relies on.
    pub fn check(&self) -> Result<()> {
        let checks = [
            (self.image_size > 0, "image_size must be positive"),
            (self.channels > 0, "channels must be positive"),
            (!self.filters.is_empty(), "at least one filter count is required"),
            (self.filters.iter().all(|&f| f > 0), "filter counts must be positive"),
            (self.kernel_size % 2 == 1, "kernel_size must be odd"),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, problem)) => Err(Error::Shape(format!("discriminator: {problem}"))),
            None => Ok(()),
        }
    }

    /// Returns the initialized model.
    ///
    /// # Panics
    /// If [`check`](Self::check) fails.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Discriminator<B> {
        if let Err(e) = self.check() {
            panic!("{e}");
        }

        let initializer = Initializer::Normal {
            mean: 0.,
            std: self.init_std,
        };
        let padding = (self.kernel_size - 1) / 2;

        let mut channels_in = self.channels;
        let stages = self
            .filters
            .iter()
            .enumerate()
            .map(|(i, &channels_out)| {
                let conv = Conv2dConfig::new(
                    [channels_in, channels_out],
                    [self.kernel_size, self.kernel_size],
                )
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .with_initializer(initializer.clone())
                .init(device);
                channels_in = channels_out;
                DownStage {
                    conv,
                    // the first stage sees raw pixels and is left unnormalized
                    norm: (i > 0).then(|| BatchNormConfig::new(channels_out).init(device)),
                }
            })
            .collect();

        let head = LinearConfig::new(self.flat_size(), 1)
            .with_initializer(initializer)
            .init(device);

        Discriminator {
            stages,
            head,
            activation: LeakyReluConfig::new()
                .with_negative_slope(self.negative_slope)
                .init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct DownStage<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: Option<BatchNorm<B>>,
}

#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    pub stages: Vec<DownStage<B>>,
    /// Input channel: flattened features.
    /// Output channel: 1 logit.
    pub head: Linear<B>,
    pub activation: LeakyRelu,
}

impl<B: Backend> Discriminator<B> {
    /// Real-vs-fake logits.
    ///
    /// # Shapes
    ///   - Input [batch, channels, image_size, image_size]
    ///   - Output [batch, 1]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.stages.iter().fold(images, |x, stage| {
            let x = stage.conv.forward(x);
            let x = match &stage.norm {
                Some(norm) => norm.forward(x),
                None => x,
            };
            self.activation.forward(x)
        });
        let x: Tensor<B, 2> = x.flatten(1, 3);
        self.head.forward(x)
    }

    /// Probability of each image being real.
    ///
    /// # Shapes
    ///   - Input [batch, channels, image_size, image_size]
    ///   - Output [batch, 1]
    pub fn probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.forward(images))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray<f32>;

    #[test]
    fn flat_size_follows_ceil_halving() {
        assert_eq!(DiscriminatorConfig::mnist().final_size(), 4);
        assert_eq!(DiscriminatorConfig::mnist().flat_size(), 256 * 16);
        assert_eq!(DiscriminatorConfig::svhn().final_size(), 4);
        assert_eq!(
            DiscriminatorConfig::new(10, 1).with_filters(vec![3]).flat_size(),
            3 * 5 * 5
        );
    }

    #[test]
    fn check_rejects_empty_filters_and_even_kernels() {
        assert!(DiscriminatorConfig::svhn().check().is_ok());
        let empty = DiscriminatorConfig::new(8, 1).with_filters(vec![]);
        assert!(matches!(empty.check(), Err(Error::Shape(m)) if m.contains("filter")));
        let even = DiscriminatorConfig::new(8, 1).with_kernel_size(2);
        assert!(matches!(even.check(), Err(Error::Shape(m)) if m.contains("kernel_size")));
    }

    #[test]
    #[should_panic(expected = "channels must be positive")]
    fn init_panics_on_invalid_config() {
        DiscriminatorConfig::new(8, 0).init::<B>(&Default::default());
    }

    #[test]
    fn only_later_stages_are_normalized() {
        let device = Default::default();
        let discriminator = DiscriminatorConfig::new(8, 3)
            .with_filters(vec![4, 6])
            .init::<B>(&device);
        assert!(discriminator.stages[0].norm.is_none());
        assert!(discriminator.stages[1].norm.is_some());
    }

    #[test]
    fn scores_one_logit_per_image() {
        let device = Default::default();
        let discriminator = DiscriminatorConfig::new(7, 1)
            .with_filters(vec![4, 8])
            .init::<B>(&device);
        let images = Tensor::<B, 4>::random([3, 1, 7, 7], Distribution::Uniform(-1., 1.), &device);
        assert_eq!(discriminator.forward(images.clone()).dims(), [3, 1]);

        let probabilities = discriminator
            .probabilities(images)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    }
}
