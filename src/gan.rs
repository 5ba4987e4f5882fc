//! Adversarial loss of the DCGAN.

use crate::error::{Error, Result};
use crate::utils::loss::bce::BinaryCrossEntropyLoss;
use burn::prelude::*;

#[derive(Config, Debug)]
pub struct GanLossConfig {
    /// One-sided label smoothing: real images are labeled `1 - smooth`.
    #[config(default = 0.1)]
    pub smooth: f64,
}

impl GanLossConfig {
    pub fn check(&self) -> Result<()> {
        if (0.0..1.0).contains(&self.smooth) {
            Ok(())
        } else {
            Err(Error::Shape(format!(
                "loss: smooth must be in [0, 1), got {}",
                self.smooth
            )))
        }
    }

    /// # Panics
    /// If [`check`](Self::check) fails.
    pub fn init(&self) -> GanLoss {
        if let Err(e) = self.check() {
            panic!("{e}");
        }
        GanLoss {
            smooth: self.smooth,
            bce: BinaryCrossEntropyLoss,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GanLoss {
    pub smooth: f64,
    bce: BinaryCrossEntropyLoss,
}

/// Discriminator loss and its two halves.
#[derive(Clone, Debug)]
pub struct DiscriminatorLoss<B: Backend> {
    /// `real + fake`, the value to differentiate.
    pub total: Tensor<B, 1>,
    pub real: Tensor<B, 1>,
    pub fake: Tensor<B, 1>,
}

impl GanLoss {
    /// Label of real images after smoothing.
    pub fn real_label(&self) -> f64 {
        1. - self.smooth
    }

    /// The discriminator is pushed to score real images as `1 - smooth` and fakes as `0`.
    ///
    /// # Shapes
    ///   - real_logits [batch, 1]
    ///   - fake_logits [batch, 1]
    pub fn discriminator<B: Backend>(
        &self,
        real_logits: Tensor<B, 2>,
        fake_logits: Tensor<B, 2>,
    ) -> DiscriminatorLoss<B> {
        let real = self.bce.forward_constant(real_logits, self.real_label());
        let fake = self.bce.forward_constant(fake_logits, 0.);
        DiscriminatorLoss {
            total: real.clone() + fake.clone(),
            real,
            fake,
        }
    }

    /// Non-saturating generator loss: fakes should be scored as real (`1`, unsmoothed).
    ///
    /// # Shapes
    ///   - fake_logits [batch, 1]
    pub fn generator<B: Backend>(&self, fake_logits: Tensor<B, 2>) -> Tensor<B, 1> {
        self.bce.forward_constant(fake_logits, 1.)
    }
}
