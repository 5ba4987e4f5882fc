use crate::utils::log_sigmoid::log_sigmoid;
use burn::module::Module;
use burn::prelude::*;

/// Binary cross entropy of logits against soft targets.
///
/// The sigmoid is folded into the loss, which keeps it finite for confident logits.
#[derive(Module, Clone, Debug, Default)]
pub struct BinaryCrossEntropyLoss;

impl BinaryCrossEntropyLoss {
    /// Compute the mean criterion against per-element targets in `[0, 1]`.
    ///
    /// # Shapes
    ///
    /// - inputs: `[batch_size, ...]`
    /// - targets: `[batch_size, ...]`
    /// - output: `[1]`
    pub fn forward<const D: usize, B: Backend>(
        &self,
        inputs: Tensor<B, D>,
        targets: Tensor<B, D>,
    ) -> Tensor<B, 1> {
        self.forward_no_reduction(inputs, targets).mean()
    }

    /// Compute the mean criterion against a single target shared by every element,
    /// such as the `1 - smooth` label of real images.
    pub fn forward_constant<const D: usize, B: Backend>(
        &self,
        inputs: Tensor<B, D>,
        target: f64,
    ) -> Tensor<B, 1> {
        let targets = inputs.zeros_like().add_scalar(target);
        self.forward(inputs, targets)
    }

    /// Compute the criterion without reducing.
    pub fn forward_no_reduction<const D: usize, B: Backend>(
        &self,
        inputs: Tensor<B, D>,
        targets: Tensor<B, D>,
    ) -> Tensor<B, D> {
        // (1 - t) * x - log(sigmoid(x)), stable for large |x|
        (targets.neg() + 1.) * inputs.clone() - log_sigmoid(inputs)
    }
}
