use burn::prelude::*;

/// A feature-space distance between a reconstruction and its target.
///
/// Implemented by the training harness, typically on top of a pretrained
/// classifier; the returned value is a scalar loss of shape `[1]`.
pub trait PerceptualLoss<B: Backend> {
    /// # Shapes
    /// - pred, target: `[batch, 3, height, width]`, values in `[0, 1]`
    fn forward(&self, pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1>;
}
