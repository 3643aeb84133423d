//! Hinge adversarial loss.

use burn::{prelude::*, tensor::activation::relu};

/// Configuration for Hinge Loss.
#[derive(Config, Debug)]
pub struct HingeLossConfig {
    /// Margin of the discriminator hinge.
    #[config(default = 1.0)]
    pub margin: f32,
}

/// Hinge loss on raw discriminator scores.
///
/// The discriminator pushes real scores above `margin` and fake scores below
/// `-margin`; the generator raises the mean fake score without a margin.
#[derive(Module, Debug)]
pub struct HingeLoss<B: Backend> {
    pub margin: f32,
    _phantom: std::marker::PhantomData<B>,
}

impl HingeLossConfig {
    /// Initialize a new hinge loss with the given configuration.
    pub const fn init<B: Backend>(&self) -> HingeLoss<B> {
        HingeLoss {
            margin: self.margin,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<B: Backend> Default for HingeLoss<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> HingeLoss<B> {
    /// Create a new hinge loss with unit margin.
    pub fn new() -> Self {
        HingeLossConfig::new().init()
    }

    /// `mean(relu(margin - real)) + mean(relu(margin + fake))`.
    ///
    /// # Shapes
    /// - real, fake: `[batch, 1]`
    pub fn discriminator_loss(&self, real: Tensor<B, 2>, fake: Tensor<B, 2>) -> Tensor<B, 1> {
        let real = relu(real.neg().add_scalar(self.margin)).mean();
        let fake = relu(fake.add_scalar(self.margin)).mean();
        real + fake
    }

    /// `-mean(fake)`.
    pub fn generator_loss(&self, fake: Tensor<B, 2>) -> Tensor<B, 1> {
        fake.mean().neg()
    }
}
