//! Mean Absolute Error (L1) loss.

use burn::prelude::*;

/// Configuration for L1 Loss.
#[derive(Config, Debug)]
pub struct L1LossConfig {
    #[config(default = 1.0)]
    pub weight: f32,
}

/// Mean Absolute Error (L1) loss.
#[derive(Module, Debug)]
pub struct L1Loss<B: Backend> {
    pub weight: f32,
    _phantom: std::marker::PhantomData<B>,
}

impl L1LossConfig {
    /// Initialize a new L1 loss with the given configuration.
    pub const fn init<B: Backend>(&self) -> L1Loss<B> {
        L1Loss {
            weight: self.weight,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<B: Backend> Default for L1Loss<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> L1Loss<B> {
    /// Create a new L1 loss with unit weight.
    pub fn new() -> Self {
        L1LossConfig::new().init()
    }

    /// Weighted mean of `|pred - target|` over every element.
    pub fn forward(&self, pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
        (pred - target).abs().mean().mul_scalar(self.weight)
    }
}
