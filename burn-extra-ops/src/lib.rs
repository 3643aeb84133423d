//! Additional operations for the Burn deep learning framework
//!
//! This crate provides operations that are commonly used in deep learning but are not
//! yet available in the core Burn framework.

use burn::{prelude::*, tensor::activation::softmax};

mod resize;
mod similarity;
mod spectral_norm;

// Convenient re-exports
pub use resize::resize_bilinear;
pub use similarity::cosine_similarity_matrix;
pub use spectral_norm::{SpectralNormConv2d, SpectralNormConv2dConfig};

/// Logit written into excluded positions before a masked softmax.
///
/// Finite so that a fully excluded row stays NaN-free (it softmaxes to a uniform
/// row which the trailing mask multiplication then zeroes).
pub const MASKED_LOGIT: f32 = -1.0e4;

/// Additional operations for Burn tensors
pub trait TensorExtraOps<B: Backend, const D: usize> {
    /// Divide the tensor by its L2 norm along `dim`, with the norm clamped to `epsilon`.
    ///
    /// A zero vector stays zero instead of turning into NaN.
    fn l2_normalize(self, dim: usize, epsilon: f64) -> Self;

    /// Softmax along `dim` restricted to positions where `mask` is non-zero.
    ///
    /// `mask` holds `{0, 1}` values and must have the same shape as the tensor.
    /// Excluded positions are exactly zero in the result, and every row with at
    /// least one included position sums to one.
    fn masked_softmax(self, mask: Tensor<B, D>, dim: usize) -> Self;
}

impl<B: Backend, const D: usize> TensorExtraOps<B, D> for Tensor<B, D> {
    fn l2_normalize(self, dim: usize, epsilon: f64) -> Self {
        let norm = (self.clone() * self.clone())
            .sum_dim(dim)
            .sqrt()
            .clamp_min(epsilon);
        self / norm
    }

    fn masked_softmax(self, mask: Tensor<B, D>, dim: usize) -> Self {
        let excluded = mask.clone().lower_equal_elem(0.0);
        softmax(self.mask_fill(excluded, MASKED_LOGIT), dim) * mask
    }
}
