//! # Contextual Attention
//!
//! Builds a patch-to-patch attention matrix on the deepest refinement feature map
//! and uses it to recompose feature maps at any scale whose sides are divisible by
//! the patch grid.
//!
//! Patches are indexed row-major over a `patch_grid × patch_grid` grid. Row `i` of
//! the matrix says how query patch `i` is rebuilt from the key patches. Only pairs
//! where the query lies in the hole and the key is fully known are eligible, and
//! the softmax runs over the eligible keys of each row alone.

use burn::{prelude::*, tensor::module::avg_pool2d};
use burn_extra_ops::{cosine_similarity_matrix, TensorExtraOps};

use crate::{
    config::{AttentionConfig, DegenerateRowPolicy},
    error::{ensure_divisible, InpaintError, InpaintResult},
};

/// Configuration for the `ContextualAttention` module.
#[derive(Config, Debug)]
pub struct ContextualAttentionConfig {
    pub patch_grid: usize,
    pub degenerate_row_policy: DegenerateRowPolicy,
    pub epsilon: f64,
}

impl ContextualAttentionConfig {
    /// Builds the module configuration from the generator's attention settings.
    pub fn from_attention(config: &AttentionConfig) -> Self {
        Self::new(
            config.patch_grid,
            config.degenerate_row_policy,
            config.epsilon,
        )
    }

    /// Initializes a new `ContextualAttention` module.
    pub const fn init(&self) -> ContextualAttention {
        ContextualAttention {
            patch_grid: self.patch_grid,
            identity_fallback: matches!(self.degenerate_row_policy, DegenerateRowPolicy::Identity),
            epsilon: self.epsilon,
        }
    }
}

/// Parameter-free patch attention between hole and known regions.
#[derive(Module, Clone, Debug)]
pub struct ContextualAttention {
    patch_grid: usize,
    identity_fallback: bool,
    epsilon: f64,
}

impl ContextualAttention {
    /// One binary value per patch: 1 if any pixel inside it has a non-zero mask value.
    ///
    /// Soft masks count every partially masked pixel as hole.
    ///
    /// # Shapes
    /// - mask: `[batch, 1, height, width]`, both sides divisible by the patch grid
    /// - output: `[batch, patch_grid * patch_grid]`
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` for a multi-channel mask, `IndivisibleShape` when a side is not
    /// a multiple of the patch grid.
    pub fn patch_occupancy<B: Backend>(&self, mask: Tensor<B, 4>) -> InpaintResult<Tensor<B, 2>> {
        let [batch, channels, height, width] = mask.dims();
        if channels != 1 {
            return Err(InpaintError::ShapeMismatch {
                expected: "[batch, 1, height, width]".to_string(),
                actual: format!("{:?}", mask.dims()),
            });
        }
        let grid = self.patch_grid;
        ensure_divisible("mask height", height, grid)?;
        ensure_divisible("mask width", width, grid)?;

        // Max-pool each patch by splitting both spatial axes into (grid, patch side).
        let pooled = mask
            .reshape([batch, grid, height / grid, grid, width / grid])
            .max_dim(4)
            .max_dim(2);

        Ok(pooled.reshape([batch, grid * grid]).greater_elem(0.0).float())
    }

    /// `E[i, j] = occupancy[i] * (1 - occupancy[j])`: 1 exactly for hole queries paired
    /// with known keys.
    ///
    /// # Shapes
    /// - occupancy: `[batch, patches]`
    /// - output: `[batch, patches, patches]`
    pub fn eligibility<B: Backend>(occupancy: Tensor<B, 2>) -> Tensor<B, 3> {
        let [batch, patches] = occupancy.dims();
        let known = occupancy.clone().neg().add_scalar(1.0);

        occupancy
            .reshape([batch, patches, 1])
            .matmul(known.reshape([batch, 1, patches]))
    }

    /// Computes the attention matrix from the deepest feature map and the hole mask.
    ///
    /// The feature map is average-pooled down to exactly `patch_grid × patch_grid`,
    /// so each pixel of the pooled map is one patch vector. At the reference scale
    /// this is a 2× downsample. The mask may be at any resolution divisible by the
    /// patch grid.
    ///
    /// # Shapes
    /// - feature: `[batch, channels, height, width]`, sides divisible by the patch grid
    /// - mask: `[batch, 1, mask_height, mask_width]`
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` when the batch sizes differ, `IndivisibleShape` when a feature
    /// side is not a multiple of the patch grid, plus the errors of
    /// [`Self::patch_occupancy`].
    pub fn compute<B: Backend>(
        &self,
        feature: Tensor<B, 4>,
        mask: Tensor<B, 4>,
    ) -> InpaintResult<AttentionMatrix<B>> {
        let [batch, channels, height, width] = feature.dims();
        let [mask_batch, ..] = mask.dims();
        if batch != mask_batch {
            return Err(InpaintError::ShapeMismatch {
                expected: format!("mask with batch size {batch}"),
                actual: format!("{:?}", mask.dims()),
            });
        }

        let grid = self.patch_grid;
        let patches = grid * grid;
        ensure_divisible("feature height", height, grid)?;
        ensure_divisible("feature width", width, grid)?;
        let eligibility = Self::eligibility(self.patch_occupancy(mask)?);

        let window = [height / grid, width / grid];
        let feature = avg_pool2d(feature, window, window, [0, 0], true);
        let vectors = feature
            .permute([0, 2, 3, 1])
            .reshape([batch, patches, channels]);

        let similarity = cosine_similarity_matrix(vectors.clone(), vectors, self.epsilon);
        let weights = (similarity * eligibility.clone()).masked_softmax(eligibility.clone(), 2);

        let weights = if self.identity_fallback {
            let degenerate = eligibility
                .sum_dim(2)
                .lower_equal_elem(0.0)
                .float()
                .repeat_dim(2, patches);
            let identity = identity_weights::<B>(patches, &weights.device())
                .reshape([1, patches, patches])
                .repeat_dim(0, batch);
            weights + identity * degenerate
        } else {
            weights
        };

        tracing::trace!(batch, patches, channels, "computed contextual attention");
        Ok(AttentionMatrix { weights, patch_grid: grid })
    }
}

/// Attention weights over a patch grid, one `[patches, patches]` matrix per sample.
#[derive(Debug, Clone)]
pub struct AttentionMatrix<B: Backend> {
    weights: Tensor<B, 3>,
    patch_grid: usize,
}

impl<B: Backend> AttentionMatrix<B> {
    /// Wraps precomputed weights of shape `[batch, grid², grid²]`.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` when the weights are not square over `patch_grid²` patches.
    pub fn from_weights(weights: Tensor<B, 3>, patch_grid: usize) -> InpaintResult<Self> {
        let [_, rows, cols] = weights.dims();
        let patches = patch_grid * patch_grid;
        if rows != patches || cols != patches {
            return Err(InpaintError::ShapeMismatch {
                expected: format!("[batch, {patches}, {patches}]"),
                actual: format!("{:?}", weights.dims()),
            });
        }
        Ok(Self { weights, patch_grid })
    }

    /// The matrix that leaves every patch where it is.
    pub fn identity(batch: usize, patch_grid: usize, device: &B::Device) -> Self {
        let patches = patch_grid * patch_grid;
        let weights = identity_weights::<B>(patches, device)
            .reshape([1, patches, patches])
            .repeat_dim(0, batch);
        Self { weights, patch_grid }
    }

    pub fn weights(&self) -> Tensor<B, 3> {
        self.weights.clone()
    }

    /// Rebuilds every patch of `feature` as the attention-weighted blend of patches.
    ///
    /// Works at any resolution whose sides are multiples of the patch grid; the
    /// patch side is `height / grid × width / grid` pixels at that scale.
    ///
    /// # Shapes
    /// - feature: `[batch, channels, height, width]`
    /// - output: same as `feature`
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` when the batch sizes differ, `IndivisibleShape` when a side is
    /// not a multiple of the patch grid.
    pub fn transfer(&self, feature: Tensor<B, 4>) -> InpaintResult<Tensor<B, 4>> {
        let [batch, channels, height, width] = feature.dims();
        let [weight_batch, ..] = self.weights.dims();
        if batch != weight_batch {
            return Err(InpaintError::ShapeMismatch {
                expected: format!("feature with batch size {weight_batch}"),
                actual: format!("{:?}", feature.dims()),
            });
        }
        ensure_divisible("feature height", height, self.patch_grid)?;
        ensure_divisible("feature width", width, self.patch_grid)?;

        let patches = extract_patches(feature, self.patch_grid);
        let blended = self.weights.clone().matmul(patches);

        Ok(fold_patches(blended, self.patch_grid, [channels, height, width]))
    }
}

/// `[batch, C, H, W]` → `[batch, grid², ph * pw * C]`, patches in row-major grid order.
fn extract_patches<B: Backend>(feature: Tensor<B, 4>, grid: usize) -> Tensor<B, 3> {
    let [batch, channels, height, width] = feature.dims();
    let (ph, pw) = (height / grid, width / grid);

    feature
        .reshape([batch, channels, grid, ph, grid, pw])
        .permute([0, 2, 4, 3, 5, 1])
        .reshape([batch, grid * grid, ph * pw * channels])
}

/// Inverse of [`extract_patches`].
fn fold_patches<B: Backend>(
    patches: Tensor<B, 3>,
    grid: usize,
    [channels, height, width]: [usize; 3],
) -> Tensor<B, 4> {
    let [batch, ..] = patches.dims();
    let (ph, pw) = (height / grid, width / grid);

    patches
        .reshape([batch, grid, grid, ph, pw, channels])
        .permute([0, 5, 1, 3, 2, 4])
        .reshape([batch, channels, height, width])
}

fn identity_weights<B: Backend>(patches: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut values = vec![0.0f32; patches * patches];
    for i in 0..patches {
        values[i * patches + i] = 1.0;
    }
    Tensor::from_data(TensorData::new(values, [patches, patches]), device)
}
