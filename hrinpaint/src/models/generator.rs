//! # Gated Generator
//!
//! The two-stage generator: a coarse fill at the configured working resolution,
//! upsampled and composited into the input, then refined with contextual attention
//! at the input resolution.

use burn::{
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};
use burn_extra_ops::resize_bilinear;

use super::{
    coarse::{CoarseNetwork, CoarseNetworkConfig},
    modules::known_region,
    refinement::{RefinementNetwork, RefinementNetworkConfig},
};
use crate::{
    config::{GeneratorConfig, HOLE_FILL_VALUE},
    error::{ensure_divisible, InpaintError, InpaintResult},
};

/// Configuration for the `GatedGenerator` module.
#[derive(Config, Debug)]
pub struct GatedGeneratorConfig {
    #[config(default = "GeneratorConfig::new()")]
    pub config: GeneratorConfig,
}

impl GatedGeneratorConfig {
    /// Initializes a new `GatedGenerator` module.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the generator settings fail validation.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> InpaintResult<GatedGenerator<B>> {
        let config = &self.config;
        config.validate()?;

        tracing::debug!(
            coarse_size = ?config.coarse_size,
            patch_grid = config.attention.patch_grid,
            norm = ?config.norm,
            "initializing gated generator"
        );

        Ok(GatedGenerator {
            coarse: CoarseNetworkConfig::new()
                .with_norm(config.norm)
                .with_activation(config.activation)
                .init(device),
            refinement: RefinementNetworkConfig::new()
                .with_norm(config.norm)
                .with_activation(config.activation)
                .with_attention(config.attention.clone())
                .init(device),
            coarse_size: config.coarse_size,
            input_multiple: config.input_multiple(),
        })
    }
}

/// Both stages' outputs of one `generate` call.
#[derive(Debug, Clone)]
pub struct InpaintOutput<B: Backend> {
    /// Coarse fill at the working resolution, `[batch, 3, coarse_h, coarse_w]`.
    pub coarse: Tensor<B, 4>,
    /// Refined fill at the input resolution, `[batch, 3, height, width]`.
    pub refined: Tensor<B, 4>,
}

impl<B: Backend> InpaintOutput<B> {
    /// The input outside the hole and the refined fill inside it.
    pub fn composite(&self, image: Tensor<B, 4>, mask: Tensor<B, 4>) -> Tensor<B, 4> {
        composite(image, self.refined.clone(), mask)
    }

    /// Same as [`Self::composite`] for the coarse fill, bilinearly upsampled to the
    /// input resolution first.
    pub fn coarse_composite(&self, image: Tensor<B, 4>, mask: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = image.dims();
        composite(image, resize_bilinear(self.coarse.clone(), [height, width]), mask)
    }
}

/// Coarse network followed by the attention-guided refinement network.
#[derive(Module, Debug)]
pub struct GatedGenerator<B: Backend> {
    coarse: CoarseNetwork<B>,
    refinement: RefinementNetwork<B>,
    coarse_size: [usize; 2],
    input_multiple: usize,
}

impl<B: Backend> GatedGenerator<B> {
    /// Fills the holes of `image` marked by `mask` (1 = hole, 0 = known).
    ///
    /// # Shapes
    /// - image: `[batch, 3, height, width]`
    /// - mask: `[batch, 1, height, width]`, sides divisible by `8 * patch_grid`
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` when image and mask disagree in batch or spatial size or have
    /// the wrong channel count, `IndivisibleShape` when a side is not a multiple of
    /// `8 * patch_grid`. Both are reported before any computation.
    pub fn generate(&self, image: Tensor<B, 4>, mask: Tensor<B, 4>) -> InpaintResult<InpaintOutput<B>> {
        let [_, _, height, width] = check_image_and_mask(&image, &mask)?;
        ensure_divisible("image height", height, self.input_multiple)?;
        ensure_divisible("image width", width, self.input_multiple)?;

        let small_image = resize_bilinear(image.clone(), self.coarse_size);
        let small_mask = resize_nearest(mask.clone(), self.coarse_size);
        let filled = small_image * known_region(small_mask.clone())
            + small_mask.clone().mul_scalar(HOLE_FILL_VALUE);
        let coarse = self.coarse.forward(Tensor::cat(vec![filled, small_mask], 1));

        let upsampled = resize_bilinear(coarse.clone(), [height, width]);
        let refined = self
            .refinement
            .forward(composite(image, upsampled, mask.clone()), mask)?;

        Ok(InpaintOutput { coarse, refined })
    }

    /// Input sides must be multiples of this.
    pub const fn input_multiple(&self) -> usize {
        self.input_multiple
    }
}

/// Validates an `(image, mask)` pair and returns the image dimensions.
pub(crate) fn check_image_and_mask<B: Backend>(
    image: &Tensor<B, 4>,
    mask: &Tensor<B, 4>,
) -> InpaintResult<[usize; 4]> {
    let [batch, channels, height, width] = image.dims();
    if channels != 3 {
        return Err(InpaintError::ShapeMismatch {
            expected: "image [batch, 3, height, width]".to_string(),
            actual: format!("{:?}", image.dims()),
        });
    }
    if mask.dims() != [batch, 1, height, width] {
        tracing::warn!(image = ?image.dims(), mask = ?mask.dims(), "image and mask are not co-registered");
        return Err(InpaintError::ShapeMismatch {
            expected: format!("mask {:?}", [batch, 1, height, width]),
            actual: format!("{:?}", mask.dims()),
        });
    }
    Ok([batch, channels, height, width])
}

/// `image * (1 - mask) + fill * mask`.
pub(crate) fn composite<B: Backend>(
    image: Tensor<B, 4>,
    fill: Tensor<B, 4>,
    mask: Tensor<B, 4>,
) -> Tensor<B, 4> {
    image * known_region(mask.clone()) + fill * mask
}

fn resize_nearest<B: Backend>(mask: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [_, _, height, width] = mask.dims();
    if [height, width] == size {
        return mask;
    }
    interpolate(mask, size, InterpolateOptions::new(InterpolateMode::Nearest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AttentionConfig, tests::TestBackend};
    use burn::tensor::Distribution;

    fn small_generator() -> GatedGenerator<TestBackend> {
        GatedGeneratorConfig::new()
            .with_config(
                GeneratorConfig::new()
                    .with_coarse_size([8, 8])
                    .with_attention(AttentionConfig::new().with_patch_grid(2)),
            )
            .init(&Default::default())
            .unwrap()
    }

    #[test]
    fn mismatched_mask_is_rejected_before_computation() {
        let device = Default::default();
        let generator = small_generator();
        let image = Tensor::<TestBackend, 4>::zeros([1, 3, 16, 16], &device);

        let wrong_size = Tensor::<TestBackend, 4>::zeros([1, 1, 16, 32], &device);
        assert!(matches!(
            generator.generate(image.clone(), wrong_size),
            Err(InpaintError::ShapeMismatch { .. })
        ));

        let wrong_channels = Tensor::<TestBackend, 4>::zeros([1, 3, 16, 16], &device);
        assert!(matches!(
            generator.generate(image, wrong_channels),
            Err(InpaintError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn sides_must_be_multiples_of_eight_patch_grids() {
        let device = Default::default();
        let generator = small_generator();
        assert_eq!(generator.input_multiple(), 16);

        let image = Tensor::<TestBackend, 4>::zeros([1, 3, 24, 16], &device);
        let mask = Tensor::<TestBackend, 4>::zeros([1, 1, 24, 16], &device);

        assert!(matches!(
            generator.generate(image, mask),
            Err(InpaintError::IndivisibleShape { size: 24, factor: 16, .. })
        ));
    }

    #[test]
    fn generate_handles_every_coarse_ratio() {
        let device = Default::default();
        for (side, coarse_size) in [(32, [16, 16]), (32, [8, 8]), (16, [16, 16]), (32, [64, 64]), (48, [24, 16])] {
            let generator = GatedGeneratorConfig::new()
                .with_config(
                    GeneratorConfig::new()
                        .with_coarse_size(coarse_size)
                        .with_attention(AttentionConfig::new().with_patch_grid(2)),
                )
                .init::<TestBackend>(&device)
                .unwrap();
            let image = Tensor::<TestBackend, 4>::random([1, 3, side, side], Distribution::Uniform(0.0, 1.0), &device);
            let mask = crate::tests::centred_square_mask(1, side, side / 4, &device);

            let output = generator.generate(image, mask).unwrap();

            assert_eq!(output.coarse.dims(), [1, 3, coarse_size[0], coarse_size[1]]);
            assert_eq!(output.refined.dims(), [1, 3, side, side]);
        }
    }

    #[test]
    fn composite_keeps_known_pixels_exactly() {
        let device = Default::default();
        let image = Tensor::<TestBackend, 4>::full([1, 3, 2, 2], 0.25, &device);
        let fill = Tensor::<TestBackend, 4>::full([1, 3, 2, 2], 0.75, &device);
        let mask = Tensor::<TestBackend, 4>::from_floats([[[[1.0, 0.0], [0.0, 0.0]]]], &device);

        let values = composite(image, fill, mask).into_data().to_vec::<f32>().unwrap();

        assert_eq!(&values[0..4], &[0.75, 0.25, 0.25, 0.25]);
    }
}
