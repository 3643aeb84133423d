//! # Patch Discriminator
//!
//! Six stride-2 blocks of spectrally normalized convolution, normalization and
//! leaky rectification, followed by a linear projection to one raw score per
//! sample. The score is unbounded; the adversarial objective decides how to read it.

use burn::{
    nn::{LeakyRelu, LeakyReluConfig, Linear, LinearConfig},
    prelude::*,
};

use super::{
    generator::check_image_and_mask,
    modules::{ConvGeometry, ConvLayer, NormLayer},
};
use crate::{
    config::{DiscriminatorConfig, LEAKY_RELU_SLOPE},
    error::{InpaintError, InpaintResult},
};

/// Channel widths from the 4-channel input through the six blocks.
const CHANNELS: [usize; DiscriminatorConfig::BLOCKS + 1] =
    [4, 64, 128, 256, 256, 256, DiscriminatorConfig::OUT_CHANNELS];

/// Configuration for the `PatchDiscriminator` module.
#[derive(Config, Debug)]
pub struct PatchDiscriminatorConfig {
    #[config(default = "DiscriminatorConfig::new()")]
    pub config: DiscriminatorConfig,
}

impl PatchDiscriminatorConfig {
    /// Initializes a new `PatchDiscriminator` module.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the discriminator settings fail validation.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> InpaintResult<PatchDiscriminator<B>> {
        let config = &self.config;
        config.validate()?;

        tracing::debug!(
            image_size = ?config.image_size,
            norm = ?config.norm,
            power_iterations = config.power_iterations,
            "initializing patch discriminator"
        );

        let blocks = CHANNELS
            .windows(2)
            .map(|pair| DiscriminatorBlock {
                conv: ConvLayer::new(
                    [pair[0], pair[1]],
                    ConvGeometry::down(3),
                    true,
                    config.power_iterations,
                    device,
                ),
                norm: NormLayer::new(config.norm, pair[1], device),
                activation: LeakyReluConfig::new()
                    .with_negative_slope(LEAKY_RELU_SLOPE)
                    .init(),
            })
            .collect();

        Ok(PatchDiscriminator {
            blocks,
            projection: LinearConfig::new(config.projection_features(), 1).init(device),
            image_size: config.image_size,
        })
    }
}

/// Spectrally normalized convolution, optional normalization, leaky rectifier.
#[derive(Module, Debug)]
pub struct DiscriminatorBlock<B: Backend> {
    conv: ConvLayer<B>,
    norm: Option<NormLayer<B>>,
    activation: LeakyRelu,
}

impl<B: Backend> DiscriminatorBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };
        self.activation.forward(x)
    }
}

/// Realism critic over `(image, mask)` pairs.
#[derive(Module, Debug)]
pub struct PatchDiscriminator<B: Backend> {
    blocks: Vec<DiscriminatorBlock<B>>,
    projection: Linear<B>,
    image_size: [usize; 2],
}

impl<B: Backend> PatchDiscriminator<B> {
    /// Scores a real or composited image together with its mask.
    ///
    /// # Shapes
    /// - image: `[batch, 3, height, width]`
    /// - mask: `[batch, 1, height, width]`
    /// - output: `[batch, 1]`
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` when image and mask disagree, or the spatial size differs from
    /// the configured image size the projection was built for.
    pub fn discriminate(&self, image: Tensor<B, 4>, mask: Tensor<B, 4>) -> InpaintResult<Tensor<B, 2>> {
        let [_, _, height, width] = check_image_and_mask(&image, &mask)?;
        if [height, width] != self.image_size {
            return Err(InpaintError::ShapeMismatch {
                expected: format!("spatial size {:?}", self.image_size),
                actual: format!("{:?}", [height, width]),
            });
        }

        let x = Tensor::cat(vec![image, mask], 1);
        let x = self.blocks.iter().fold(x, |x, block| block.forward(x));

        Ok(self.projection.forward(x.flatten::<2>(1, 3)))
    }

    /// Advances every spectral-norm power-iteration vector by one refresh.
    ///
    /// Call between optimizer steps; `discriminate` itself never changes them.
    #[must_use]
    pub fn refresh_spectral_norm(self) -> Self {
        let blocks = self
            .blocks
            .into_iter()
            .map(|block| DiscriminatorBlock {
                conv: block.conv.refresh(),
                ..block
            })
            .collect();
        Self { blocks, ..self }
    }

    /// Power-iteration vectors of every block, in block order.
    #[cfg(test)]
    pub(crate) fn spectral_vectors(&self) -> Vec<Vec<f32>> {
        self.blocks
            .iter()
            .map(|block| match &block.conv {
                ConvLayer::Spectral(conv) => conv.u.val().into_data().to_vec::<f32>().unwrap(),
                ConvLayer::Plain(_) => panic!("discriminator convolutions must be spectrally normalized"),
            })
            .collect()
    }
}
