//! Core configuration structures for the inpainting GAN.
//!
//! This module contains the primary configuration structures that define
//! the generator and discriminator architectures.

use crate::error::{InpaintError, InpaintResult};
use burn::prelude::*;

use super::enums::*;

/// Main configuration for the inpainting GAN.
///
/// Aggregates the generator and discriminator settings. Validated once when the
/// networks are initialized, never per forward call.
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Two-stage generator configuration.
    #[config(default = "GeneratorConfig::new()")]
    pub generator: GeneratorConfig,
    /// Patch discriminator configuration.
    #[config(default = "DiscriminatorConfig::new()")]
    pub discriminator: DiscriminatorConfig,
}

/// Generator configuration shared by the coarse and refinement networks.
#[derive(Config, Debug)]
pub struct GeneratorConfig {
    /// Normalization of every gated convolution's feature branch.
    #[config(default = "Norm::None")]
    pub norm: Norm,
    /// Activation of every gated convolution's feature branch (except output layers).
    #[config(default = "Activation::LeakyRelu")]
    pub activation: Activation,
    /// Working resolution `[height, width]` of the coarse network.
    #[config(default = "[256, 256]")]
    pub coarse_size: [usize; 2],
    /// Contextual attention settings.
    #[config(default = "AttentionConfig::new()")]
    pub attention: AttentionConfig,
}

/// Contextual attention configuration.
#[derive(Config, Debug)]
pub struct AttentionConfig {
    /// Patches per side of the attention grid.
    #[config(default = "PATCH_GRID")]
    pub patch_grid: usize,
    /// What rows without an eligible key patch become.
    #[config(default = "DEGENERATE_ROW_POLICY")]
    pub degenerate_row_policy: DegenerateRowPolicy,
    /// Norm clamp for the cosine similarity.
    #[config(default = "COSINE_EPSILON")]
    pub epsilon: f64,
}

/// Patch discriminator configuration.
#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    /// Input resolution `[height, width]`; fixes the size of the final projection.
    #[config(default = "[512, 512]")]
    pub image_size: [usize; 2],
    /// Normalization after each spectrally normalized convolution.
    #[config(default = "Norm::Instance")]
    pub norm: Norm,
    /// Power-iteration steps per spectral-norm application.
    #[config(default = 1)]
    pub power_iterations: usize,
}

impl ModelConfig {
    /// Validate the configuration and return appropriate errors for invalid settings.
    ///
    /// # Errors
    ///
    /// Returns `Err(InpaintError::InvalidConfiguration)` if any validation rule is violated.
    pub fn validate(&self) -> InpaintResult<()> {
        self.generator.validate()?;
        self.discriminator.validate()
    }
}

impl GeneratorConfig {
    /// Total downsampling of the coarse encoder.
    pub const COARSE_STRIDE: usize = 4;
    /// Total downsampling of the refinement encoder.
    pub const REFINEMENT_STRIDE: usize = 8;

    /// Validate the generator settings.
    ///
    /// # Errors
    ///
    /// Returns `Err(InpaintError::InvalidConfiguration)` if the coarse size cannot pass
    /// through the coarse encoder and decoder, or the patch grid is empty.
    pub fn validate(&self) -> InpaintResult<()> {
        for size in self.coarse_size {
            if size == 0 || size % Self::COARSE_STRIDE != 0 {
                return Err(InpaintError::InvalidConfiguration {
                    reason: format!(
                        "Coarse size must be a positive multiple of {}, got {:?}",
                        Self::COARSE_STRIDE,
                        self.coarse_size
                    ),
                });
            }
        }

        if self.attention.patch_grid == 0 {
            return Err(InpaintError::InvalidConfiguration {
                reason: "Patch grid must be positive".to_string(),
            });
        }

        if self.attention.epsilon.is_nan() || self.attention.epsilon <= 0.0 {
            return Err(InpaintError::InvalidConfiguration {
                reason: format!(
                    "Attention epsilon must be positive, got {}",
                    self.attention.epsilon
                ),
            });
        }

        Ok(())
    }

    /// The factor input height and width must be divisible by.
    ///
    /// The deepest refinement feature map (1/8 resolution) is split into
    /// `patch_grid × patch_grid` patches, which bounds every shallower scale too.
    #[must_use]
    pub const fn input_multiple(&self) -> usize {
        Self::REFINEMENT_STRIDE * self.attention.patch_grid
    }
}

impl DiscriminatorConfig {
    /// Number of stride-2 convolution blocks.
    pub const BLOCKS: usize = 6;
    /// Channels of the last convolution block.
    pub const OUT_CHANNELS: usize = 16;

    /// Validate the discriminator settings.
    ///
    /// # Errors
    ///
    /// Returns `Err(InpaintError::InvalidConfiguration)` if the image size does not
    /// survive six stride-2 blocks exactly, or no power iteration is requested.
    pub fn validate(&self) -> InpaintResult<()> {
        let factor = 1 << Self::BLOCKS;
        for size in self.image_size {
            if size == 0 || size % factor != 0 {
                return Err(InpaintError::InvalidConfiguration {
                    reason: format!(
                        "Discriminator image size must be a positive multiple of {factor}, got {:?}",
                        self.image_size
                    ),
                });
            }
        }

        if self.power_iterations == 0 {
            return Err(InpaintError::InvalidConfiguration {
                reason: "Spectral norm needs at least one power iteration".to_string(),
            });
        }

        Ok(())
    }

    /// Flattened feature size fed to the final linear projection.
    #[must_use]
    pub const fn projection_features(&self) -> usize {
        let factor = 1 << Self::BLOCKS;
        Self::OUT_CHANNELS * (self.image_size[0] / factor) * (self.image_size[1] / factor)
    }
}
