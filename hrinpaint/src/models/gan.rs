//! The generator and discriminator bundled behind one configuration.

use burn::prelude::*;

use super::{
    discriminator::{PatchDiscriminator, PatchDiscriminatorConfig},
    generator::{GatedGenerator, GatedGeneratorConfig, InpaintOutput},
};
use crate::{config::ModelConfig, error::InpaintResult};

/// Configuration for the `InpaintingGan` module.
#[derive(Config, Debug)]
pub struct InpaintingGanConfig {
    /// The detailed model configuration.
    #[config(default = "ModelConfig::new()")]
    pub config: ModelConfig,
}

impl InpaintingGanConfig {
    /// Validates the whole configuration once, then initializes both networks.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for any rule [`ModelConfig::validate`] enforces.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> InpaintResult<InpaintingGan<B>> {
        self.config.validate()?;

        let generator = GatedGeneratorConfig::new()
            .with_config(self.config.generator.clone())
            .init(device)?;
        let discriminator = PatchDiscriminatorConfig::new()
            .with_config(self.config.discriminator.clone())
            .init(device)?;

        tracing::info!(
            generator_params = generator.num_params(),
            discriminator_params = discriminator.num_params(),
            "inpainting GAN initialized"
        );

        Ok(InpaintingGan {
            generator,
            discriminator,
        })
    }
}

/// Two-stage inpainting generator plus patch discriminator.
///
/// The networks are public so a training loop can hand each to its own optimizer.
#[derive(Module, Debug)]
pub struct InpaintingGan<B: Backend> {
    pub generator: GatedGenerator<B>,
    pub discriminator: PatchDiscriminator<B>,
}

impl<B: Backend> InpaintingGan<B> {
    /// See [`GatedGenerator::generate`].
    ///
    /// # Errors
    ///
    /// Shape errors as documented on [`GatedGenerator::generate`].
    pub fn generate(&self, image: Tensor<B, 4>, mask: Tensor<B, 4>) -> InpaintResult<InpaintOutput<B>> {
        self.generator.generate(image, mask)
    }

    /// See [`PatchDiscriminator::discriminate`].
    ///
    /// # Errors
    ///
    /// Shape errors as documented on [`PatchDiscriminator::discriminate`].
    pub fn discriminate(&self, image: Tensor<B, 4>, mask: Tensor<B, 4>) -> InpaintResult<Tensor<B, 2>> {
        self.discriminator.discriminate(image, mask)
    }

    /// Advances the discriminator's spectral-norm estimates; the generator is untouched.
    ///
    /// Call once per training iteration, after the discriminator's optimizer step.
    #[must_use]
    pub fn refresh_spectral_norm(self) -> Self {
        Self {
            discriminator: self.discriminator.refresh_spectral_norm(),
            ..self
        }
    }
}
