//! Loss computation for one adversarial training iteration.
//!
//! The generator step produces the composite image the discriminator step then
//! scores as fake. The composite travels from one step to the other inside
//! [`GeneratorStepOutput`], so no state is kept on the step object between calls.
//! Optimizers, schedulers and the loop itself belong to the caller.
//!
//! One iteration runs in this order:
//!
//! 1. [`InpaintingStep::generator_step`], then backpropagate `total` and step the
//!    generator's optimizer.
//! 2. [`InpaintingStep::discriminator_step`] with the output of step 1, then
//!    backpropagate `loss` and step the discriminator's optimizer.
//! 3. [`InpaintingGan::refresh_spectral_norm`]. The discriminator's forward pass never
//!    advances its spectral-norm estimates; without this step they stay at their
//!    initial values.

use burn::prelude::*;

use crate::{
    error::InpaintResult,
    losses::{HingeLoss, L1Loss, PerceptualLoss},
    models::{discriminator::PatchDiscriminator, gan::InpaintingGan, generator::InpaintOutput},
};

/// Weights of the generator loss terms.
#[derive(Config, Debug)]
pub struct LossWeights {
    /// L1 between the coarse composite and the target.
    #[config(default = 1.0)]
    pub coarse_l1: f32,
    /// L1 between the refined composite and the target.
    #[config(default = 1.0)]
    pub refined_l1: f32,
    #[config(default = 1.0)]
    pub perceptual: f32,
    #[config(default = 0.1)]
    pub adversarial: f32,
}

/// Ground-truth images and the holes to punch into them.
#[derive(Debug, Clone)]
pub struct InpaintingBatch<B: Backend> {
    /// `[batch, 3, height, width]`, values in `[0, 1]`.
    pub images: Tensor<B, 4>,
    /// `[batch, 1, height, width]`, 1 = hole.
    pub masks: Tensor<B, 4>,
}

/// Everything the generator step computed.
#[derive(Debug, Clone)]
pub struct GeneratorStepOutput<B: Backend> {
    pub output: InpaintOutput<B>,
    /// The refined composite: input outside the hole, refined fill inside.
    pub composite: Tensor<B, 4>,
    pub coarse_l1: Tensor<B, 1>,
    pub refined_l1: Tensor<B, 1>,
    /// Present only when a perceptual loss was supplied.
    pub perceptual: Option<Tensor<B, 1>>,
    pub adversarial: Tensor<B, 1>,
    /// Weighted sum of all terms; the value to backpropagate.
    pub total: Tensor<B, 1>,
}

/// Everything the discriminator step computed.
#[derive(Debug, Clone)]
pub struct DiscriminatorStepOutput<B: Backend> {
    pub real_score: Tensor<B, 2>,
    pub fake_score: Tensor<B, 2>,
    pub loss: Tensor<B, 1>,
}

/// Loss functions and weights for the two alternating steps.
#[derive(Debug)]
pub struct InpaintingStep<B: Backend> {
    weights: LossWeights,
    l1: L1Loss<B>,
    hinge: HingeLoss<B>,
}

impl<B: Backend> InpaintingStep<B> {
    pub fn new(weights: LossWeights) -> Self {
        Self {
            weights,
            l1: L1Loss::new(),
            hinge: HingeLoss::new(),
        }
    }

    pub const fn weights(&self) -> &LossWeights {
        &self.weights
    }

    /// Runs the generator on the batch and computes its weighted loss.
    ///
    /// The adversarial term scores the refined composite with the current
    /// discriminator; only the generator's gradients should be applied from it.
    ///
    /// # Errors
    ///
    /// Shape errors from `generate` or `discriminate`.
    pub fn generator_step(
        &self,
        gan: &InpaintingGan<B>,
        batch: &InpaintingBatch<B>,
        perceptual: Option<&dyn PerceptualLoss<B>>,
    ) -> InpaintResult<GeneratorStepOutput<B>> {
        let images = batch.images.clone();
        let masks = batch.masks.clone();

        let output = gan.generate(images.clone(), masks.clone())?;
        let coarse_composite = output.coarse_composite(images.clone(), masks.clone());
        let composite = output.composite(images.clone(), masks.clone());

        let coarse_l1 = self.l1.forward(coarse_composite, images.clone());
        let refined_l1 = self.l1.forward(composite.clone(), images.clone());
        let perceptual = perceptual.map(|loss| loss.forward(composite.clone(), images));
        let fake_score = gan.discriminate(composite.clone(), masks)?;
        let adversarial = self.hinge.generator_loss(fake_score);

        let mut total = coarse_l1.clone().mul_scalar(self.weights.coarse_l1)
            + refined_l1.clone().mul_scalar(self.weights.refined_l1)
            + adversarial.clone().mul_scalar(self.weights.adversarial);
        if let Some(perceptual) = &perceptual {
            total = total + perceptual.clone().mul_scalar(self.weights.perceptual);
        }

        tracing::trace!(
            batch = batch.images.dims()[0],
            perceptual = perceptual.is_some(),
            "generator step"
        );

        Ok(GeneratorStepOutput {
            output,
            composite,
            coarse_l1,
            refined_l1,
            perceptual,
            adversarial,
            total,
        })
    }

    /// Scores real images and the detached composite from `generated`, and returns
    /// the hinge loss for the discriminator.
    ///
    /// Follow the discriminator's optimizer step with
    /// [`InpaintingGan::refresh_spectral_norm`].
    ///
    /// # Errors
    ///
    /// Shape errors from `discriminate`.
    pub fn discriminator_step(
        &self,
        discriminator: &PatchDiscriminator<B>,
        batch: &InpaintingBatch<B>,
        generated: &GeneratorStepOutput<B>,
    ) -> InpaintResult<DiscriminatorStepOutput<B>> {
        let fake = generated.composite.clone().detach();

        let real_score = discriminator.discriminate(batch.images.clone(), batch.masks.clone())?;
        let fake_score = discriminator.discriminate(fake, batch.masks.clone())?;
        let loss = self
            .hinge
            .discriminator_loss(real_score.clone(), fake_score.clone());

        tracing::trace!(batch = batch.images.dims()[0], "discriminator step");

        Ok(DiscriminatorStepOutput {
            real_score,
            fake_score,
            loss,
        })
    }
}

impl<B: Backend> Default for InpaintingStep<B> {
    fn default() -> Self {
        Self::new(LossWeights::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AttentionConfig, DiscriminatorConfig, GeneratorConfig, ModelConfig},
        models::gan::InpaintingGanConfig,
        tests::{centred_square_mask, TestAutodiffBackend},
    };
    use burn::{optim::GradientsParams, tensor::Distribution};

    const SIZE: usize = 64;

    /// Mean absolute difference of channel means, standing in for a feature network.
    struct ChannelMeanLoss;

    impl<B: Backend> PerceptualLoss<B> for ChannelMeanLoss {
        fn forward(&self, pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
            let pred = pred.mean_dim(3).mean_dim(2);
            let target = target.mean_dim(3).mean_dim(2);
            (pred - target).abs().mean()
        }
    }

    fn small_gan() -> InpaintingGan<TestAutodiffBackend> {
        let config = ModelConfig::new()
            .with_generator(
                GeneratorConfig::new()
                    .with_coarse_size([16, 16])
                    .with_attention(AttentionConfig::new().with_patch_grid(2)),
            )
            .with_discriminator(DiscriminatorConfig::new().with_image_size([SIZE, SIZE]));
        InpaintingGanConfig::new()
            .with_config(config)
            .init(&Default::default())
            .unwrap()
    }

    fn batch() -> InpaintingBatch<TestAutodiffBackend> {
        let device = Default::default();
        InpaintingBatch {
            images: Tensor::random([1, 3, SIZE, SIZE], Distribution::Uniform(0.0, 1.0), &device),
            masks: centred_square_mask(1, SIZE, SIZE / 4, &device),
        }
    }

    fn scalar(x: &Tensor<TestAutodiffBackend, 1>) -> f32 {
        x.clone().into_scalar()
    }

    #[test]
    fn total_is_the_weighted_sum_of_terms() {
        let gan = small_gan();
        let step = InpaintingStep::new(LossWeights::new().with_adversarial(0.5).with_perceptual(2.0));

        let out = step
            .generator_step(&gan, &batch(), Some(&ChannelMeanLoss as &dyn PerceptualLoss<_>))
            .unwrap();

        let perceptual = out.perceptual.as_ref().map(scalar).unwrap();
        let expected = scalar(&out.coarse_l1)
            + scalar(&out.refined_l1)
            + 2.0 * perceptual
            + 0.5 * scalar(&out.adversarial);
        let total = scalar(&out.total);
        assert!((total - expected).abs() < 1e-5, "{total} != {expected}");
    }

    #[test]
    fn perceptual_term_is_optional() {
        let gan = small_gan();
        let step = InpaintingStep::default();

        let out = step.generator_step(&gan, &batch(), None).unwrap();

        assert!(out.perceptual.is_none());
        let expected =
            scalar(&out.coarse_l1) + scalar(&out.refined_l1) + 0.1 * scalar(&out.adversarial);
        assert!((scalar(&out.total) - expected).abs() < 1e-5);
    }

    #[test]
    fn generator_loss_trains_the_generator() {
        let gan = small_gan();
        let step = InpaintingStep::default();

        let out = step.generator_step(&gan, &batch(), None).unwrap();
        let mut grads = out.total.backward();

        let generator = GradientsParams::from_module(&mut grads, &gan.generator);
        assert!(!generator.is_empty());
    }

    #[test]
    fn discriminator_step_does_not_reach_the_generator() {
        let gan = small_gan();
        let step = InpaintingStep::default();
        let batch = batch();

        let generated = step.generator_step(&gan, &batch, None).unwrap();
        let out = step
            .discriminator_step(&gan.discriminator, &batch, &generated)
            .unwrap();
        assert_eq!(out.real_score.dims(), [1, 1]);
        assert_eq!(out.fake_score.dims(), [1, 1]);

        let mut grads = out.loss.backward();
        let generator = GradientsParams::from_module(&mut grads, &gan.generator);
        let discriminator = GradientsParams::from_module(&mut grads, &gan.discriminator);

        assert!(generator.is_empty());
        assert!(!discriminator.is_empty());
    }

    #[test]
    fn iteration_ends_by_refreshing_spectral_estimates() {
        let gan = small_gan();
        let step = InpaintingStep::default();
        let batch = batch();
        let before = gan.discriminator.spectral_vectors();

        let generated = step.generator_step(&gan, &batch, None).unwrap();
        step.discriminator_step(&gan.discriminator, &batch, &generated).unwrap();
        // Scoring alone leaves the estimates where they were.
        assert_eq!(gan.discriminator.spectral_vectors(), before);

        let gan = gan.refresh_spectral_norm();
        let after = gan.discriminator.spectral_vectors();

        assert_eq!(after.len(), before.len());
        for (old, new) in before.iter().zip(&after) {
            assert_ne!(old, new);
            let norm: f32 = new.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4, "refreshed vector has norm {norm}");
        }
    }
}
