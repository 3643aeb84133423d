//! # Refinement Network
//!
//! Consumes the coarse composite at the working resolution and produces the final
//! fill. The encoder keeps its 1/2 and 1/4 scale feature maps and the deepest 1/8
//! residual output as skip tensors. Contextual attention is computed once from the
//! deepest map and the mask, then each skip tensor is transferred with it, projected
//! by a small gated stack and concatenated into the decoder at the matching scale.

use burn::{prelude::*, tensor::activation::tanh};

use super::{
    attention::{ContextualAttention, ContextualAttentionConfig},
    modules::{to_unit_range, ConvGeometry, GatedSequence, GatedStackBuilder},
};
use crate::{
    config::{Activation, AttentionConfig, GateKind, Norm},
    error::InpaintResult,
};

/// Dilations of the residual groups at the deepest scale.
const RESIDUAL_DILATIONS: [&[usize]; 3] = [&[1, 1], &[2, 4], &[8, 16]];

/// Configuration for the `RefinementNetwork` module.
#[derive(Config, Debug)]
pub struct RefinementNetworkConfig {
    #[config(default = "Norm::None")]
    pub norm: Norm,
    #[config(default = "Activation::LeakyRelu")]
    pub activation: Activation,
    #[config(default = "AttentionConfig::new()")]
    pub attention: AttentionConfig,
}

impl RefinementNetworkConfig {
    /// Initializes a new `RefinementNetwork` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> RefinementNetwork<B> {
        let g = GatedStackBuilder {
            norm: self.norm,
            activation: self.activation,
            gate: GateKind::PerChannel,
        };
        let same = ConvGeometry::same(3, 1);

        RefinementNetwork {
            encoder_half: GatedSequence::new(vec![
                g.conv([3, 32], ConvGeometry::down(5), device),
                g.conv([32, 32], same, device),
            ]),
            encoder_quarter: GatedSequence::new(vec![
                g.conv([32, 64], ConvGeometry::down(3), device),
                g.conv([64, 64], same, device),
            ]),
            encoder_eighth: GatedSequence::new(vec![g.conv([64, 128], ConvGeometry::down(3), device)]),
            residual: RESIDUAL_DILATIONS
                .iter()
                .map(|dilations| g.dilated(128, dilations, device))
                .collect(),
            attention: ContextualAttentionConfig::from_attention(&self.attention).init(),
            skip_eighth: GatedSequence::new(vec![g.conv([128, 128], same, device)]),
            skip_quarter: GatedSequence::new(vec![
                g.conv([64, 64], same, device),
                g.conv([64, 64], ConvGeometry::same(3, 2), device),
            ]),
            skip_half: GatedSequence::new(vec![
                g.conv([32, 32], same, device),
                g.conv([32, 32], ConvGeometry::same(3, 2), device),
            ]),
            decoder_eighth: GatedSequence::new(vec![
                g.conv([256, 128], same, device),
                g.transpose([128, 64], device),
                g.conv([64, 64], same, device),
            ]),
            decoder_quarter: GatedSequence::new(vec![
                g.transpose([128, 64], device),
                g.conv([64, 32], same, device),
            ]),
            decoder_half: GatedSequence::new(vec![g.transpose([64, 32], device), g.output(32, device)]),
        }
    }
}

/// Attention-guided refinement stage of the generator.
#[derive(Module, Debug)]
pub struct RefinementNetwork<B: Backend> {
    encoder_half: GatedSequence<B>,
    encoder_quarter: GatedSequence<B>,
    encoder_eighth: GatedSequence<B>,
    residual: Vec<GatedSequence<B>>,
    attention: ContextualAttention,
    skip_eighth: GatedSequence<B>,
    skip_quarter: GatedSequence<B>,
    skip_half: GatedSequence<B>,
    decoder_eighth: GatedSequence<B>,
    decoder_quarter: GatedSequence<B>,
    decoder_half: GatedSequence<B>,
}

impl<B: Backend> RefinementNetwork<B> {
    /// # Shapes
    /// - x: `[batch, 3, height, width]`, the coarse composite
    /// - mask: `[batch, 1, height, width]`
    /// - output: `[batch, 3, height, width]`, values in `[0, 1]`
    ///
    /// # Errors
    ///
    /// Propagates attention shape errors when a side is not divisible by
    /// `8 * patch_grid`.
    pub fn forward(&self, x: Tensor<B, 4>, mask: Tensor<B, 4>) -> InpaintResult<Tensor<B, 4>> {
        let half = self.encoder_half.forward(x);
        let quarter = self.encoder_quarter.forward(half.clone());
        let x = self.encoder_eighth.forward(quarter.clone());
        let eighth = self
            .residual
            .iter()
            .fold(x, |x, group| group.forward(x.clone()) + x);

        let attention = self.attention.compute(eighth.clone(), mask)?;

        let skip = self.skip_eighth.forward(attention.transfer(eighth.clone())?);
        let x = self.decoder_eighth.forward(Tensor::cat(vec![eighth, skip], 1));

        let skip = self.skip_quarter.forward(attention.transfer(quarter)?);
        let x = self.decoder_quarter.forward(Tensor::cat(vec![x, skip], 1));

        let skip = self.skip_half.forward(attention.transfer(half)?);
        let x = self.decoder_half.forward(Tensor::cat(vec![x, skip], 1));

        Ok(to_unit_range(tanh(x)))
    }
}
