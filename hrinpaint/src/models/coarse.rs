//! # Coarse Network
//!
//! First-pass fill at the fixed working resolution. The input is the image with
//! hole pixels replaced by a constant plus the mask (4 channels); the output is
//! a 3-channel image in `[0, 1]` at the same resolution.

use burn::{prelude::*, tensor::activation::tanh};

use super::modules::{to_unit_range, ConvGeometry, GatedSequence, GatedStackBuilder};
use crate::config::{Activation, GateKind, Norm};

/// Dilations of the residual groups between encoder and decoder, one group per row.
const RESIDUAL_DILATIONS: [&[usize]; 7] = [
    &[1, 1, 1],
    &[1, 1, 1],
    &[2, 2, 2],
    &[4, 4, 4],
    &[8, 8, 8],
    &[16, 16],
    &[1, 1, 1],
];

const WIDTH: usize = 64;

/// Configuration for the `CoarseNetwork` module.
#[derive(Config, Debug)]
pub struct CoarseNetworkConfig {
    #[config(default = "Norm::None")]
    pub norm: Norm,
    #[config(default = "Activation::LeakyRelu")]
    pub activation: Activation,
}

impl CoarseNetworkConfig {
    /// Initializes a new `CoarseNetwork` module.
    ///
    /// Every gated convolution uses a single gate channel shared across its outputs.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> CoarseNetwork<B> {
        let builder = GatedStackBuilder {
            norm: self.norm,
            activation: self.activation,
            gate: GateKind::Shared,
        };

        let encoder = GatedSequence::new(vec![
            builder.conv([4, 32], ConvGeometry::down(5), device),
            builder.conv([32, 32], ConvGeometry::same(3, 1), device),
            builder.conv([32, WIDTH], ConvGeometry::down(3), device),
        ]);
        let residual = RESIDUAL_DILATIONS
            .iter()
            .map(|dilations| builder.dilated(WIDTH, dilations, device))
            .collect();
        let decoder = GatedSequence::new(vec![
            builder.transpose([WIDTH, WIDTH], device),
            builder.transpose([WIDTH, 32], device),
            builder.output(32, device),
        ]);

        CoarseNetwork {
            encoder,
            residual,
            decoder,
        }
    }
}

/// Encoder, residual dilated groups and upsampling decoder producing the coarse fill.
#[derive(Module, Debug)]
pub struct CoarseNetwork<B: Backend> {
    encoder: GatedSequence<B>,
    residual: Vec<GatedSequence<B>>,
    decoder: GatedSequence<B>,
}

impl<B: Backend> CoarseNetwork<B> {
    /// # Shapes
    /// - input: `[batch, 4, height, width]`, sides divisible by 4
    /// - output: `[batch, 3, height, width]`, values in `[0, 1]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.encoder.forward(x);
        let x = self
            .residual
            .iter()
            .fold(x, |x, group| group.forward(x.clone()) + x);
        let x = self.decoder.forward(x);

        to_unit_range(tanh(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;
    use burn::tensor::Distribution;

    #[test]
    fn output_matches_input_resolution_and_range() {
        let device = Default::default();
        let network = CoarseNetworkConfig::new().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random([2, 4, 16, 12], Distribution::Uniform(0.0, 1.0), &device);

        let out = network.forward(x);

        assert_eq!(out.dims(), [2, 3, 16, 12]);
        let values = out.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
