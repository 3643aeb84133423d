//! Layer builders shared by the generator and discriminator blocks.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, InstanceNorm, InstanceNormConfig, LeakyRelu, LeakyReluConfig,
        PaddingConfig2d, Relu, Tanh,
    },
    prelude::*,
};
use burn_extra_ops::{SpectralNormConv2d, SpectralNormConv2dConfig};

use crate::config::{Activation, Norm, LEAKY_RELU_SLOPE};

/// An enum to wrap the normalization layers a convolution block can use.
#[derive(Module, Debug)]
pub enum NormLayer<B: Backend> {
    BatchNorm(BatchNorm<B, 2>),
    InstanceNorm(InstanceNorm<B>),
}

impl<B: Backend> NormLayer<B> {
    /// Builds the layer for `norm`, or `None` when no normalization is configured.
    pub fn new(norm: Norm, channels: usize, device: &Device<B>) -> Option<Self> {
        match norm {
            Norm::None => None,
            Norm::Batch => Some(Self::BatchNorm(BatchNormConfig::new(channels).init(device))),
            Norm::Instance => Some(Self::InstanceNorm(
                InstanceNormConfig::new(channels).init(device),
            )),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::BatchNorm(bn) => bn.forward(x),
            Self::InstanceNorm(inorm) => inorm.forward(x),
        }
    }
}

/// An enum to wrap the activation layers a convolution block can use.
#[derive(Module, Debug, Clone)]
pub enum ActivationLayer {
    LeakyRelu(LeakyRelu),
    Relu(Relu),
    Tanh(Tanh),
}

impl ActivationLayer {
    /// Builds the layer for `activation`, or `None` for the identity.
    pub fn new(activation: Activation) -> Option<Self> {
        match activation {
            Activation::None => None,
            Activation::LeakyRelu => Some(Self::LeakyRelu(
                LeakyReluConfig::new()
                    .with_negative_slope(LEAKY_RELU_SLOPE)
                    .init(),
            )),
            Activation::Relu => Some(Self::Relu(Relu::new())),
            Activation::Tanh => Some(Self::Tanh(Tanh::new())),
        }
    }

    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::LeakyRelu(act) => act.forward(x),
            Self::Relu(act) => act.forward(x),
            Self::Tanh(act) => act.forward(x),
        }
    }
}

/// Spatial hyperparameters shared by the two branches of a gated convolution.
#[derive(Config, Debug, Copy)]
pub struct ConvGeometry {
    #[config(default = 3)]
    pub kernel_size: usize,
    #[config(default = 1)]
    pub stride: usize,
    #[config(default = 1)]
    pub padding: usize,
    #[config(default = 1)]
    pub dilation: usize,
}

impl ConvGeometry {
    /// A stride-1 convolution whose padding preserves the spatial size.
    #[must_use]
    pub fn same(kernel_size: usize, dilation: usize) -> Self {
        Self::new()
            .with_kernel_size(kernel_size)
            .with_dilation(dilation)
            .with_padding(dilation * (kernel_size - 1) / 2)
    }

    /// A stride-2 convolution halving the spatial size.
    #[must_use]
    pub fn down(kernel_size: usize) -> Self {
        Self::new()
            .with_kernel_size(kernel_size)
            .with_stride(2)
            .with_padding((kernel_size - 1) / 2)
    }
}

/// A plain or spectrally normalized 2D convolution.
#[derive(Module, Debug)]
pub enum ConvLayer<B: Backend> {
    Plain(Conv2d<B>),
    Spectral(SpectralNormConv2d<B>),
}

impl<B: Backend> ConvLayer<B> {
    pub fn new(
        channels: [usize; 2],
        geometry: ConvGeometry,
        spectral_norm: bool,
        power_iterations: usize,
        device: &Device<B>,
    ) -> Self {
        let ConvGeometry {
            kernel_size,
            stride,
            padding,
            dilation,
        } = geometry;

        if spectral_norm {
            Self::Spectral(
                SpectralNormConv2dConfig::new(channels, [kernel_size, kernel_size])
                    .with_stride([stride, stride])
                    .with_padding([padding, padding])
                    .with_dilation([dilation, dilation])
                    .with_power_iterations(power_iterations)
                    .init(device),
            )
        } else {
            Self::Plain(
                Conv2dConfig::new(channels, [kernel_size, kernel_size])
                    .with_stride([stride, stride])
                    .with_padding(PaddingConfig2d::Explicit(padding, padding))
                    .with_dilation([dilation, dilation])
                    .init(device),
            )
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Plain(conv) => conv.forward(x),
            Self::Spectral(conv) => conv.forward(x),
        }
    }

    /// Advances the spectral-norm estimate; a no-op for plain convolutions.
    pub fn refresh(self) -> Self {
        match self {
            Self::Plain(conv) => Self::Plain(conv),
            Self::Spectral(conv) => Self::Spectral(conv.refresh()),
        }
    }
}

/// Clamps every value into `[0, 1]`.
pub fn to_unit_range<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    x.clamp(0.0, 1.0)
}

/// `1 - mask`: 1 on known pixels, 0 on hole pixels.
pub fn known_region<B: Backend>(mask: Tensor<B, 4>) -> Tensor<B, 4> {
    mask.neg().add_scalar(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn unit_range_clamp_is_idempotent() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::from_floats(
            [[[[-3.0, 0.25], [1.5, f32::MAX]], [[0.0, 1.0], [-0.0, 0.999]]]],
            &device,
        );

        let once = to_unit_range(x);
        let twice = to_unit_range(once.clone());

        let values = once.clone().into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!((once - twice).abs().max().into_scalar(), 0.0);
    }

    #[test]
    fn geometry_helpers_preserve_or_halve_size() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::zeros([1, 2, 16, 16], &device);

        let same = ConvLayer::<TestBackend>::new([2, 3], ConvGeometry::same(3, 4), false, 1, &device);
        let down = ConvLayer::<TestBackend>::new([2, 3], ConvGeometry::down(5), true, 1, &device);

        assert_eq!(same.forward(x.clone()).dims(), [1, 3, 16, 16]);
        assert_eq!(down.forward(x).dims(), [1, 3, 8, 8]);
    }
}
