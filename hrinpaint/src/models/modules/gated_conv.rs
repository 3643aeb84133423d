//! # Gated Convolutions
//!
//! A gated convolution runs two convolutions with identical spatial geometry on the
//! same input: a feature branch (optionally normalized and activated) and a gate
//! branch squashed into `(0, 1)` by a sigmoid. The output is their elementwise
//! product, so the gate learns per pixel how far the features near a hole boundary
//! can be trusted.
//!
//! The transposed variant upsamples with nearest-neighbour interpolation first and
//! then applies an ordinary gated convolution.

use burn::{
    prelude::*,
    tensor::{
        activation::sigmoid,
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

use super::utils::{ActivationLayer, ConvGeometry, ConvLayer, NormLayer};
use crate::config::{Activation, GateKind, Norm};

/// Configuration for the `GatedConv2d` module.
#[derive(Config, Debug)]
pub struct GatedConv2dConfig {
    /// Input and output channels of the feature branch.
    pub channels: [usize; 2],
    /// Kernel size, stride, padding and dilation of both branches.
    #[config(default = "ConvGeometry::new()")]
    pub geometry: ConvGeometry,
    #[config(default = "Activation::LeakyRelu")]
    pub activation: Activation,
    #[config(default = "Norm::None")]
    pub norm: Norm,
    #[config(default = "GateKind::PerChannel")]
    pub gate: GateKind,
}

impl GatedConv2dConfig {
    /// Initializes a new `GatedConv2d` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> GatedConv2d<B> {
        let [in_channels, out_channels] = self.channels;
        let feature = ConvLayer::new(self.channels, self.geometry, false, 1, device);
        let gate = match self.gate {
            GateKind::PerChannel => {
                GateBranch::PerChannel(ConvLayer::new(self.channels, self.geometry, false, 1, device))
            }
            GateKind::Shared => {
                GateBranch::Shared(ConvLayer::new([in_channels, 1], self.geometry, false, 1, device))
            }
        };

        GatedConv2d {
            feature,
            gate,
            norm: NormLayer::new(self.norm, out_channels, device),
            activation: ActivationLayer::new(self.activation),
        }
    }

    /// Initializes the upsampling variant: nearest-neighbour ×2, then this gated convolution.
    pub fn init_transposed<B: Backend>(&self, device: &Device<B>) -> TransposeGatedConv2d<B> {
        TransposeGatedConv2d {
            scale_factor: TransposeGatedConv2d::<B>::SCALE_FACTOR,
            conv: self.init(device),
        }
    }
}

/// The gate branch of a gated convolution.
#[derive(Module, Debug)]
pub enum GateBranch<B: Backend> {
    /// One gate map per output channel.
    PerChannel(ConvLayer<B>),
    /// One gate map broadcast across every output channel.
    Shared(ConvLayer<B>),
}

impl<B: Backend> GateBranch<B> {
    /// Gate values in `(0, 1)`, shape `[batch, out_channels or 1, height, width]`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::PerChannel(conv) | Self::Shared(conv) => sigmoid(conv.forward(x)),
        }
    }
}

/// A gated 2D convolution.
#[derive(Module, Debug)]
pub struct GatedConv2d<B: Backend> {
    pub(crate) feature: ConvLayer<B>,
    pub(crate) gate: GateBranch<B>,
    norm: Option<NormLayer<B>>,
    activation: Option<ActivationLayer>,
}

impl<B: Backend> GatedConv2d<B> {
    /// # Shapes
    /// - input: `[batch, in_channels, height, width]`
    /// - output: `[batch, out_channels, height_out, width_out]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let gate = self.gate.forward(x.clone());
        self.features(x) * gate
    }

    /// The feature branch alone: convolution, then normalization and activation.
    pub fn features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.feature.forward(x);
        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };
        match &self.activation {
            Some(activation) => activation.forward(x),
            None => x,
        }
    }
}

/// A gated convolution preceded by nearest-neighbour upsampling.
#[derive(Module, Debug)]
pub struct TransposeGatedConv2d<B: Backend> {
    scale_factor: usize,
    conv: GatedConv2d<B>,
}

impl<B: Backend> TransposeGatedConv2d<B> {
    const SCALE_FACTOR: usize = 2;

    /// # Shapes
    /// - input: `[batch, in_channels, height, width]`
    /// - output: `[batch, out_channels, 2 * height, 2 * width]` for a same-padded kernel
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, h, w] = x.dims();
        let x = interpolate(
            x,
            [h * self.scale_factor, w * self.scale_factor],
            InterpolateOptions::new(InterpolateMode::Nearest),
        );
        self.conv.forward(x)
    }
}

/// A gated block in a sequence: plain or upsampling.
#[derive(Module, Debug)]
pub enum GatedBlock<B: Backend> {
    Conv(GatedConv2d<B>),
    Transpose(TransposeGatedConv2d<B>),
}

impl<B: Backend> GatedBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Conv(block) => block.forward(x),
            Self::Transpose(block) => block.forward(x),
        }
    }
}

/// Gated blocks applied one after another.
#[derive(Module, Debug)]
pub struct GatedSequence<B: Backend> {
    blocks: Vec<GatedBlock<B>>,
}

impl<B: Backend> GatedSequence<B> {
    pub fn new(blocks: Vec<GatedBlock<B>>) -> Self {
        Self { blocks }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }
}

/// Builds the stacks of gated convolutions the networks are made of.
///
/// Holds the generator-wide norm and activation so call sites only state channels
/// and geometry.
#[derive(Debug, Clone, Copy)]
pub struct GatedStackBuilder {
    pub norm: Norm,
    pub activation: Activation,
    pub gate: GateKind,
}

impl GatedStackBuilder {
    pub fn config(&self, channels: [usize; 2], geometry: ConvGeometry) -> GatedConv2dConfig {
        GatedConv2dConfig::new(channels)
            .with_geometry(geometry)
            .with_norm(self.norm)
            .with_activation(self.activation)
            .with_gate(self.gate)
    }

    pub fn conv<B: Backend>(
        &self,
        channels: [usize; 2],
        geometry: ConvGeometry,
        device: &Device<B>,
    ) -> GatedBlock<B> {
        GatedBlock::Conv(self.config(channels, geometry).init(device))
    }

    pub fn transpose<B: Backend>(&self, channels: [usize; 2], device: &Device<B>) -> GatedBlock<B> {
        GatedBlock::Transpose(
            self.config(channels, ConvGeometry::same(3, 1))
                .init_transposed(device),
        )
    }

    /// The 3-channel output convolution: identity activation, squashed by the caller.
    pub fn output<B: Backend>(&self, in_channels: usize, device: &Device<B>) -> GatedBlock<B> {
        GatedBlock::Conv(
            self.config([in_channels, 3], ConvGeometry::same(3, 1))
                .with_activation(Activation::None)
                .init(device),
        )
    }

    /// `count` same-padded 3×3 blocks at `channels → channels` with the given dilation.
    pub fn dilated<B: Backend>(
        &self,
        channels: usize,
        dilations: &[usize],
        device: &Device<B>,
    ) -> GatedSequence<B> {
        GatedSequence::new(
            dilations
                .iter()
                .map(|&dilation| {
                    self.conv([channels, channels], ConvGeometry::same(3, dilation), device)
                })
                .collect(),
        )
    }
}
