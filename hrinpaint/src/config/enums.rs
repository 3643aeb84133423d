//! Enumeration types for the inpainting GAN configuration.
//!
//! This module contains all the enumeration types that define various
//! configuration options for the networks, plus the named constants their
//! defaults refer to.

use burn::prelude::*;

/// Number of patches along each side of the attention patch grid.
pub const PATCH_GRID: usize = 32;

/// Value written into hole pixels before the coarse network sees the image.
pub const HOLE_FILL_VALUE: f32 = 1.0;

/// Negative slope of every leaky rectifier in the networks.
pub const LEAKY_RELU_SLOPE: f64 = 0.2;

/// Lower bound on patch-vector norms in the attention cosine similarity.
pub const COSINE_EPSILON: f64 = 1e-8;

/// What an attention row without a single eligible key turns into.
///
/// Rows for known patches and every row of an all-hole or hole-free mask fall in
/// this case. Identity passthrough keeps those patches' own features in the
/// transferred skip tensors.
pub const DEGENERATE_ROW_POLICY: DegenerateRowPolicy = DegenerateRowPolicy::Identity;

/// Normalization applied to the feature branch of a convolution block.
#[derive(Config, Debug, PartialEq, Eq, Copy)]
pub enum Norm {
    /// No normalization.
    None,
    /// Batch normalization.
    Batch,
    /// Instance normalization (affine).
    Instance,
}

/// Activation applied to the feature branch of a convolution block.
#[derive(Config, Debug, PartialEq, Eq, Copy)]
pub enum Activation {
    /// Identity.
    None,
    /// Leaky rectifier with slope [`LEAKY_RELU_SLOPE`].
    LeakyRelu,
    /// Rectifier.
    Relu,
    /// Hyperbolic tangent.
    Tanh,
}

/// How the gate branch of a gated convolution is shaped.
#[derive(Config, Debug, PartialEq, Eq, Copy)]
pub enum GateKind {
    /// One gate channel per output channel.
    PerChannel,
    /// A single gate channel broadcast across all output channels.
    Shared,
}

/// Policy for attention rows that have no eligible (known) key patch.
#[derive(Config, Debug, PartialEq, Eq, Copy)]
pub enum DegenerateRowPolicy {
    /// The row becomes a one-hot on its own patch: the patch passes through unchanged.
    Identity,
    /// The row stays all zeros: the patch is blanked in the transferred tensor.
    Zero,
}
