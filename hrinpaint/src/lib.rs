//! # hrinpaint-burn
//!
//! High-resolution image inpainting with a two-stage gated-convolution generator
//! and a spectrally normalized patch discriminator, built on Burn.
//!
//! The generator fills the hole at a reduced working resolution first, then refines
//! the composite at full resolution while borrowing texture from known patches
//! through contextual attention. Masks use 1 for hole pixels and 0 for known ones.
//!
//! ```no_run
//! use burn::backend::NdArray;
//! use burn::prelude::*;
//! use hrinpaint_burn::InpaintingGanConfig;
//!
//! # fn main() -> hrinpaint_burn::InpaintResult<()> {
//! let device = Default::default();
//! let gan = InpaintingGanConfig::new().init::<NdArray>(&device)?;
//!
//! let image = Tensor::<NdArray, 4>::ones([1, 3, 512, 512], &device);
//! let mask = Tensor::<NdArray, 4>::zeros([1, 1, 512, 512], &device);
//! let output = gan.generate(image.clone(), mask.clone())?;
//! let score = gan.discriminate(output.composite(image, mask.clone()), mask)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod models;

pub mod losses;
pub mod training;

#[cfg(test)]
mod tests;

pub use config::*;
pub use error::{InpaintError, InpaintResult};
pub use models::{
    attention::{AttentionMatrix, ContextualAttention, ContextualAttentionConfig},
    coarse::{CoarseNetwork, CoarseNetworkConfig},
    discriminator::{DiscriminatorBlock, PatchDiscriminator, PatchDiscriminatorConfig},
    gan::{InpaintingGan, InpaintingGanConfig, InpaintingGanRecord},
    generator::{GatedGenerator, GatedGeneratorConfig, InpaintOutput},
    modules::{
        GateBranch, GatedBlock, GatedConv2d, GatedConv2dConfig, TransposeGatedConv2d,
    },
    refinement::{RefinementNetwork, RefinementNetworkConfig},
};
