//! Loss functions for training the inpainting GAN.
//!
//! - `L1Loss`: weighted mean absolute error between composites and targets.
//! - `HingeLoss`: the adversarial objective for both networks.
//! - `PerceptualLoss`: the contract of a feature-space distance supplied by the
//!   training harness, which owns the pretrained feature extractor.

mod hinge;
mod l1;
mod perceptual;

pub use hinge::*;
pub use l1::*;
pub use perceptual::*;
