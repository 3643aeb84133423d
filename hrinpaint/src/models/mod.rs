//! # Model Architectures
//!
//! - `modules`: gated convolutions and the layer wrappers they are built from.
//! - `coarse` / `refinement`: the two generator stages.
//! - `attention`: contextual attention over a patch grid.
//! - `generator` / `discriminator`: the two networks the GAN is made of.
//! - `gan`: both networks behind the `generate` / `discriminate` boundary.

pub mod attention;
pub mod coarse;
pub mod discriminator;
pub mod gan;
pub mod generator;
pub mod modules;
pub mod refinement;
