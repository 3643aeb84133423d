//! Configuration module for the inpainting GAN.
//!
//! This module provides configuration structures and enums for the generator and
//! discriminator. It is organized into two main submodules:
//! - `core`: Contains the main configuration structures
//! - `enums`: Contains all enumeration types used in configurations

pub mod core;
pub mod enums;

// Re-export all configuration structures from core
pub use core::{AttentionConfig, DiscriminatorConfig, GeneratorConfig, ModelConfig};

// Re-export all enums and their constants from enums
pub use enums::{
    Activation, DegenerateRowPolicy, GateKind, Norm, COSINE_EPSILON, DEGENERATE_ROW_POLICY,
    HOLE_FILL_VALUE, LEAKY_RELU_SLOPE, PATCH_GRID,
};
