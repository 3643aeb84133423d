//! Inpainting Forward-Pass Demo
//!
//! Builds the generator and discriminator from a JSON configuration (or the
//! defaults), punches a centred square hole into a random image and runs
//! `generate` and `discriminate` once, logging shapes, value ranges and timings.
//!
//! ## Usage
//!
//! ```bash
//! # Reference resolution with the default configuration
//! cargo run --release --bin inpaint-forward
//!
//! # Smaller run with a custom configuration
//! cargo run --release --bin inpaint-forward -- --config model.json --size 256 --hole 64
//!
//! # More detail
//! RUST_LOG=debug cargo run --release --bin inpaint-forward
//! ```

use std::{path::PathBuf, time::Instant};

use anyhow::{ensure, Context, Result};
use burn::{backend::NdArray, prelude::*, tensor::Distribution};
use clap::Parser;
use hrinpaint_burn::{InpaintingGanConfig, ModelConfig};
use tracing_subscriber::EnvFilter;

type SelectedBackend = NdArray<f32>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON model configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Side length of the square input image
    #[arg(long, default_value = "512")]
    size: usize,

    /// Side length of the centred square hole
    #[arg(long, default_value = "128")]
    hole: usize,

    /// Number of images in the batch
    #[arg(short, long, default_value = "1")]
    batch: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    ensure!(args.hole <= args.size, "hole ({}) is larger than the image ({})", args.hole, args.size);

    let mut config = match &args.config {
        Some(path) => ModelConfig::load(path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ModelConfig::new(),
    };
    config.discriminator.image_size = [args.size, args.size];

    let device = Default::default();
    let gan = InpaintingGanConfig::new()
        .with_config(config)
        .init::<SelectedBackend>(&device)?;

    let image = Tensor::<SelectedBackend, 4>::random(
        [args.batch, 3, args.size, args.size],
        Distribution::Uniform(0.0, 1.0),
        &device,
    );
    let mask = centred_hole(args.batch, args.size, args.hole, &device);

    let start = Instant::now();
    let output = gan.generate(image.clone(), mask.clone())?;
    let [coarse_min, coarse_max] = value_range(&output.coarse);
    let [refined_min, refined_max] = value_range(&output.refined);
    tracing::info!(
        coarse = ?output.coarse.dims(),
        refined = ?output.refined.dims(),
        coarse_min,
        coarse_max,
        refined_min,
        refined_max,
        elapsed_ms = start.elapsed().as_millis(),
        "generate completed"
    );

    let start = Instant::now();
    let composite = output.composite(image.clone(), mask.clone());
    let real = gan.discriminate(image, mask.clone())?;
    let fake = gan.discriminate(composite, mask)?;
    tracing::info!(
        real = ?real.into_data().to_vec::<f32>().unwrap_or_default(),
        fake = ?fake.into_data().to_vec::<f32>().unwrap_or_default(),
        elapsed_ms = start.elapsed().as_millis(),
        "discriminate completed"
    );

    Ok(())
}

fn centred_hole(batch: usize, size: usize, hole: usize, device: &Device<SelectedBackend>) -> Tensor<SelectedBackend, 4> {
    let start = (size - hole) / 2;
    let mut plane = vec![0.0f32; size * size];
    for y in start..start + hole {
        plane[y * size + start..y * size + start + hole].fill(1.0);
    }
    Tensor::from_data(TensorData::new(plane.repeat(batch), [batch, 1, size, size]), device)
}

fn value_range(tensor: &Tensor<SelectedBackend, 4>) -> [f32; 2] {
    [
        tensor.clone().min().into_scalar(),
        tensor.clone().max().into_scalar(),
    ]
}
