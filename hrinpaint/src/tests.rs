use burn::{
    backend::{Autodiff, NdArray},
    prelude::*,
    tensor::Distribution,
};

use crate::{
    config::{AttentionConfig, DiscriminatorConfig, GeneratorConfig, ModelConfig},
    error::InpaintError,
    models::gan::InpaintingGanConfig,
};

pub type TestBackend = NdArray<f32>;
pub type TestAutodiffBackend = Autodiff<TestBackend>;

/// `[batch, 1, size, size]` mask with a centred `hole × hole` square of ones.
pub fn centred_square_mask<B: Backend>(
    batch: usize,
    size: usize,
    hole: usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    let start = (size - hole) / 2;
    let mut plane = vec![0.0f32; size * size];
    for y in start..start + hole {
        for x in start..start + hole {
            plane[y * size + x] = 1.0;
        }
    }
    let values = plane.repeat(batch);
    Tensor::from_data(TensorData::new(values, [batch, 1, size, size]), device)
}

fn max_abs_outside_hole(
    lhs: Tensor<TestBackend, 4>,
    rhs: Tensor<TestBackend, 4>,
    mask: Tensor<TestBackend, 4>,
) -> f32 {
    let known = mask.neg().add_scalar(1.0);
    ((lhs - rhs) * known).abs().max().into_scalar()
}

#[test]
fn default_configuration_is_valid() {
    let config = ModelConfig::new();

    assert!(config.validate().is_ok());
    assert_eq!(config.generator.input_multiple(), 256);
    assert_eq!(config.discriminator.projection_features(), 16 * 8 * 8);
}

#[test]
fn coarse_size_must_survive_the_coarse_encoder() {
    let config =
        ModelConfig::new().with_generator(GeneratorConfig::new().with_coarse_size([256, 254]));

    match config.validate() {
        Err(InpaintError::InvalidConfiguration { reason }) => {
            assert!(reason.contains("Coarse size"));
        }
        other => panic!("Expected InvalidConfiguration error, got {other:?}"),
    }
}

#[test]
fn empty_patch_grid_is_rejected() {
    let config = ModelConfig::new().with_generator(
        GeneratorConfig::new().with_attention(AttentionConfig::new().with_patch_grid(0)),
    );

    assert!(matches!(
        config.validate(),
        Err(InpaintError::InvalidConfiguration { .. })
    ));
}

#[test]
fn attention_epsilon_must_be_positive() {
    for epsilon in [0.0, -1.0, f64::NAN] {
        let config = ModelConfig::new().with_generator(
            GeneratorConfig::new().with_attention(AttentionConfig::new().with_epsilon(epsilon)),
        );

        assert!(config.validate().is_err(), "epsilon {epsilon} accepted");
    }
}

#[test]
fn discriminator_size_must_survive_six_blocks() {
    let config = ModelConfig::new()
        .with_discriminator(DiscriminatorConfig::new().with_image_size([512, 500]));

    match config.validate() {
        Err(InpaintError::InvalidConfiguration { reason }) => {
            assert!(reason.contains("multiple of 64"));
        }
        other => panic!("Expected InvalidConfiguration error, got {other:?}"),
    }
}

#[test]
fn zero_power_iterations_are_rejected() {
    let config = ModelConfig::new()
        .with_discriminator(DiscriminatorConfig::new().with_power_iterations(0));

    assert!(config.validate().is_err());
}

#[test]
fn invalid_configuration_fails_at_init() {
    let config = InpaintingGanConfig::new().with_config(
        ModelConfig::new().with_generator(GeneratorConfig::new().with_coarse_size([0, 256])),
    );

    assert!(config.init::<TestBackend>(&Default::default()).is_err());
}

#[test]
fn generate_and_discriminate_end_to_end_at_reduced_resolution() {
    let device = Default::default();
    let config = ModelConfig::new()
        .with_generator(
            GeneratorConfig::new()
                .with_coarse_size([32, 32])
                .with_attention(AttentionConfig::new().with_patch_grid(4)),
        )
        .with_discriminator(DiscriminatorConfig::new().with_image_size([64, 64]));
    let gan = InpaintingGanConfig::new()
        .with_config(config)
        .init::<TestBackend>(&device)
        .unwrap();

    let image = Tensor::<TestBackend, 4>::random([2, 3, 64, 64], Distribution::Uniform(0.0, 1.0), &device);
    let mask = centred_square_mask(2, 64, 16, &device);

    let output = gan.generate(image.clone(), mask.clone()).unwrap();
    assert_eq!(output.coarse.dims(), [2, 3, 32, 32]);
    assert_eq!(output.refined.dims(), [2, 3, 64, 64]);
    for tensor in [output.coarse.clone(), output.refined.clone()] {
        let values = tensor.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    let composite = output.composite(image.clone(), mask.clone());
    assert_eq!(max_abs_outside_hole(composite.clone(), image.clone(), mask.clone()), 0.0);
    let coarse_composite = output.coarse_composite(image.clone(), mask.clone());
    assert_eq!(max_abs_outside_hole(coarse_composite, image, mask.clone()), 0.0);

    let score = gan.discriminate(composite, mask).unwrap();
    assert_eq!(score.dims(), [2, 1]);
}

#[test]
fn generate_is_deterministic() {
    let device = Default::default();
    let gan = InpaintingGanConfig::new()
        .with_config(
            ModelConfig::new().with_generator(
                GeneratorConfig::new()
                    .with_coarse_size([16, 16])
                    .with_attention(AttentionConfig::new().with_patch_grid(2)),
            ),
        )
        .init::<TestBackend>(&device)
        .unwrap();
    let image = Tensor::<TestBackend, 4>::random([1, 3, 32, 32], Distribution::Uniform(0.0, 1.0), &device);
    let mask = centred_square_mask(1, 32, 8, &device);

    let first = gan.generate(image.clone(), mask.clone()).unwrap();
    let second = gan.generate(image, mask).unwrap();

    assert_eq!((first.refined - second.refined).abs().max().into_scalar(), 0.0);
}

#[test]
#[ignore = "full 512×512 forward pass is slow on the CPU backend"]
fn generate_at_reference_resolution() {
    let device = Default::default();
    let gan = InpaintingGanConfig::new().init::<TestBackend>(&device).unwrap();

    let image = Tensor::<TestBackend, 4>::random([1, 3, 512, 512], Distribution::Uniform(0.0, 1.0), &device);
    let mask = centred_square_mask(1, 512, 128, &device);

    let output = gan.generate(image.clone(), mask.clone()).unwrap();
    assert_eq!(output.coarse.dims(), [1, 3, 256, 256]);
    assert_eq!(output.refined.dims(), [1, 3, 512, 512]);
    for tensor in [output.coarse.clone(), output.refined.clone()] {
        let values = tensor.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    let composite = output.composite(image.clone(), mask.clone());
    assert_eq!(max_abs_outside_hole(composite.clone(), image, mask.clone()), 0.0);
    assert_eq!(gan.discriminate(composite, mask).unwrap().dims(), [1, 1]);
}
