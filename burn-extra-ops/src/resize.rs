//! Bilinear resizing expressed as two matrix products.
//!
//! `resize_bilinear` computes `R_h · X · R_wᵀ` with precomputed interpolation
//! matrices, so it runs and differentiates on every backend that has `matmul`.
//! Sampling follows the half-pixel convention (`align_corners = false`).

use burn::prelude::*;

/// Resizes the two trailing axes of `x` to `size` with bilinear interpolation.
///
/// Returns `x` unchanged when it already has the requested size.
///
/// # Shapes
/// - x: `[batch, channels, height, width]`
/// - output: `[batch, channels, size[0], size[1]]`
pub fn resize_bilinear<B: Backend>(x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [batch, channels, height, width] = x.dims();
    let [out_height, out_width] = size;
    if [height, width] == size {
        return x;
    }
    let device = x.device();

    let x = if width == out_width {
        x
    } else {
        let columns = interpolation_matrix::<B>(width, out_width, &device);
        x.reshape([batch * channels * height, width])
            .matmul(columns.transpose())
            .reshape([batch, channels, height, out_width])
    };

    if height == out_height {
        return x;
    }
    let rows = interpolation_matrix::<B>(height, out_height, &device);
    x.swap_dims(2, 3)
        .reshape([batch * channels * out_width, height])
        .matmul(rows.transpose())
        .reshape([batch, channels, out_width, out_height])
        .swap_dims(2, 3)
}

/// `[output, input]` matrix whose row `i` holds the two bilinear taps of output
/// sample `i`. Every row sums to one.
fn interpolation_matrix<B: Backend>(input: usize, output: usize, device: &B::Device) -> Tensor<B, 2> {
    let values = interpolation_weights(input, output);
    Tensor::from_data(TensorData::new(values, [output, input]), device)
}

fn interpolation_weights(input: usize, output: usize) -> Vec<f32> {
    let scale = input as f64 / output as f64;
    let last = input - 1;
    let mut weights = vec![0.0f32; output * input];

    for (row, taps) in weights.chunks_mut(input).enumerate() {
        let source = ((row as f64 + 0.5) * scale - 0.5).max(0.0);
        let lower = (source.floor() as usize).min(last);
        let upper = (lower + 1).min(last);
        let fraction = (source - lower as f64).clamp(0.0, 1.0) as f32;

        taps[lower] += 1.0 - fraction;
        taps[upper] += fraction;
    }
    weights
}
