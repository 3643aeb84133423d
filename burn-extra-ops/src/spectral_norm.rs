//! # Spectral Normalization
//!
//! A 2D convolution whose kernel is divided by an estimate of its largest singular
//! value before every application (Miyato et al., 2018). The estimate comes from a
//! few steps of power iteration started from a persistent vector `u`.
//!
//! Unlike the usual in-place formulation, the forward pass never writes `u` back:
//! it is advanced explicitly with [`SpectralNormConv2d::refresh`], typically once per
//! optimizer step by the training loop.

use burn::{
    module::Param,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::{module::conv2d, ops::ConvOptions, Distribution},
};

use crate::TensorExtraOps;

/// Configuration for the `SpectralNormConv2d` module.
#[derive(Config, Debug)]
pub struct SpectralNormConv2dConfig {
    /// Input and output channels.
    pub channels: [usize; 2],
    /// Kernel height and width.
    pub kernel_size: [usize; 2],
    #[config(default = "[1, 1]")]
    pub stride: [usize; 2],
    /// Symmetric zero padding.
    #[config(default = "[0, 0]")]
    pub padding: [usize; 2],
    #[config(default = "[1, 1]")]
    pub dilation: [usize; 2],
    #[config(default = true)]
    pub bias: bool,
    /// Power-iteration steps run on every forward pass.
    #[config(default = 1)]
    pub power_iterations: usize,
    #[config(default = 1e-12)]
    pub epsilon: f64,
}

impl SpectralNormConv2dConfig {
    /// Initializes a new `SpectralNormConv2d` module.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SpectralNormConv2d<B> {
        let conv = Conv2dConfig::new(self.channels, self.kernel_size)
            .with_stride(self.stride)
            .with_padding(PaddingConfig2d::Explicit(self.padding[0], self.padding[1]))
            .with_dilation(self.dilation)
            .with_bias(self.bias)
            .init(device);

        let u = Tensor::<B, 1>::random([self.channels[1]], Distribution::Normal(0.0, 1.0), device)
            .l2_normalize(0, self.epsilon);

        SpectralNormConv2d {
            conv,
            u: Param::from_tensor(u),
            stride: self.stride,
            padding: self.padding,
            dilation: self.dilation,
            power_iterations: self.power_iterations.max(1),
            epsilon: self.epsilon,
        }
    }
}

/// Spectrally normalized 2D convolution.
#[derive(Module, Debug)]
pub struct SpectralNormConv2d<B: Backend> {
    /// The wrapped convolution; its weight is the un-normalized kernel.
    pub conv: Conv2d<B>,
    /// Left singular vector estimate, shape `[out_channels]`. Never receives gradients.
    pub u: Param<Tensor<B, 1>>,
    stride: [usize; 2],
    padding: [usize; 2],
    dilation: [usize; 2],
    power_iterations: usize,
    epsilon: f64,
}

impl<B: Backend> SpectralNormConv2d<B> {
    /// Applies the convolution with the spectrally normalized kernel.
    ///
    /// # Shapes
    /// - input: `[batch, in_channels, height, width]`
    /// - output: `[batch, out_channels, height_out, width_out]`
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        conv2d(
            input,
            self.normalized_weight(),
            self.conv.bias.as_ref().map(|bias| bias.val()),
            ConvOptions::new(self.stride, self.padding, self.dilation, 1),
        )
    }

    /// The kernel divided by its estimated spectral norm.
    ///
    /// Gradients flow through the weight (including through sigma) but not through
    /// the power-iteration vectors.
    pub fn normalized_weight(&self) -> Tensor<B, 4> {
        let weight = self.conv.weight.val();
        let [rows, cols] = self.matrix_dims();
        let matrix = weight.clone().reshape([rows, cols]);

        let (u, v) = self.power_iteration(matrix.clone().detach(), self.u.val().detach());
        let sigma = u
            .reshape([1, rows])
            .matmul(matrix)
            .matmul(v.reshape([cols, 1]))
            .clamp_min(self.epsilon);

        weight / sigma.reshape([1, 1, 1, 1])
    }

    /// Advances the persistent singular vector estimate by `power_iterations` steps.
    ///
    /// Consumes and returns the module, matching how optimizers hand modules back.
    pub fn refresh(mut self) -> Self {
        let [rows, cols] = self.matrix_dims();
        let matrix = self.conv.weight.val().detach().reshape([rows, cols]);
        let (u, _) = self.power_iteration(matrix, self.u.val().detach());
        self.u = Param::from_tensor(u);
        self
    }

    fn matrix_dims(&self) -> [usize; 2] {
        let [out_channels, in_channels, kh, kw] = self.conv.weight.dims();
        [out_channels, in_channels * kh * kw]
    }

    fn power_iteration(&self, matrix: Tensor<B, 2>, u: Tensor<B, 1>) -> (Tensor<B, 1>, Tensor<B, 1>) {
        let [rows, cols] = matrix.dims();
        let mut u = u;
        let mut v = Tensor::zeros([cols], &matrix.device());

        for _ in 0..self.power_iterations {
            v = matrix
                .clone()
                .transpose()
                .matmul(u.reshape([rows, 1]))
                .reshape([cols])
                .l2_normalize(0, self.epsilon);
            u = matrix
                .clone()
                .matmul(v.clone().reshape([cols, 1]))
                .reshape([rows])
                .l2_normalize(0, self.epsilon);
        }

        (u, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray<f32>;

    /// Largest singular value of a weight tensor, via a long independent power iteration.
    fn top_singular_value(weight: Tensor<TestBackend, 4>) -> f32 {
        let [o, i, kh, kw] = weight.dims();
        let matrix = weight.reshape([o, i * kh * kw]);
        let mut v = Tensor::<TestBackend, 1>::ones([i * kh * kw], &matrix.device()).l2_normalize(0, 1e-12);
        for _ in 0..500 {
            let u = matrix.clone().matmul(v.reshape([i * kh * kw, 1])).reshape([o]);
            v = matrix
                .clone()
                .transpose()
                .matmul(u.reshape([o, 1]))
                .reshape([i * kh * kw])
                .l2_normalize(0, 1e-12);
        }
        let u = matrix.matmul(v.reshape([i * kh * kw, 1]));
        (u.clone() * u).sum().sqrt().into_scalar()
    }

    #[test]
    fn normalized_weight_has_unit_spectral_norm() {
        let device = Default::default();
        let conv = SpectralNormConv2dConfig::new([4, 8], [3, 3])
            .with_power_iterations(200)
            .init::<TestBackend>(&device);

        let sigma = top_singular_value(conv.normalized_weight());

        assert!((sigma - 1.0).abs() < 1e-2, "spectral norm was {sigma}");
    }

    #[test]
    fn forward_is_repeatable_and_keeps_conv_arithmetic() {
        let device = Default::default();
        let conv = SpectralNormConv2dConfig::new([4, 6], [3, 3])
            .with_stride([2, 2])
            .with_padding([1, 1])
            .init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random([2, 4, 16, 16], Distribution::Normal(0.0, 1.0), &device);

        let first = conv.forward(x.clone());
        let second = conv.forward(x);

        assert_eq!(first.dims(), [2, 6, 8, 8]);
        let diff = (first - second).abs().max().into_scalar();
        assert_eq!(diff, 0.0, "forward pass must not carry hidden state");
    }

    #[test]
    fn refresh_moves_u_and_keeps_it_unit_length() {
        let device = Default::default();
        let conv = SpectralNormConv2dConfig::new([3, 5], [3, 3]).init::<TestBackend>(&device);
        let before = conv.u.val();

        let conv = conv.refresh();
        let after = conv.u.val();

        let norm = (after.clone() * after.clone()).sum().sqrt().into_scalar();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!((after - before).abs().sum().into_scalar() > 0.0);
    }

    #[test]
    fn repeated_refreshes_bring_the_spectral_norm_to_one() {
        let device = Default::default();
        let mut conv = SpectralNormConv2dConfig::new([16, 32], [3, 3]).init::<TestBackend>(&device);
        let stale = (top_singular_value(conv.normalized_weight()) - 1.0).abs();

        for _ in 0..100 {
            conv = conv.refresh();
        }
        let refreshed = (top_singular_value(conv.normalized_weight()) - 1.0).abs();

        assert!(refreshed < 2e-2, "spectral norm off by {refreshed} after refreshing");
        assert!(refreshed <= stale + 1e-3, "{refreshed} > {stale}");
    }

    #[test]
    fn gradients_reach_the_kernel_but_not_u() {
        type Ad = Autodiff<TestBackend>;
        let device = Default::default();
        let conv = SpectralNormConv2dConfig::new([2, 3], [3, 3])
            .with_padding([1, 1])
            .init::<Ad>(&device);
        let x = Tensor::<Ad, 4>::random([1, 2, 8, 8], Distribution::Normal(0.0, 1.0), &device);

        let grads = conv.forward(x).sum().backward();

        assert!(conv.conv.weight.grad(&grads).is_some());
        assert!(conv.u.grad(&grads).is_none());
    }
}
