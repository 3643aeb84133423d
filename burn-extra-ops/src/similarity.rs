//! # Pairwise Cosine Similarity
//!
//! Batched cosine-similarity matrix between two sets of row vectors.

use burn::prelude::*;

use crate::TensorExtraOps;

/// Computes the cosine similarity between every row of `lhs` and every row of `rhs`.
///
/// # Shapes
/// - lhs: `[batch, n, features]`
/// - rhs: `[batch, m, features]`
/// - output: `[batch, n, m]`
///
/// Each vector norm is clamped to `epsilon` before dividing, so a zero vector yields
/// a similarity of 0 against everything instead of NaN. The result is clamped to
/// `[-1, 1]` to absorb rounding error.
pub fn cosine_similarity_matrix<B: Backend>(
    lhs: Tensor<B, 3>,
    rhs: Tensor<B, 3>,
    epsilon: f64,
) -> Tensor<B, 3> {
    let lhs = lhs.l2_normalize(2, epsilon);
    let rhs = rhs.l2_normalize(2, epsilon);

    lhs.matmul(rhs.swap_dims(1, 2)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    #[test]
    fn self_similarity_is_one_on_the_diagonal() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 3>::random([2, 6, 16], Distribution::Normal(0.0, 1.0), &device);

        let sim = cosine_similarity_matrix(x.clone(), x, 1e-8);
        let values = sim.into_data().to_vec::<f32>().unwrap();

        for batch in 0..2 {
            for i in 0..6 {
                let diag = values[batch * 36 + i * 6 + i];
                assert!((diag - 1.0).abs() < 1e-5, "diagonal entry was {diag}");
            }
        }
        assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn zero_vectors_do_not_produce_nan() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 3>::from_floats(
            [[[0.0, 0.0, 0.0], [1.0, 2.0, 2.0], [-1.0, -2.0, -2.0]]],
            &device,
        );

        let values = cosine_similarity_matrix(x.clone(), x, 1e-8)
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        assert!(values.iter().all(|v| v.is_finite()));
        assert_eq!(&values[0..3], &[0.0, 0.0, 0.0]);
        assert!((values[5] + 1.0).abs() < 1e-6);
    }
}
