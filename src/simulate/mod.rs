//! Seeded sampling from a known Bernoulli mixture, for reproducible
//! round-trip experiments and benches.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::FitError;

/// Draws `n_samples` binary rows from the mixture described by
/// `feature_probs` (n x k) and `weights` (length k, need not be
/// normalized). Returns the dataset together with the ground-truth
/// cluster label of each row.
pub fn sample_mixture(
    feature_probs: ArrayView2<f64>,
    weights: ArrayView1<f64>,
    n_samples: usize,
    seed: u64,
) -> Result<(Array2<f64>, Vec<usize>), FitError> {
    let (nfeatures, k) = feature_probs.dim();
    if k == 0 {
        return Err(FitError::ZeroClusters);
    }
    if weights.len() != k {
        return Err(FitError::ClusterMismatch {
            expected: k,
            found: weights.len(),
        });
    }
    let total: f64 = weights.sum();
    if weights.iter().any(|&w| w < 0.0) || !total.is_finite() || total <= 0.0 {
        return Err(FitError::InvalidWeights);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = Array2::zeros((n_samples, nfeatures));
    let mut labels = Vec::with_capacity(n_samples);

    for mut row in data.rows_mut() {
        let mut draw = rng.random::<f64>() * total;
        let mut cluster = k - 1;
        for (c, &w) in weights.iter().enumerate() {
            if draw < w {
                cluster = c;
                break;
            }
            draw -= w;
        }

        for (i, cell) in row.iter_mut().enumerate() {
            if rng.random::<f64>() < feature_probs[[i, cluster]] {
                *cell = 1.0;
            }
        }
        labels.push(cluster);
    }

    Ok((data, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Axis};

    #[test]
    fn test_shapes_and_labels() {
        let probs = array![[0.9, 0.1], [0.1, 0.9]];
        let weights = array![0.3, 0.7];

        let (data, labels) = sample_mixture(probs.view(), weights.view(), 100, 1).unwrap();

        assert_eq!(data.dim(), (100, 2));
        assert_eq!(labels.len(), 100);
        assert!(labels.iter().all(|&l| l < 2));
        assert!(data.iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let probs = array![[0.5, 0.2], [0.4, 0.8]];
        let weights = array![0.5, 0.5];

        let (a, la) = sample_mixture(probs.view(), weights.view(), 50, 77).unwrap();
        let (b, lb) = sample_mixture(probs.view(), weights.view(), 50, 77).unwrap();

        assert_eq!(a, b);
        assert_eq!(la, lb);
    }

    #[test]
    fn test_empirical_means_match_mixture() {
        let probs = array![[0.9, 0.1], [0.2, 0.6]];
        let weights = array![0.5, 0.5];

        let (data, _) = sample_mixture(probs.view(), weights.view(), 20000, 13).unwrap();
        let means = data.mean_axis(Axis(0)).unwrap();

        // E[x_i] = sum_c w_c * p_ic
        assert_abs_diff_eq!(means[0], 0.5, epsilon = 0.02);
        assert_abs_diff_eq!(means[1], 0.4, epsilon = 0.02);
    }

    #[test]
    fn test_invalid_weights() {
        let probs = array![[0.5, 0.5]];

        let err =
            sample_mixture(probs.view(), array![-0.5, 1.5].view(), 10, 0).unwrap_err();
        assert_eq!(err, FitError::InvalidWeights);

        let err = sample_mixture(probs.view(), array![0.0, 0.0].view(), 10, 0).unwrap_err();
        assert_eq!(err, FitError::InvalidWeights);
    }
}
