//! Full clustering pipeline: moment initialization, EM refinement, hard
//! assignment by arg-max responsibility.

use ndarray::{Array1, Array2, ArrayView2};

use crate::em::{Em, EmBuilder, EmStrategy};
use crate::error::FitError;
use crate::moments;
use crate::utils;

pub struct NaiveBayesClusteringBuilder {
    k: usize,
    eps: f64,
    max_iter: usize,
    strategy: EmStrategy,
    verbose: bool,
}

impl NaiveBayesClusteringBuilder {
    pub fn new(k: usize) -> Self {
        NaiveBayesClusteringBuilder {
            k,
            eps: 0.01,
            max_iter: 500,
            strategy: EmStrategy::default(),
            verbose: false,
        }
    }

    pub fn eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn strategy(mut self, strategy: EmStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn build(self) -> NaiveBayesClustering {
        let em = EmBuilder::new()
            .eps(self.eps)
            .max_iter(self.max_iter)
            .strategy(self.strategy)
            .verbose(self.verbose)
            .build();
        NaiveBayesClustering { k: self.k, em }
    }
}

pub struct NaiveBayesClustering {
    k: usize,
    em: Em,
}

/// Final mixture fit and the induced hard partition of the samples.
///
/// Cluster indices carry no intrinsic meaning; the moment initializer
/// recovers clusters only up to permutation, so two runs on related data
/// may label the same cluster differently.
#[derive(Debug)]
pub struct Clusters {
    pub feature_probs: Array2<f64>,
    pub weights: Array1<f64>,
    pub responsibilities: Array2<f64>,
    /// Per-sample cluster index, the arg-max of the responsibility row
    /// with ties broken toward the lowest index.
    pub labels: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
}

impl NaiveBayesClustering {
    pub fn fit(&self, x: ArrayView2<f64>) -> Result<Clusters, FitError> {
        let init = moments::estimate(x, self.k)?;
        let fit = self
            .em
            .refine(x, init.feature_probs.view(), init.weights.view())?;

        let labels = fit
            .responsibilities
            .rows()
            .into_iter()
            .map(utils::argmax_row)
            .collect();

        Ok(Clusters {
            feature_probs: fit.feature_probs,
            weights: fit.weights,
            responsibilities: fit.responsibilities,
            labels,
            iterations: fit.iterations,
            converged: fit.converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, ArrayView1, Axis};

    use crate::simulate::sample_mixture;

    fn column_close(column: ArrayView1<f64>, expected: &[f64], tolerance: f64) -> bool {
        column
            .iter()
            .zip(expected.iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }

    #[test]
    fn test_recovers_separated_two_cluster_mixture() {
        let _ = env_logger::builder().is_test(true).try_init();

        let truth = array![[0.9, 0.1], [0.1, 0.9], [0.9, 0.1], [0.1, 0.9]];
        let true_weights = array![0.5, 0.5];
        let (data, _) = sample_mixture(truth.view(), true_weights.view(), 2000, 42).unwrap();

        let clusters = NaiveBayesClusteringBuilder::new(2)
            .eps(0.001)
            .verbose(true)
            .build()
            .fit(data.view())
            .unwrap();

        assert!(clusters.converged);
        assert_abs_diff_eq!(clusters.weights.sum(), 1.0, epsilon = 1e-9);
        for &w in clusters.weights.iter() {
            assert_abs_diff_eq!(w, 0.5, epsilon = 0.05);
        }

        // Columns match the truth up to permutation.
        let first = clusters.feature_probs.index_axis(Axis(1), 0);
        let second = clusters.feature_probs.index_axis(Axis(1), 1);
        let direct = column_close(first, &[0.9, 0.1, 0.9, 0.1], 0.1)
            && column_close(second, &[0.1, 0.9, 0.1, 0.9], 0.1);
        let swapped = column_close(first, &[0.1, 0.9, 0.1, 0.9], 0.1)
            && column_close(second, &[0.9, 0.1, 0.9, 0.1], 0.1);
        assert!(
            direct || swapped,
            "recovered columns {:?} do not match the truth",
            clusters.feature_probs
        );
    }

    #[test]
    fn test_labels_are_argmax_of_responsibilities() {
        let truth = array![[0.9, 0.2], [0.1, 0.8], [0.8, 0.1]];
        let true_weights = array![0.4, 0.6];
        let (data, _) = sample_mixture(truth.view(), true_weights.view(), 800, 5).unwrap();

        let clusters = NaiveBayesClusteringBuilder::new(2)
            .build()
            .fit(data.view())
            .unwrap();

        assert_eq!(clusters.labels.len(), data.nrows());
        for (row, &label) in clusters.responsibilities.rows().into_iter().zip(&clusters.labels) {
            let argmax = row
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
                    if v > best.1 {
                        (i, v)
                    } else {
                        best
                    }
                })
                .0;
            assert_eq!(label, argmax);
        }
    }

    #[test]
    fn test_batched_strategy_end_to_end() {
        let truth = array![[0.85, 0.15], [0.15, 0.85], [0.85, 0.15], [0.15, 0.85]];
        let true_weights = array![0.5, 0.5];
        let (data, _) = sample_mixture(truth.view(), true_weights.view(), 1000, 9).unwrap();

        let clusters = NaiveBayesClusteringBuilder::new(2)
            .eps(0.001)
            .strategy(EmStrategy::Batched)
            .build()
            .fit(data.view())
            .unwrap();

        assert!(clusters.converged);
        assert_abs_diff_eq!(clusters.weights.sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_dataset_raises() {
        // Fewer distinguishable feature patterns than clusters.
        let mut data = Array2::zeros((40, 3));
        data.column_mut(1).fill(1.0);

        let err = NaiveBayesClusteringBuilder::new(2)
            .build()
            .fit(data.view())
            .unwrap_err();
        assert!(matches!(err, FitError::RankDeficient { .. }));
    }
}
