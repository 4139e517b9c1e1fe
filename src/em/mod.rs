//! EM refinement of a Bernoulli mixture from a given starting point.
//!
//! Each iteration is one E-step (responsibilities from log-scores through
//! a stabilized row-wise softmax) and one M-step (responsibility-weighted
//! re-estimation of weights and feature probabilities), until the L1
//! change in the mixing weights drops below `eps` or `max_iter` is hit.

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use std::sync::Arc;

use crate::error::FitError;
use crate::likelihood;
use crate::utils;

/// Callback invoked once per iteration with (iteration index, current
/// mixing weights, L1 change in the weights). Must not assume any
/// particular call ordering guarantees beyond once-per-iteration.
pub type Observer = Arc<dyn Fn(usize, &Array1<f64>, f64) + Send + Sync>;

/// Computational layout of the E-step. All variants produce the same
/// result up to floating-point rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmStrategy {
    /// One likelihood evaluation per cluster, sequential.
    PerClusterLoop,
    /// All clusters in one broadcast matrix product.
    Batched,
    /// The per-cluster evaluations dispatched on the rayon pool and
    /// gathered by cluster index; only the E-step is concurrent.
    PerClusterConcurrent,
}

impl Default for EmStrategy {
    fn default() -> Self {
        Self::PerClusterLoop
    }
}

pub struct EmBuilder {
    eps: f64,
    max_iter: usize,
    strategy: EmStrategy,
    verbose: bool,
    observer: Option<Observer>,
}

impl EmBuilder {
    pub fn new() -> Self {
        EmBuilder {
            eps: 1e-3,
            max_iter: 500,
            strategy: EmStrategy::default(),
            verbose: false,
            observer: None,
        }
    }

    /// L1 stopping threshold on the mixing-weight change.
    pub fn eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Iteration cap; hitting it returns best-effort parameters with
    /// `converged = false` rather than looping forever.
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn strategy(mut self, strategy: EmStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Route per-iteration progress through `log::info!`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Install a progress callback. Diagnostics only; it cannot alter
    /// the iteration.
    pub fn observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(usize, &Array1<f64>, f64) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn build(self) -> Em {
        Em {
            eps: self.eps,
            max_iter: self.max_iter,
            strategy: self.strategy,
            verbose: self.verbose,
            observer: self.observer,
        }
    }
}

impl Default for EmBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Refined mixture parameters and the soft assignments from the final
/// E-step.
#[derive(Debug)]
pub struct EmFit {
    pub feature_probs: Array2<f64>,
    pub weights: Array1<f64>,
    pub responsibilities: Array2<f64>,
    pub iterations: usize,
    pub converged: bool,
}

pub struct Em {
    eps: f64,
    max_iter: usize,
    strategy: EmStrategy,
    verbose: bool,
    observer: Option<Observer>,
}

impl Em {
    /// Refine `(feature_probs, weights)` on the dataset until the mixing
    /// weights stabilize. Weight entries at or below zero are floored and
    /// the vector renormalized before the first iteration.
    pub fn refine(
        &self,
        x: ArrayView2<f64>,
        feature_probs: ArrayView2<f64>,
        weights: ArrayView1<f64>,
    ) -> Result<EmFit, FitError> {
        validate_dimensions(&x, &feature_probs, &weights)?;
        let (nsamples, _) = x.dim();
        let k = feature_probs.ncols();

        let mut probs = feature_probs.to_owned();
        let mut weights = utils::floor_and_normalize(weights);
        let mut responsibilities = Array2::zeros((nsamples, k));
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iter {
            iterations += 1;

            let mut scores = log_scores(x, probs.view(), weights.view(), self.strategy);
            utils::softmax_rows_inplace(&mut scores);
            responsibilities = scores;

            let cluster_mass = responsibilities.sum_axis(Axis(0));
            let updated = &cluster_mass / responsibilities.sum();
            probs = x.t().dot(&responsibilities) / &cluster_mass;

            let delta = utils::l1_distance(updated.view(), weights.view());
            weights = updated;
            self.notify(iterations, &weights, delta);

            if delta < self.eps {
                converged = true;
                break;
            }
        }

        Ok(EmFit {
            feature_probs: probs,
            weights,
            responsibilities,
            iterations,
            converged,
        })
    }

    fn notify(&self, iteration: usize, weights: &Array1<f64>, delta: f64) {
        if self.verbose {
            info!(
                "em iteration {}: weight change {:.6e}, weights {}",
                iteration, delta, weights
            );
        } else {
            debug!("em iteration {}: weight change {:.6e}", iteration, delta);
        }
        if let Some(observer) = &self.observer {
            observer(iteration, weights, delta);
        }
    }
}

/// Total data log-likelihood under the given mixture parameters.
pub fn log_likelihood(
    x: ArrayView2<f64>,
    feature_probs: ArrayView2<f64>,
    weights: ArrayView1<f64>,
) -> Result<f64, FitError> {
    validate_dimensions(&x, &feature_probs, &weights)?;
    let scores = log_scores_batched(x, feature_probs, weights);
    Ok(scores
        .rows()
        .into_iter()
        .map(utils::log_sum_exp)
        .sum())
}

fn validate_dimensions(
    x: &ArrayView2<f64>,
    feature_probs: &ArrayView2<f64>,
    weights: &ArrayView1<f64>,
) -> Result<(), FitError> {
    let (nsamples, nfeatures) = x.dim();
    if nsamples == 0 || nfeatures == 0 {
        return Err(FitError::EmptyDataset);
    }
    if feature_probs.nrows() != nfeatures {
        return Err(FitError::FeatureMismatch {
            expected: nfeatures,
            found: feature_probs.nrows(),
        });
    }
    let k = feature_probs.ncols();
    if k == 0 {
        return Err(FitError::ZeroClusters);
    }
    if weights.len() != k {
        return Err(FitError::ClusterMismatch {
            expected: k,
            found: weights.len(),
        });
    }
    Ok(())
}

fn log_scores(
    x: ArrayView2<f64>,
    probs: ArrayView2<f64>,
    weights: ArrayView1<f64>,
    strategy: EmStrategy,
) -> Array2<f64> {
    match strategy {
        EmStrategy::PerClusterLoop => log_scores_loop(x, probs, weights),
        EmStrategy::Batched => log_scores_batched(x, probs, weights),
        EmStrategy::PerClusterConcurrent => log_scores_concurrent(x, probs, weights),
    }
}

fn log_scores_loop(
    x: ArrayView2<f64>,
    probs: ArrayView2<f64>,
    weights: ArrayView1<f64>,
) -> Array2<f64> {
    let mut scores = Array2::zeros((x.nrows(), weights.len()));
    for (c, mu) in probs.columns().into_iter().enumerate() {
        let column = likelihood::log_lik_clipped(x, mu) + weights[c].ln();
        scores.column_mut(c).assign(&column);
    }
    scores
}

fn log_scores_batched(
    x: ArrayView2<f64>,
    probs: ArrayView2<f64>,
    weights: ArrayView1<f64>,
) -> Array2<f64> {
    let clipped = probs.mapv(utils::clip_probability);
    let log_fail = clipped.mapv(|p| (1.0 - p).ln());
    let log_ratio = clipped.mapv(f64::ln) - &log_fail;
    let offsets = log_fail.sum_axis(Axis(0)) + weights.mapv(f64::ln);

    x.dot(&log_ratio) + &offsets
}

// Each cluster's column is a pure function of (dataset, its parameter
// column, its weight); completion order is irrelevant, assembly order by
// cluster index is not.
fn log_scores_concurrent(
    x: ArrayView2<f64>,
    probs: ArrayView2<f64>,
    weights: ArrayView1<f64>,
) -> Array2<f64> {
    let k = weights.len();
    let columns: Vec<(usize, Array1<f64>)> = (0..k)
        .into_par_iter()
        .map(|c| {
            (
                c,
                likelihood::log_lik_clipped(x, probs.column(c)) + weights[c].ln(),
            )
        })
        .collect();

    let mut scores = Array2::zeros((x.nrows(), k));
    for (c, column) in columns {
        scores.column_mut(c).assign(&column);
    }
    scores
}
