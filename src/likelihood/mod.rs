use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::error::FitError;
use crate::utils;

/// Per-row log-likelihood of a binary dataset under one cluster's
/// independent-Bernoulli parameters.
///
/// For each sample row this is `sum_i x_i*ln(mu_i) + (1-x_i)*ln(1-mu_i)`,
/// evaluated as `X . (ln mu - ln(1-mu)) + sum_i ln(1-mu_i)` so the whole
/// dataset goes through one matrix-vector product. The two forms agree on
/// 0/1 data.
pub fn bernoulli_log_lik(
    x: ArrayView2<f64>,
    mu: ArrayView1<f64>,
) -> Result<Array1<f64>, FitError> {
    if mu.len() != x.ncols() {
        return Err(FitError::FeatureMismatch {
            expected: x.ncols(),
            found: mu.len(),
        });
    }
    Ok(log_lik_clipped(x, mu))
}

/// Same computation with shapes already validated by the caller. The
/// parameter vector is clipped away from 0 and 1 before the logarithms;
/// skipping that would let non-finite values leak into the row sums.
pub(crate) fn log_lik_clipped(x: ArrayView2<f64>, mu: ArrayView1<f64>) -> Array1<f64> {
    let clipped = mu.mapv(utils::clip_probability);
    let log_fail = clipped.mapv(|p| (1.0 - p).ln());
    let log_ratio = clipped.mapv(f64::ln) - &log_fail;

    x.dot(&log_ratio) + log_fail.sum()
}
