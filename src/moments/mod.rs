//! Spectral method-of-moments initializer for the Bernoulli mixture.
//!
//! Recovers an approximate parameter matrix and mixing-weight vector from
//! the second- and third-moment structure of the data, without needing a
//! starting guess. The estimate is consistent but not locally optimal;
//! it is meant to seed the EM refiner, not to replace it.

use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use nalgebra::DVector;
use nshare::{IntoNalgebra, IntoNdarray2};

use crate::error::FitError;
use crate::svd::SVD;

const PINV_EPS: f64 = 1e-12;
const LSTSQ_EPS: f64 = 1e-12;

/// Initial mixture parameters from the moment estimator.
///
/// The cluster index order of `feature_probs` columns and `weights`
/// entries is arbitrary: the joint diagonalization recovers clusters only
/// up to permutation and sign, so callers must not read any meaning into
/// column order.
#[derive(Debug)]
pub struct MomentEstimate {
    /// n x k matrix; entry (i, c) estimates P(feature i = 1 | cluster c).
    pub feature_probs: Array2<f64>,
    /// Length-k mixing weights, nonnegative and summing to 1.
    pub weights: Array1<f64>,
}

/// One-shot spectral estimate of the mixture parameters.
///
/// Whitens the data through the top-k SVD of the empirical second moment,
/// forms one feature-conditioned slice of the third-moment tensor per
/// feature, diagonalizes all slices with the orthogonal basis of the
/// slice whose spectrum is best separated, and reads the parameter rows
/// off the diagonals. Mixing weights come from the squared least-squares
/// solution of `M * x = E` against the empirical feature means.
pub fn estimate(x: ArrayView2<f64>, k: usize) -> Result<MomentEstimate, FitError> {
    let (nsamples, nfeatures) = x.dim();
    if k == 0 {
        return Err(FitError::ZeroClusters);
    }
    if nsamples == 0 || nfeatures == 0 {
        return Err(FitError::EmptyDataset);
    }
    if k > nfeatures {
        return Err(FitError::TooManyClusters {
            k,
            features: nfeatures,
        });
    }

    let scale = nsamples as f64;
    let mean = x.sum_axis(Axis(0)) / scale;
    let second_moment = x.t().dot(&x) / scale;

    let svd = SVD::compute(&second_moment.view())?;
    let singular = svd.s();

    // The whitening step divides by these singular values through the
    // pseudo-inverse; refuse data whose numerical rank is below k.
    let tolerance = singular[0] * nfeatures as f64 * f64::EPSILON;
    let rank = singular.iter().filter(|&&v| v > tolerance).count();
    if rank < k {
        return Err(FitError::RankDeficient { k, rank });
    }

    let mut basis = svd.u().slice(s![.., ..k]).to_owned();
    for (mut column, &value) in basis.columns_mut().into_iter().zip(singular.iter()) {
        column *= value.sqrt();
    }

    let pseudo = basis
        .view()
        .into_nalgebra()
        .clone_owned()
        .pseudo_inverse(PINV_EPS)
        .map_err(|_| FitError::SvdDidNotConverge)?
        .into_ndarray2();
    let whitened = pseudo.dot(&x.t());

    // One k x k slice of the whitened third-moment tensor per feature.
    // The diagonalizer is taken from the slice with the largest minimum
    // consecutive singular-value gap; a slice with a degenerate spectrum
    // would leave the cluster directions unidentifiable. With k = 1 there
    // are no consecutive pairs and the fold yields +inf, so the first
    // slice's (trivial) basis is used.
    let mut slices = Vec::with_capacity(nfeatures);
    let mut best_gap = 0.0;
    let mut diagonalizer: Option<Array2<f64>> = None;
    for i in 0..nfeatures {
        let weighted = &whitened * &x.column(i);
        let slice = weighted.dot(&whitened.t()) / scale;

        let slice_svd = SVD::compute(&slice.view())?;
        let values = slice_svd.s();
        let gap = values
            .iter()
            .zip(values.iter().skip(1))
            .map(|(hi, lo)| hi - lo)
            .fold(f64::INFINITY, f64::min);
        if gap > best_gap {
            best_gap = gap;
            diagonalizer = Some(slice_svd.u().clone());
        }

        slices.push(slice);
    }
    let diagonalizer = diagonalizer.ok_or(FitError::NoSpectralGap)?;

    let mut feature_probs = Array2::zeros((nfeatures, k));
    for (i, slice) in slices.iter().enumerate() {
        let rotated = diagonalizer.t().dot(slice).dot(&diagonalizer);
        feature_probs.row_mut(i).assign(&rotated.diag());
    }

    // Squaring the least-squares solution discards the sign information
    // the diagonalization cannot recover anyway.
    let design = feature_probs.view().into_nalgebra().clone_owned();
    let target = DVector::from_iterator(nfeatures, mean.iter().cloned());
    let lstsq = nalgebra::SVD::try_new(design, true, true, f64::EPSILON, 1000)
        .ok_or(FitError::SvdDidNotConverge)?;
    let solution = lstsq
        .solve(&target, LSTSQ_EPS)
        .map_err(FitError::WeightSolveFailed)?;

    let mut weights = Array1::from_iter(solution.iter().map(|v| v * v));
    let total = weights.sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(FitError::WeightSolveFailed(
            "least-squares weight estimate has no mass",
        ));
    }
    weights /= total;

    Ok(MomentEstimate {
        feature_probs,
        weights,
    })
}
