use ndarray::{Array1, Array2, ArrayView2};
use nshare::{IntoNalgebra, IntoNdarray2};

use crate::error::FitError;

const MAX_SVD_ITERATIONS: usize = 1000;

/// Singular value decomposition with singular values sorted in
/// descending order, computed through nalgebra.
pub struct SVD {
    u: Array2<f64>,
    s: Array1<f64>,
    vt: Array2<f64>,
}

impl SVD {
    pub fn compute(array: &ArrayView2<f64>) -> Result<Self, FitError> {
        let matrix = array.into_nalgebra().clone_owned();

        let svd = nalgebra::SVD::try_new(matrix, true, true, f64::EPSILON, MAX_SVD_ITERATIONS)
            .ok_or(FitError::SvdDidNotConverge)?;

        let u = svd.u.ok_or(FitError::SvdDidNotConverge)?.into_ndarray2();
        let s = Array1::from(svd.singular_values.as_slice().to_vec());
        let vt = svd.v_t.ok_or(FitError::SvdDidNotConverge)?.into_ndarray2();

        Ok(SVD { u, s, vt })
    }

    pub fn u(&self) -> &Array2<f64> {
        &self.u
    }

    pub fn s(&self) -> &Array1<f64> {
        &self.s
    }

    pub fn vt(&self) -> &Array2<f64> {
        &self.vt
    }
}
