use ndarray::{Array1, Array2, ArrayView1};

/// Open-interval bounds applied to probabilities before any logarithm.
pub(crate) const PROB_FLOOR: f64 = 1e-8;
pub(crate) const PROB_CEIL: f64 = 1.0 - 1e-5;

/// Floor for mixing weights coming out of the moment estimator.
pub(crate) const WEIGHT_FLOOR: f64 = 1e-6;

pub(crate) fn clip_probability(p: f64) -> f64 {
    p.clamp(PROB_FLOOR, PROB_CEIL)
}

/// Floors entries at or below zero and rescales the vector to sum to 1.
pub(crate) fn floor_and_normalize(weights: ArrayView1<f64>) -> Array1<f64> {
    let mut floored = weights.mapv(|w| if w <= 0.0 { WEIGHT_FLOOR } else { w });
    let total = floored.sum();
    floored /= total;
    floored
}

/// Row-wise softmax with the max-subtraction trick.
pub(crate) fn softmax_rows_inplace(scores: &mut Array2<f64>) {
    for mut row in scores.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        row.mapv_inplace(|v| v / total);
    }
}

pub(crate) fn l1_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

pub(crate) fn log_sum_exp(row: ArrayView1<f64>) -> f64 {
    let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + row.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Index of the largest entry; ties go to the lowest index.
pub(crate) fn argmax_row(row: ArrayView1<f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &v) in row.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}
