use crate::error::{RankError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

pub mod metrics;
pub mod validation;

pub fn dot(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.dot(&b)
}

pub fn top_k_indices(scores: ArrayView1<f64>, k: usize) -> Vec<usize> {
    let mut indexed_scores: Vec<(usize, f64)> = scores
        .iter()
        .enumerate()
        .map(|(i, &score)| (i, score))
        .collect();

    indexed_scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    indexed_scores
        .into_iter()
        .take(k)
        .map(|(i, _)| i)
        .collect()
}

/// Row-aligned split of two matrices into `(a_train, a_test, b_train, b_test)`.
///
/// The test part holds `ceil(test_size * n_rows)` shuffled rows.
pub fn train_test_split<R: Rng + ?Sized>(
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
    test_size: f64,
    rng: &mut R,
) -> Result<(Array2<f64>, Array2<f64>, Array2<f64>, Array2<f64>)> {
    if a.nrows() != b.nrows() {
        return Err(RankError::shape(
            "train_test_split",
            format!("{} rows", a.nrows()),
            format!("{} rows", b.nrows()),
        ));
    }

    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(RankError::Validation(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let n_rows = a.nrows();
    let n_test = (test_size * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(RankError::Validation(format!(
            "cannot split {} rows with test_size {}",
            n_rows, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    indices.shuffle(rng);
    let (test_idx, train_idx) = indices.split_at(n_test);

    Ok((
        a.select(Axis(0), train_idx),
        a.select(Axis(0), test_idx),
        b.select(Axis(0), train_idx),
        b.select(Axis(0), test_idx),
    ))
}
