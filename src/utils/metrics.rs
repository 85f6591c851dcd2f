use crate::error::{RankError, Result};
use crate::models::Gain;
use ndarray::{ArrayView1, ArrayView2};

/// Discounted cumulative gain of `y_true` ranked by `y_score`.
///
/// Items are visited by descending score. Items with tied scores share the
/// average gain of their tie group, so the result does not depend on how the
/// tie is broken.
pub fn dcg_score(
    y_true: ArrayView1<f64>,
    y_score: ArrayView1<f64>,
    k: Option<usize>,
    gain: Gain,
) -> Result<f64> {
    if y_true.len() != y_score.len() {
        return Err(RankError::shape(
            "dcg_score",
            format!("{} scores", y_true.len()),
            format!("{} scores", y_score.len()),
        ));
    }

    let n = y_true.len();
    let cutoff = k.unwrap_or(n).min(n);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        y_score[b]
            .partial_cmp(&y_score[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut dcg = 0.0;
    let mut start = 0;
    while start < cutoff {
        let mut end = start + 1;
        while end < n && y_score[order[end]] == y_score[order[start]] {
            end += 1;
        }

        let group_gain: f64 = order[start..end]
            .iter()
            .map(|&item| gain.apply(y_true[item]))
            .sum::<f64>()
            / (end - start) as f64;

        for position in start..end.min(cutoff) {
            dcg += group_gain / discount(position);
        }

        start = end;
    }

    Ok(dcg)
}

/// DCG of the best possible ordering of `y_true`.
pub fn ideal_dcg(y_true: ArrayView1<f64>, k: Option<usize>, gain: Gain) -> f64 {
    let mut gains: Vec<f64> = y_true.iter().map(|&rel| gain.apply(rel)).collect();
    gains.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    gains
        .iter()
        .take(k.unwrap_or(gains.len()))
        .enumerate()
        .map(|(position, &g)| g / discount(position))
        .sum()
}

/// Normalized DCG in `[0, 1]`. A row whose ideal DCG is zero scores 0.
pub fn ndcg_score(
    y_true: ArrayView1<f64>,
    y_score: ArrayView1<f64>,
    k: Option<usize>,
    gain: Gain,
) -> Result<f64> {
    let dcg = dcg_score(y_true, y_score, k, gain)?;
    let idcg = ideal_dcg(y_true, k, gain);

    if idcg == 0.0 {
        Ok(0.0)
    } else {
        Ok(dcg / idcg)
    }
}

/// Mean row-wise NDCG over two equally shaped matrices.
pub fn mean_ndcg(y_true: ArrayView2<f64>, y_score: ArrayView2<f64>, gain: Gain) -> Result<f64> {
    if y_true.dim() != y_score.dim() {
        return Err(RankError::shape(
            "mean_ndcg",
            format!("{:?}", y_true.dim()),
            format!("{:?}", y_score.dim()),
        ));
    }

    if y_true.nrows() == 0 {
        return Ok(0.0);
    }

    let mut total = 0.0;
    for (truth, scores) in y_true.outer_iter().zip(y_score.outer_iter()) {
        total += ndcg_score(truth, scores, None, gain)?;
    }

    Ok(total / y_true.nrows() as f64)
}

fn discount(position: usize) -> f64 {
    // position is 0-based, rank = position + 1
    ((position + 2) as f64).log2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_ranking() {
        let truth = array![2.0, 1.0, 0.0];
        let scores = array![0.9, 0.5, 0.1];
        let ndcg = ndcg_score(truth.view(), scores.view(), None, Gain::Exponential).unwrap();
        assert!((ndcg - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_dcg() {
        let truth = array![0.0, 1.0, 2.0];
        let scores = array![0.9, 0.5, 0.1];
        // gains in predicted order: 0, 1, 3
        let expected = 0.0 + 1.0 / 3f64.log2() + 3.0 / 2.0;
        let dcg = dcg_score(truth.view(), scores.view(), None, Gain::Exponential).unwrap();
        assert!((dcg - expected).abs() < 1e-12);

        let idcg = 3.0 + 1.0 / 3f64.log2();
        let ndcg = ndcg_score(truth.view(), scores.view(), None, Gain::Exponential).unwrap();
        assert!((ndcg - expected / idcg).abs() < 1e-12);
    }

    #[test]
    fn test_linear_gain() {
        let truth = array![0.0, 1.0, 2.0];
        let scores = array![0.9, 0.5, 0.1];
        let expected = 1.0 / 3f64.log2() + 2.0 / 2.0;
        let dcg = dcg_score(truth.view(), scores.view(), None, Gain::Linear).unwrap();
        assert!((dcg - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ties_share_gain() {
        let truth = array![1.0, 0.0];
        let scores = array![0.5, 0.5];
        let expected = 0.5 / 1.0 + 0.5 / 3f64.log2();
        let dcg = dcg_score(truth.view(), scores.view(), None, Gain::Linear).unwrap();
        assert!((dcg - expected).abs() < 1e-12);

        let swapped = array![0.0, 1.0];
        let dcg_swapped = dcg_score(swapped.view(), scores.view(), None, Gain::Linear).unwrap();
        assert!((dcg - dcg_swapped).abs() < 1e-12);
    }

    #[test]
    fn test_top_k_cutoff() {
        let truth = array![0.0, 0.0, 1.0];
        let scores = array![0.9, 0.5, 0.1];
        let ndcg = ndcg_score(truth.view(), scores.view(), Some(2), Gain::Exponential).unwrap();
        assert_eq!(ndcg, 0.0);
    }

    #[test]
    fn test_scale_invariance() {
        let truth = array![1.0, 2.0, 0.0, 1.0];
        let scores = array![0.3, -0.2, 0.8, 0.1];
        let scaled = scores.mapv(|s| s * 7.5);
        let a = ndcg_score(truth.view(), scores.view(), None, Gain::Exponential).unwrap();
        let b = ndcg_score(truth.view(), scaled.view(), None, Gain::Exponential).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_relevance() {
        let truth = array![0.0, 0.0];
        let scores = array![0.1, 0.2];
        assert_eq!(
            ndcg_score(truth.view(), scores.view(), None, Gain::Exponential).unwrap(),
            0.0
        );
    }

    #[test]
    fn test_length_mismatch() {
        let truth = array![1.0, 0.0];
        let scores = array![0.1];
        assert!(matches!(
            ndcg_score(truth.view(), scores.view(), None, Gain::Exponential),
            Err(RankError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_mean_ndcg() {
        let truth = array![[2.0, 0.0], [0.0, 2.0]];
        let scores = array![[1.0, 0.0], [1.0, 0.0]];
        let mean = mean_ndcg(truth.view(), scores.view(), Gain::Exponential).unwrap();
        let worst = (3.0 / 3f64.log2()) / 3.0;
        assert!((mean - (1.0 + worst) / 2.0).abs() < 1e-12);
    }
}
