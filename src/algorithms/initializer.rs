use crate::error::{RankError, Result};
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Matrix of independent `N(0, std_dev^2)` draws.
pub fn normal_matrix<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    std_dev: f64,
    rng: &mut R,
) -> Result<Array2<f64>> {
    let normal = Normal::new(0.0, std_dev)
        .map_err(|e| RankError::Validation(format!("invalid standard deviation {}: {}", std_dev, e)))?;

    Ok(Array2::from_shape_simple_fn((rows, cols), || normal.sample(&mut *rng)))
}

/// Item factors drawn with standard deviation `1 / n_factors`.
pub fn item_factors<R: Rng + ?Sized>(
    n_items: usize,
    n_factors: usize,
    rng: &mut R,
) -> Result<Array2<f64>> {
    if n_factors == 0 {
        return Err(RankError::Validation("n_factors must be positive".to_string()));
    }
    normal_matrix(n_items, n_factors, 1.0 / n_factors as f64, rng)
}
