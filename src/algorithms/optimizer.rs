use crate::error::{RankError, Result};
use crate::utils::validation::check_index;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1};

/// Added to the pairwise sum before taking its logarithm.
pub const SMOOTHING_OFFSET: f64 = 2.0;

/// Base of the exponential relevance gain used to weight item gradients.
pub const GAIN_BASE: f64 = 3.0;

pub trait Optimizer: Send + Sync {
    fn update(&mut self, params: ArrayViewMut1<f64>, gradients: ArrayView1<f64>);
}

/// Plain stochastic step along the gradient: `params += lr * gradients`.
///
/// The ranking gradients point uphill on the smoothed ranking objective, so
/// the step is an ascent.
#[derive(Debug, Clone)]
pub struct Sgd {
    learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

impl Optimizer for Sgd {
    fn update(&mut self, mut params: ArrayViewMut1<f64>, gradients: ArrayView1<f64>) {
        params.scaled_add(self.learning_rate, &gradients);
    }
}

/// Gradients of the pairwise-exponential loss for one (user, item) cell.
#[derive(Debug, Clone)]
pub struct PairwiseGradient {
    /// `phi = 2 + sum_j exp(u . (v_j - v_i))`
    pub phi: f64,
    /// `w / (phi * ln(phi)^2)`
    pub coefficient: f64,
    /// Gradient with respect to the item factors.
    pub item: Array1<f64>,
    /// Gradient with respect to the user factors.
    pub user: Array1<f64>,
}

pub fn relevance_weight(rating: f64) -> f64 {
    GAIN_BASE.powf(rating) - 1.0
}

/// Pairwise gradient for item `i` against every other item, as seen by `user`.
pub fn pairwise_gradient(
    user: ArrayView1<f64>,
    item_vecs: ArrayView2<f64>,
    i: usize,
    rating: f64,
) -> Result<PairwiseGradient> {
    let (n_items, n_factors) = item_vecs.dim();
    if n_items < 2 {
        return Err(RankError::NumericalDegeneracy(format!(
            "pairwise ranking needs at least 2 items, got {}",
            n_items
        )));
    }
    check_index("item", i, n_items)?;
    if user.len() != n_factors {
        return Err(RankError::shape(
            "user factors",
            format!("{} factors", n_factors),
            format!("{} factors", user.len()),
        ));
    }

    let v_i = item_vecs.row(i);
    let mut pair_sum = 0.0;
    let mut right = Array1::<f64>::zeros(n_factors);

    for (j, v_j) in item_vecs.outer_iter().enumerate() {
        if j == i {
            continue;
        }
        let diff = &v_j - &v_i;
        let t = user.dot(&diff).exp();
        pair_sum += t;
        right.scaled_add(t, &diff);
    }

    let phi = SMOOTHING_OFFSET + pair_sum;
    if !phi.is_finite() || phi <= 1.0 {
        return Err(RankError::NumericalDegeneracy(format!(
            "phi = {} for item {}",
            phi, i
        )));
    }

    let log_phi = phi.ln();
    let coefficient = relevance_weight(rating) / (phi * log_phi * log_phi);
    if !coefficient.is_finite() {
        return Err(RankError::NumericalDegeneracy(format!(
            "gradient coefficient {} for item {} (phi = {}, rating = {})",
            coefficient, i, phi, rating
        )));
    }

    // sum_j t_j * u
    let right_v = user.mapv(|x| x * pair_sum);
    let item = right_v * coefficient;
    let user_grad = right * coefficient;

    if item.iter().any(|v| !v.is_finite()) {
        return Err(RankError::NumericalDegeneracy(format!(
            "non-finite item gradient for item {}",
            i
        )));
    }

    Ok(PairwiseGradient {
        phi,
        coefficient,
        item,
        user: user_grad,
    })
}

/// One user's pass over every item, updating `item_vecs` in place.
///
/// Item `i` sees the rows already updated for items `0..i` in this pass.
/// Returns the summed user gradient, which the rank-fixed model does not
/// apply.
pub fn user_pass<O: Optimizer + ?Sized>(
    user: ArrayView1<f64>,
    ratings: ArrayView1<f64>,
    item_vecs: &mut Array2<f64>,
    optimizer: &mut O,
) -> Result<Array1<f64>> {
    if ratings.len() != item_vecs.nrows() {
        return Err(RankError::shape(
            "rating row",
            format!("{} items", item_vecs.nrows()),
            format!("{} items", ratings.len()),
        ));
    }

    let mut user_grad = Array1::<f64>::zeros(user.len());
    for (i, &rating) in ratings.iter().enumerate() {
        let gradient = pairwise_gradient(user, item_vecs.view(), i, rating)?;
        optimizer.update(item_vecs.row_mut(i), gradient.item.view());
        if item_vecs.row(i).iter().any(|v| !v.is_finite()) {
            return Err(RankError::NumericalDegeneracy(format!(
                "non-finite factors for item {} after update",
                i
            )));
        }
        user_grad += &gradient.user;
    }

    Ok(user_grad)
}
