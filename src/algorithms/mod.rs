pub mod initializer;
pub mod optimizer;
pub mod transform;

pub use transform::{FittedTransforms, Pca, StandardScaler, Transform};

use crate::config::ModelConfig;
use crate::error::{RankError, Result};
use crate::models::{Gain, IterationReport, TrainingHistory};
use crate::utils::metrics::mean_ndcg;
use crate::utils::validation::{check_array, check_cols_eq, check_index, check_rows, check_rows_eq};
use crate::utils::{dot, top_k_indices};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use optimizer::{user_pass, Optimizer, Sgd};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

/// Listwise ranking matrix factorization with frozen, meta-feature derived
/// user factors.
///
/// User factors come from a PCA projection of per-user meta-features followed
/// by standardization. Only the item factors are learned, by stochastic
/// ascent on a pairwise-exponential surrogate of NDCG.
#[derive(Debug, Clone)]
pub struct RankFixedMf {
    ratings: Array2<f64>,
    valid_ratings: Option<Array2<f64>>,
    pub n_users: usize,
    pub n_items: usize,
    pub config: ModelConfig,
    state: Option<FittedState>,
    history: TrainingHistory,
}

#[derive(Debug, Clone)]
struct FittedState {
    transforms: FittedTransforms,
    user_vecs: Array2<f64>,
    valid_user_vecs: Option<Array2<f64>>,
    item_vecs: Array2<f64>,
}

impl RankFixedMf {
    pub fn new(
        ratings: Array2<f64>,
        valid_ratings: Option<Array2<f64>>,
        config: ModelConfig,
    ) -> Result<Self> {
        let (n_users, n_items) = ratings.dim();

        check_array(ratings.view())?;
        if config.n_factors == 0 {
            return Err(RankError::shape("n_factors", "at least 1 factor", 0));
        }
        if let Some(valid) = &valid_ratings {
            check_array(valid.view())?;
            check_cols_eq("validation ratings", valid.view(), n_items)?;
        }

        Ok(Self {
            ratings,
            valid_ratings,
            n_users,
            n_items,
            config,
            state: None,
            history: TrainingHistory::new(),
        })
    }

    pub fn n_factors(&self) -> usize {
        self.config.n_factors
    }

    pub fn ratings(&self) -> &Array2<f64> {
        &self.ratings
    }

    pub fn valid_ratings(&self) -> Option<&Array2<f64>> {
        self.valid_ratings.as_ref()
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn train_loss(&self) -> &[f64] {
        &self.history.train
    }

    pub fn valid_loss(&self) -> &[f64] {
        &self.history.valid
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn user_vecs(&self) -> Result<&Array2<f64>> {
        Ok(&self.fitted()?.user_vecs)
    }

    pub fn item_vecs(&self) -> Result<&Array2<f64>> {
        Ok(&self.fitted()?.item_vecs)
    }

    pub fn transforms(&self) -> Result<&FittedTransforms> {
        Ok(&self.fitted()?.transforms)
    }

    fn fitted(&self) -> Result<&FittedState> {
        self.state.as_ref().ok_or(RankError::NotFitted)
    }

    /// Trains from scratch, seeding the generator from `config.seed` when set.
    pub fn train(
        &mut self,
        meta_features: ArrayView2<f64>,
        valid_meta: Option<ArrayView2<f64>>,
        n_iter: usize,
        learning_rate: f64,
    ) -> Result<&mut Self> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.train_with_rng(meta_features, valid_meta, n_iter, learning_rate, &mut rng)
    }

    /// Trains from scratch. `rng` drives item initialization and the per
    /// iteration user order.
    pub fn train_with_rng<R: Rng + ?Sized>(
        &mut self,
        meta_features: ArrayView2<f64>,
        valid_meta: Option<ArrayView2<f64>>,
        n_iter: usize,
        learning_rate: f64,
        rng: &mut R,
    ) -> Result<&mut Self> {
        if !learning_rate.is_finite() || learning_rate <= 0.0 {
            return Err(RankError::Validation(format!(
                "learning rate must be finite and positive, got {}",
                learning_rate
            )));
        }

        // installed on self only once every iteration has succeeded
        let mut state = self.fit_state(meta_features, valid_meta, rng)?;
        let mut history = TrainingHistory::new();

        let mut optimizer = Sgd::new(learning_rate);
        let mut order: Vec<usize> = (0..self.n_users).collect();
        debug!(
            "Training {} iterations at learning rate {}",
            n_iter,
            optimizer.learning_rate()
        );

        for _ in 0..n_iter {
            let report = history.record(self.score_train(&state)?, self.score_valid(&state)?);
            log_report(&report, self.config.verbose);

            order.shuffle(rng);
            self.ranking_epoch(&mut state, &order, &mut optimizer)?;
        }

        self.state = Some(state);
        self.history = history;
        Ok(self)
    }

    fn fit_state<R: Rng + ?Sized>(
        &self,
        meta_features: ArrayView2<f64>,
        valid_meta: Option<ArrayView2<f64>>,
        rng: &mut R,
    ) -> Result<FittedState> {
        check_array(meta_features)?;
        check_rows_eq("training meta-features", meta_features, self.n_users)?;
        if self.n_items < 2 {
            return Err(RankError::NumericalDegeneracy(format!(
                "pairwise ranking needs at least 2 items, got {}",
                self.n_items
            )));
        }

        let transforms = FittedTransforms::fit(meta_features, self.n_factors())?;
        let user_vecs = transforms.transform(meta_features)?;

        let valid_user_vecs = match (valid_meta, &self.valid_ratings) {
            (Some(meta), Some(ratings)) => {
                check_rows_eq("validation meta-features", meta, ratings.nrows())?;
                Some(transforms.transform(meta)?)
            }
            (None, None) => None,
            (Some(meta), None) => {
                return Err(RankError::shape(
                    "validation ratings",
                    format!("{} validation rows", meta.nrows()),
                    "no validation ratings",
                ))
            }
            (None, Some(ratings)) => {
                return Err(RankError::shape(
                    "validation meta-features",
                    format!("{} rows", ratings.nrows()),
                    "no validation meta-features",
                ))
            }
        };

        let item_vecs = initializer::item_factors(self.n_items, self.n_factors(), rng)?;

        debug!(
            "Fitted meta-feature transforms: users {:?}, items {:?}, validation {:?}",
            user_vecs.dim(),
            item_vecs.dim(),
            valid_user_vecs.as_ref().map(|v| v.dim())
        );

        Ok(FittedState {
            transforms,
            user_vecs,
            valid_user_vecs,
            item_vecs,
        })
    }

    fn ranking_epoch<O: Optimizer + ?Sized>(
        &self,
        state: &mut FittedState,
        order: &[usize],
        optimizer: &mut O,
    ) -> Result<()> {
        for &h in order {
            let user_grad = user_pass(
                state.user_vecs.row(h),
                self.ratings.row(h),
                &mut state.item_vecs,
                optimizer,
            )?;
            // user factors stay frozen
            trace!("user {} gradient norm {:.6}", h, user_grad.dot(&user_grad).sqrt());
        }

        Ok(())
    }

    fn score_train(&self, state: &FittedState) -> Result<f64> {
        let scores = state.user_vecs.dot(&state.item_vecs.t());
        mean_ndcg(self.ratings.view(), scores.view(), Gain::Exponential)
    }

    fn score_valid(&self, state: &FittedState) -> Result<Option<f64>> {
        match (&self.valid_ratings, &state.valid_user_vecs) {
            (Some(ratings), Some(users)) => {
                let scores = users.dot(&state.item_vecs.t());
                Ok(Some(mean_ndcg(ratings.view(), scores.view(), Gain::Exponential)?))
            }
            _ => Ok(None),
        }
    }

    /// Mean NDCG over the training users for the current factors.
    pub fn evaluate_train(&self) -> Result<f64> {
        self.score_train(self.fitted()?)
    }

    /// Mean NDCG over the validation users, if a validation set was given.
    pub fn evaluate_valid(&self) -> Result<Option<f64>> {
        self.score_valid(self.fitted()?)
    }

    /// Single user and item prediction.
    pub fn predict(&self, u: usize, i: usize) -> Result<f64> {
        let state = self.fitted()?;
        check_index("user", u, state.user_vecs.nrows())?;
        check_index("item", i, state.item_vecs.nrows())?;
        Ok(dot(state.user_vecs.row(u), state.item_vecs.row(i)))
    }

    /// Scores every item for each row of unseen meta-features.
    pub fn predict_new(&self, meta: ArrayView2<f64>) -> Result<Array2<f64>> {
        let state = self.fitted()?;
        check_array(meta)?;

        let users = state.transforms.transform(meta)?;
        let scores = users.dot(&state.item_vecs.t());

        if scores.nrows() != meta.nrows() || scores.ncols() != self.n_items {
            return Err(RankError::shape(
                "predicted scores",
                format!("({}, {})", meta.nrows(), self.n_items),
                format!("{:?}", scores.dim()),
            ));
        }

        Ok(scores)
    }

    /// [`RankFixedMf::predict_new`] for row-major input, rejecting ragged rows.
    pub fn predict_new_rows(&self, meta: &[Vec<f64>]) -> Result<Array2<f64>> {
        let meta = check_rows(meta)?;
        self.predict_new(meta.view())
    }

    /// Top `k` item indices for one unseen user, best first.
    pub fn recommend(&self, meta: ArrayView1<f64>, k: usize) -> Result<Vec<usize>> {
        let row = meta.insert_axis(Axis(0));
        let scores = self.predict_new(row)?;
        Ok(top_k_indices(scores.row(0), k))
    }
}

fn log_report(report: &IterationReport, verbose: bool) {
    match (report.valid_ndcg, verbose) {
        (Some(valid), true) => info!(
            "Rank-fixed iteration {}: train ndcg {:.6}, valid ndcg {:.6}",
            report.iteration, report.train_ndcg, valid
        ),
        (None, true) => info!(
            "Rank-fixed iteration {}: train ndcg {:.6}",
            report.iteration, report.train_ndcg
        ),
        (Some(valid), false) => debug!(
            "Rank-fixed iteration {}: train ndcg {:.6}, valid ndcg {:.6}",
            report.iteration, report.train_ndcg, valid
        ),
        (None, false) => debug!(
            "Rank-fixed iteration {}: train ndcg {:.6}",
            report.iteration, report.train_ndcg
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ratings() -> Array2<f64> {
        array![[2.0, 1.0, 0.0, 1.0], [0.0, 0.0, 0.0, 0.0], [1.0, 2.0, 2.0, 0.0]]
    }

    fn meta() -> Array2<f64> {
        array![
            [0.12, 0.85, 0.33, 0.47, 0.91],
            [0.64, 0.08, 0.72, 0.19, 0.55],
            [0.37, 0.61, 0.04, 0.88, 0.26],
        ]
    }

    #[test]
    fn test_not_fitted() {
        let model = RankFixedMf::new(ratings(), None, ModelConfig::with_factors(2)).unwrap();
        assert!(!model.is_fitted());
        assert!(matches!(model.predict(0, 0), Err(RankError::NotFitted)));
        assert!(matches!(model.item_vecs(), Err(RankError::NotFitted)));
    }

    #[test]
    fn test_new_rejects_mismatched_validation() {
        let valid = array![[1.0, 0.0]];
        let result = RankFixedMf::new(ratings(), Some(valid), ModelConfig::with_factors(2));
        assert!(matches!(result, Err(RankError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_train_without_validation() {
        let mut model =
            RankFixedMf::new(ratings(), None, ModelConfig::with_factors(2).with_seed(5)).unwrap();
        model.train(meta().view(), None, 3, 0.05).unwrap();

        assert_eq!(model.train_loss().len(), 3);
        assert!(model.valid_loss().is_empty());
        assert_eq!(model.evaluate_valid().unwrap(), None);
    }

    #[test]
    fn test_meta_row_mismatch() {
        let mut model =
            RankFixedMf::new(ratings(), None, ModelConfig::with_factors(2).with_seed(5)).unwrap();
        let short = meta().slice(ndarray::s![0..2, ..]).to_owned();
        assert!(matches!(
            model.train(short.view(), None, 1, 0.05),
            Err(RankError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_validation_meta_without_ratings() {
        let mut model =
            RankFixedMf::new(ratings(), None, ModelConfig::with_factors(2).with_seed(5)).unwrap();
        let valid_meta = meta();
        assert!(matches!(
            model.train(meta().view(), Some(valid_meta.view()), 1, 0.05),
            Err(RankError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_single_item_is_degenerate() {
        let ratings = array![[1.0], [0.0], [2.0]];
        let mut model =
            RankFixedMf::new(ratings, None, ModelConfig::with_factors(2).with_seed(5)).unwrap();
        assert!(matches!(
            model.train(meta().view(), None, 1, 0.05),
            Err(RankError::NumericalDegeneracy(_))
        ));
    }

    #[test]
    fn test_predict_bounds() {
        let mut model =
            RankFixedMf::new(ratings(), None, ModelConfig::with_factors(2).with_seed(1)).unwrap();
        model.train(meta().view(), None, 1, 0.05).unwrap();

        let users = model.user_vecs().unwrap();
        let items = model.item_vecs().unwrap();
        let expected = users.row(2).dot(&items.row(3));
        assert!((model.predict(2, 3).unwrap() - expected).abs() < 1e-12);

        assert!(matches!(
            model.predict(3, 0),
            Err(RankError::IndexOutOfRange { kind: "user", .. })
        ));
        assert!(matches!(
            model.predict(0, 4),
            Err(RankError::IndexOutOfRange { kind: "item", .. })
        ));
    }

    #[test]
    fn test_recommend_orders_by_score() {
        let mut model =
            RankFixedMf::new(ratings(), None, ModelConfig::with_factors(2).with_seed(2)).unwrap();
        model.train(meta().view(), None, 2, 0.05).unwrap();

        let m = meta();
        let top = model.recommend(m.row(0), 4).unwrap();
        assert_eq!(top.len(), 4);

        let scores = model.predict_new(m.slice(ndarray::s![0..1, ..])).unwrap();
        for pair in top.windows(2) {
            assert!(scores[[0, pair[0]]] >= scores[[0, pair[1]]]);
        }
    }

    #[test]
    fn test_predict_new_rows() {
        let mut model =
            RankFixedMf::new(ratings(), None, ModelConfig::with_factors(2).with_seed(2)).unwrap();
        model.train(meta().view(), None, 1, 0.05).unwrap();

        let rows: Vec<Vec<f64>> = meta().outer_iter().map(|r| r.to_vec()).collect();
        let from_rows = model.predict_new_rows(&rows).unwrap();
        let from_view = model.predict_new(meta().view()).unwrap();
        assert_eq!(from_rows, from_view);

        let ragged = vec![vec![0.1, 0.2, 0.3, 0.4, 0.5], vec![0.1]];
        assert!(matches!(
            model.predict_new_rows(&ragged),
            Err(RankError::Validation(_))
        ));
    }

    #[test]
    fn test_retrain_resets_history() {
        let mut model =
            RankFixedMf::new(ratings(), None, ModelConfig::with_factors(2).with_seed(3)).unwrap();
        model.train(meta().view(), None, 2, 0.05).unwrap();
        model.train(meta().view(), None, 4, 0.05).unwrap();
        assert_eq!(model.history().len(), 4);
    }

    #[test]
    fn test_new_rejects_non_finite_ratings() {
        let mut bad = ratings();
        bad[[1, 2]] = f64::NAN;
        assert!(matches!(
            RankFixedMf::new(bad, None, ModelConfig::with_factors(2)),
            Err(RankError::Validation(_))
        ));

        let valid = array![[1.0, f64::INFINITY, 0.0, 2.0]];
        assert!(matches!(
            RankFixedMf::new(ratings(), Some(valid), ModelConfig::with_factors(2)),
            Err(RankError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_learning_rate_leaves_model_unfitted() {
        let mut model =
            RankFixedMf::new(ratings(), None, ModelConfig::with_factors(2).with_seed(5)).unwrap();

        for lr in [f64::INFINITY, f64::NAN, 0.0, -0.1] {
            assert!(matches!(
                model.train(meta().view(), None, 2, lr),
                Err(RankError::Validation(_))
            ));
            assert!(!model.is_fitted());
            assert!(model.history().is_empty());
        }
    }

    #[test]
    fn test_failed_training_keeps_previous_fit() {
        let mut model =
            RankFixedMf::new(ratings(), None, ModelConfig::with_factors(2).with_seed(5)).unwrap();
        model.train(meta().view(), None, 2, 0.05).unwrap();
        let items = model.item_vecs().unwrap().clone();

        assert!(model.train(meta().view(), None, 3, f64::NAN).is_err());
        assert_eq!(model.item_vecs().unwrap(), &items);
        assert_eq!(model.history().len(), 2);
    }

    #[test]
    fn test_huge_learning_rate_never_stores_non_finite_factors() {
        let mut fresh =
            RankFixedMf::new(ratings(), None, ModelConfig::with_factors(2).with_seed(5)).unwrap();
        match fresh.train(meta().view(), None, 3, f64::MAX) {
            Ok(_) => assert!(fresh.item_vecs().unwrap().iter().all(|v| v.is_finite())),
            Err(err) => {
                assert!(matches!(err, RankError::NumericalDegeneracy(_)));
                assert!(!fresh.is_fitted());
                assert!(fresh.train_loss().is_empty());
            }
        }
    }
}
