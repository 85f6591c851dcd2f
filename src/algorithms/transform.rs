use crate::error::{RankError, Result};
use crate::utils::validation::{check_array, check_cols_eq};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use tracing::debug;

pub trait Transform {
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()>;
    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    fn fit_transform(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Principal component projection.
///
/// Columns are centered with the training mean (not scaled) and projected on
/// the right singular vectors of the centered data with the largest singular
/// values. Each component is sign-fixed so its largest-magnitude loading is
/// positive, which makes the projection deterministic.
#[derive(Debug, Clone)]
pub struct Pca {
    n_components: usize,
    mean: Option<Array1<f64>>,
    /// Shape: (n_components, n_features)
    components: Option<Array2<f64>>,
    explained_variance: Option<Array1<f64>>,
}

impl Pca {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            mean: None,
            components: None,
            explained_variance: None,
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    pub fn components(&self) -> Option<&Array2<f64>> {
        self.components.as_ref()
    }

    pub fn explained_variance(&self) -> Option<&Array1<f64>> {
        self.explained_variance.as_ref()
    }
}

impl Transform for Pca {
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        check_array(x)?;

        let (n_samples, n_features) = x.dim();
        let max_components = n_samples.min(n_features);
        if self.n_components == 0 || self.n_components > max_components {
            return Err(RankError::shape(
                "pca components",
                format!("1..={} components", max_components),
                format!("{} components", self.n_components),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| RankError::Validation("cannot center empty input".to_string()))?;
        let centered = &x - &mean;

        let matrix = DMatrix::from_fn(n_samples, n_features, |i, j| centered[[i, j]]);
        let svd = matrix
            .try_svd(false, true, f64::EPSILON, 0)
            .ok_or_else(|| RankError::NumericalDegeneracy("SVD did not converge".to_string()))?;
        let v_t = svd.v_t.ok_or_else(|| {
            RankError::NumericalDegeneracy("SVD produced no right singular vectors".to_string())
        })?;
        let singular_values = svd.singular_values;

        let mut order: Vec<usize> = (0..singular_values.len()).collect();
        order.sort_by(|&a, &b| {
            singular_values[b]
                .partial_cmp(&singular_values[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut components = Array2::zeros((self.n_components, n_features));
        let mut explained_variance = Array1::zeros(self.n_components);
        let dof = n_samples.saturating_sub(1).max(1) as f64;

        for (rank, &source) in order.iter().take(self.n_components).enumerate() {
            let pivot = (0..n_features)
                .max_by(|&a, &b| {
                    v_t[(source, a)]
                        .abs()
                        .partial_cmp(&v_t[(source, b)].abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(0);
            let sign = if v_t[(source, pivot)] < 0.0 { -1.0 } else { 1.0 };

            for j in 0..n_features {
                components[[rank, j]] = sign * v_t[(source, j)];
            }
            explained_variance[rank] = singular_values[source].powi(2) / dof;
        }

        debug!(
            "Fitted PCA: {} samples, {} features -> {} components",
            n_samples, n_features, self.n_components
        );

        self.mean = Some(mean);
        self.components = Some(components);
        self.explained_variance = Some(explained_variance);
        Ok(())
    }

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (mean, components) = match (&self.mean, &self.components) {
            (Some(mean), Some(components)) => (mean, components),
            _ => return Err(RankError::NotFitted),
        };

        check_array(x)?;
        check_cols_eq("pca input", x, mean.len())?;

        let centered = &x - mean;
        Ok(centered.dot(&components.t()))
    }
}

/// Per-column standardization to zero mean and unit variance.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.scale.as_ref()
    }
}

impl Transform for StandardScaler {
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        check_array(x)?;

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| RankError::Validation("cannot scale empty input".to_string()))?;
        // constant columns keep unit scale
        let scale = x
            .var_axis(Axis(0), 0.0)
            .mapv(|v| if v > 0.0 { v.sqrt() } else { 1.0 });

        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(())
    }

    fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = match (&self.mean, &self.scale) {
            (Some(mean), Some(scale)) => (mean, scale),
            _ => return Err(RankError::NotFitted),
        };

        check_array(x)?;
        check_cols_eq("scaler input", x, mean.len())?;

        Ok((&x - mean) / scale)
    }
}

/// Projection and scaling fitted once on training meta-features.
///
/// Built only through [`FittedTransforms::fit`] and never refit, so the same
/// statistics apply to training, validation and prediction inputs.
#[derive(Debug, Clone)]
pub struct FittedTransforms {
    pca: Pca,
    scaler: StandardScaler,
}

impl FittedTransforms {
    pub fn fit(meta: ArrayView2<f64>, n_factors: usize) -> Result<Self> {
        let mut pca = Pca::new(n_factors);
        let projected = pca.fit_transform(meta)?;

        let mut scaler = StandardScaler::new();
        scaler.fit(projected.view())?;

        Ok(Self { pca, scaler })
    }

    pub fn transform(&self, meta: ArrayView2<f64>) -> Result<Array2<f64>> {
        let projected = self.pca.transform(meta)?;
        check_cols_eq("projected features", projected.view(), self.n_factors())?;
        self.scaler.transform(projected.view())
    }

    pub fn n_factors(&self) -> usize {
        self.pca.n_components()
    }

    pub fn n_features(&self) -> usize {
        self.pca.mean().map(|m| m.len()).unwrap_or(0)
    }

    pub fn pca(&self) -> &Pca {
        &self.pca
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }
}
