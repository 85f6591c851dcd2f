use crate::models::Learning;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub experiment: ExperimentConfig,
}

/// Model hyperparameters.
///
/// The four regularization terms are accepted for parity with the biased and
/// ALS factorization variants but the rank-fixed gradient does not read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub n_factors: usize,
    pub learning: Learning,
    pub item_fact_reg: f64,
    pub user_fact_reg: f64,
    pub item_bias_reg: f64,
    pub user_bias_reg: f64,
    pub verbose: bool,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub n_iter: usize,
    pub learning_rate: f64,
}

/// Synthetic experiment driven by `rankmf-trainer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub n_users: usize,
    pub n_items: usize,
    pub n_meta_features: usize,
    pub test_size: f64,
    pub valid_size: f64,
    pub random_baselines: usize,
    pub data_seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_factors: 40,
            learning: Learning::Sgd,
            item_fact_reg: 0.0,
            user_fact_reg: 0.0,
            item_bias_reg: 0.0,
            user_bias_reg: 0.0,
            verbose: false,
            seed: None,
        }
    }
}

impl ModelConfig {
    pub fn with_factors(n_factors: usize) -> Self {
        Self {
            n_factors,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_iter: 10,
            learning_rate: 0.1,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                n_factors: 3,
                verbose: true,
                ..ModelConfig::default()
            },
            training: TrainingConfig {
                n_iter: 500,
                learning_rate: 0.05,
            },
            experiment: ExperimentConfig::default(),
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            n_users: 100,
            n_items: 5,
            n_meta_features: 8,
            test_size: 0.33,
            valid_size: 0.2,
            random_baselines: 10,
            data_seed: 42,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("RANKMF").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
