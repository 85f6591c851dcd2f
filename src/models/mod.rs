use serde::{Deserialize, Serialize};

/// Optimization method. Only stochastic gradient steps exist for the
/// rank-fixed variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Learning {
    Sgd,
}

/// Gain applied to relevance labels when computing DCG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gain {
    /// `2^rel - 1`
    Exponential,
    /// `rel`
    Linear,
}

impl Default for Gain {
    fn default() -> Self {
        Gain::Exponential
    }
}

impl Gain {
    pub fn apply(self, relevance: f64) -> f64 {
        match self {
            Gain::Exponential => relevance.exp2() - 1.0,
            Gain::Linear => relevance,
        }
    }
}

/// Mean NDCG recorded at the start of one training iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationReport {
    pub iteration: usize,
    pub train_ndcg: f64,
    pub valid_ndcg: Option<f64>,
}

/// Append-only per-iteration score history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub train: Vec<f64>,
    pub valid: Vec<f64>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, train_ndcg: f64, valid_ndcg: Option<f64>) -> IterationReport {
        self.train.push(train_ndcg);
        if let Some(score) = valid_ndcg {
            self.valid.push(score);
        }

        IterationReport {
            iteration: self.train.len(),
            train_ndcg,
            valid_ndcg,
        }
    }

    pub fn len(&self) -> usize {
        self.train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }

    pub fn reports(&self) -> Vec<IterationReport> {
        self.train
            .iter()
            .enumerate()
            .map(|(i, &train_ndcg)| IterationReport {
                iteration: i + 1,
                train_ndcg,
                valid_ndcg: self.valid.get(i).copied(),
            })
            .collect()
    }

    pub fn best_valid(&self) -> Option<(usize, f64)> {
        self.valid
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, score)| (i + 1, score))
    }
}
