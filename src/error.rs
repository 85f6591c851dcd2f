use thiserror::Error;

pub type Result<T> = std::result::Result<T, RankError>;

#[derive(Debug, Error)]
pub enum RankError {
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    #[error("{kind} index {index} out of range (len {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("model has not been trained")]
    NotFitted,
}

impl RankError {
    pub fn shape(context: &'static str, expected: impl ToString, actual: impl ToString) -> Self {
        RankError::ShapeMismatch {
            context,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
