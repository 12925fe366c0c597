use std::error::Error;
use std::fmt;

/// Error type for experiment configuration and model lifecycle failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentError {
    /// Invalid hyperparameter or grid specification.
    Configuration(String),
    /// Transformed test/validation shape disagrees with train.
    SchemaMismatch { expected: usize, found: usize },
    /// `fit` or `predict` called before `build`.
    NotBuilt,
    /// `predict` called before `fit`.
    NotFitted,
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExperimentError::Configuration(msg) => write!(f, "invalid configuration: {}", msg),
            ExperimentError::SchemaMismatch { expected, found } => write!(
                f,
                "schema mismatch: expected {} feature columns, found {}",
                expected, found
            ),
            ExperimentError::NotBuilt => write!(f, "model used before build() was called"),
            ExperimentError::NotFitted => write!(f, "predict() called before fit()"),
        }
    }
}

impl Error for ExperimentError {}
