use ndarray::Array2;

use crate::error::ExperimentError;

/// Hyperparameter overrides merged into a trainer's stored parameters.
///
/// Only the fields set here are changed; everything else keeps its stored
/// value. Nothing is validated until `build()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParamUpdate {
    pub n_clusters: Option<usize>,
    pub random_state: Option<u64>,
    pub n_init: Option<usize>,
    pub max_iter: Option<usize>,
    pub tol: Option<f64>,
}

impl ParamUpdate {
    pub fn n_clusters(mut self, n_clusters: usize) -> Self {
        self.n_clusters = Some(n_clusters);
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }
}

/// Capability contract shared by every clustering family used in the grid.
///
/// Call order is set_params (any number of times) -> build -> fit -> predict.
/// `build` instantiates the underlying estimator from the stored parameters
/// and is where each family translates the unified cluster-count key into its
/// native hyperparameter name. `fit` must be called exactly once per
/// experiment, only on the transformed training partition.
pub trait ClusterTrainer {
    /// Merge overrides into stored hyperparameters without validating them.
    fn set_params(&mut self, update: ParamUpdate);

    /// Instantiate the underlying estimator; validates hyperparameters.
    fn build(&mut self) -> Result<(), ExperimentError>;

    /// Fit the estimator on the training feature matrix.
    fn fit(&mut self, x: &Array2<f64>) -> Result<(), ExperimentError>;

    /// One label per row of `x`, each in `[0, n_clusters)`.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ExperimentError>;

    /// Human readable model name used to tag result rows.
    fn name(&self) -> &str {
        "cluster"
    }
}
