use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::preprocessing::PreProcessing;

/// Central configuration for one model instance in the grid.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelParams {
    /// Requested number of clusters. Every model family accepts this key;
    /// adapters translate it to their native hyperparameter at build time.
    pub n_clusters: usize,
    /// Seed controlling initialization; fixed seed gives deterministic labels.
    pub random_state: u64,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported clustering families and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    KMeans {
        n_init: usize,
        max_iter: usize,
        tol: f64,
    },
    Gmm {
        n_init: usize,
        max_iter: usize,
        tol: f64,
        reg_covar: f64,
    },
}

impl ModelType {
    /// Stable name used to tag result rows.
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::KMeans { .. } => "kmeans",
            ModelType::Gmm { .. } => "gmm",
        }
    }
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::KMeans {
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kmeans" => Ok(ModelType::KMeans {
                n_init: 10,
                max_iter: 300,
                tol: 1e-4,
            }),
            "gmm" => Ok(ModelType::Gmm {
                n_init: 1,
                max_iter: 100,
                tol: 1e-3,
                reg_covar: 1e-6,
            }),
            _ => Err(format!("Unknown model type: {}", s)),
        }
    }
}

impl ModelParams {
    pub fn new(n_clusters: usize, random_state: u64, model_type: ModelType) -> Self {
        Self {
            n_clusters,
            random_state,
            model_type,
        }
    }
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            n_clusters: 2,
            random_state: 0,
            model_type: ModelType::default(),
        }
    }
}

/// Grid specification handed to `run_all_experiments`.
///
/// Replaces the original pipeline's module-level constants with an explicit
/// structure passed into the core entry point.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    /// Model families to sweep (outer loop).
    pub models: Vec<ModelType>,
    /// Cluster counts to sweep; every entry must be >= 2.
    pub cluster_counts: Vec<usize>,
    /// Preprocessing strategies to sweep (inner loop).
    pub preprocessing: Vec<PreProcessing>,
    /// Interpretable columns averaged per cluster in result rows.
    pub look_features: Vec<String>,
    /// Base seed shared by every grid cell.
    pub random_state: u64,
}

impl GridConfig {
    pub fn new(
        models: Vec<ModelType>,
        cluster_counts: Vec<usize>,
        preprocessing: Vec<PreProcessing>,
        look_features: Vec<String>,
    ) -> Self {
        Self {
            models,
            cluster_counts,
            preprocessing,
            look_features,
            random_state: 0,
        }
    }

    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Number of grid cells (model x cluster count x preprocessing).
    pub fn n_cells(&self) -> usize {
        self.models.len() * self.cluster_counts.len() * self.preprocessing.len()
    }
}
