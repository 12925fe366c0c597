use crate::config::{ModelParams, ModelType};
use crate::models::cluster_trait::ClusterTrainer;

/// Build a boxed cluster trainer from a `ModelParams`.
/// Currently this is a thin factory implemented as a single function.
pub fn build_trainer(params: ModelParams) -> Box<dyn ClusterTrainer> {
    match params.model_type {
        ModelType::KMeans { .. } => Box::new(crate::models::kmeans::KMeansTrainer::new(params)),
        ModelType::Gmm { .. } => Box::new(crate::models::gmm::GmmTrainer::new(params)),
    }
}
