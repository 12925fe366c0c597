pub mod gmm;
pub mod kmeans;

pub mod cluster_trait;
pub mod factory;
