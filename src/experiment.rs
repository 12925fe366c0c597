//! The experiment runner and grid orchestrator.
//!
//! One experiment configuration = (model family, cluster count, preprocessing
//! strategy). The runner executes a single configuration end to end with the
//! leakage rules enforced: transforms and the model are fit on the training
//! partition only, and the callers' datasets are never mutated. The grid
//! orchestrator sweeps the cartesian product of configurations, evaluates each
//! partition, and aggregates everything into one comparable result table.

use std::path::Path;

use anyhow::Context;
use ndarray::Array2;

use crate::config::{GridConfig, ModelParams, ModelType};
use crate::data_handling::{FundDataset, LabeledDataset};
use crate::error::ExperimentError;
use crate::evaluation::{cluster_profiles, evaluate_clusters, ClusterProfile};
use crate::models::cluster_trait::ParamUpdate;
use crate::models::factory;
use crate::preprocessing::PreProcessing;

/// The three partition names, in reporting order.
pub const DATASET_NAMES: [&str; 3] = ["train", "test", "validation"];

/// Everything a single experiment configuration produces: the three labeled
/// partitions (original feature columns plus the predicted label) and the
/// transformed matrices the labels were computed in. Metrics must be computed
/// in the transformed space, so both are returned.
#[derive(Debug)]
pub struct ExperimentOutcome {
    pub train: LabeledDataset,
    pub test: LabeledDataset,
    pub validation: LabeledDataset,
    pub transformed: [Array2<f64>; 3],
}

impl ExperimentOutcome {
    /// (name, labeled partition, transformed matrix) in reporting order.
    pub fn partitions(&self) -> [(&'static str, &LabeledDataset, &Array2<f64>); 3] {
        [
            (DATASET_NAMES[0], &self.train, &self.transformed[0]),
            (DATASET_NAMES[1], &self.test, &self.transformed[1]),
            (DATASET_NAMES[2], &self.validation, &self.transformed[2]),
        ]
    }
}

/// Run one experiment configuration.
///
/// Applies `strategy` (fit on train only), builds and fits the model on the
/// transformed train partition, predicts labels for all three partitions, and
/// attaches the labels to copies of the original datasets.
pub fn run_experiment(
    model_type: &ModelType,
    train: &FundDataset,
    test: &FundDataset,
    val: &FundDataset,
    strategy: &PreProcessing,
    n_clusters: usize,
    random_state: u64,
) -> Result<ExperimentOutcome, ExperimentError> {
    for (partition, other) in [("test", test), ("validation", val)] {
        if other.ncols() != train.ncols() {
            return Err(ExperimentError::SchemaMismatch {
                expected: train.ncols(),
                found: other.ncols(),
            });
        }
        if let Some(divergent) = train
            .feature_names
            .iter()
            .zip(other.feature_names.iter())
            .find(|(a, b)| a != b)
        {
            return Err(ExperimentError::Configuration(format!(
                "{} partition column '{}' does not match train column '{}'",
                partition, divergent.1, divergent.0
            )));
        }
    }

    let (t_train, t_test, t_val) = strategy.apply(&train.x, &test.x, &val.x)?;

    let params = ModelParams::new(n_clusters, random_state, model_type.clone());
    let mut trainer = factory::build_trainer(params);
    trainer.set_params(
        ParamUpdate::default()
            .n_clusters(n_clusters)
            .random_state(random_state),
    );
    trainer.build()?;
    trainer.fit(&t_train)?;

    let train_labels = trainer.predict(&t_train)?;
    let test_labels = trainer.predict(&t_test)?;
    let val_labels = trainer.predict(&t_val)?;

    Ok(ExperimentOutcome {
        train: train.with_labels(train_labels),
        test: test.with_labels(test_labels),
        validation: val.with_labels(val_labels),
        transformed: [t_train, t_test, t_val],
    })
}

/// One row of the aggregated result table: a single (dataset, model, cluster
/// count, preprocessing) combination with its metric values and per-cluster
/// look-feature means. Rows for failed cells carry NaN metrics and the error
/// message instead of being dropped.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub dataset: String,
    pub model: String,
    pub n_clusters: usize,
    pub preprocessing: String,
    pub silhouette: f64,
    pub calinski: f64,
    pub profiles: Vec<ClusterProfile>,
    pub error: Option<String>,
}

/// Aggregated results of a full grid sweep.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow> {
        self.rows.iter()
    }

    /// Best row by silhouette for a given dataset partition, ignoring failed
    /// and degenerate rows.
    pub fn best_by_silhouette(&self, dataset: &str) -> Option<&ResultRow> {
        self.rows
            .iter()
            .filter(|r| r.dataset == dataset && r.error.is_none() && r.silhouette.is_finite())
            .max_by(|a, b| {
                a.silhouette
                    .partial_cmp(&b.silhouette)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// Persist the table as a delimited file. Profiles are flattened into a
    /// single readable column; persistence beyond this hand-off is the
    /// caller's concern.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create {}", path.display()))?;

        writer.write_record([
            "dataset",
            "model",
            "n_clusters",
            "preprocessing",
            "silhouette",
            "calinski",
            "cluster_profiles",
            "error",
        ])?;

        for row in &self.rows {
            let profiles = row
                .profiles
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(";");
            let n_clusters = row.n_clusters.to_string();
            let silhouette = row.silhouette.to_string();
            let calinski = row.calinski.to_string();
            writer.write_record([
                row.dataset.as_str(),
                row.model.as_str(),
                n_clusters.as_str(),
                row.preprocessing.as_str(),
                silhouette.as_str(),
                calinski.as_str(),
                profiles.as_str(),
                row.error.as_deref().unwrap_or(""),
            ])?;
        }

        writer.flush()?;
        log::info!("Wrote {} result rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

/// Sweep the full experiment grid.
///
/// Iterates models (outer), then cluster counts, then preprocessing
/// strategies, running each cell on fresh copies and evaluating all three
/// partitions, so a clean grid yields `models x clusters x preprocessing x 3`
/// rows. The grid specification itself is validated up front: empty axes or
/// any cluster count below 2 fail before any model is fit. Failures that only
/// surface inside a cell are logged and recorded as failed rows so the rest
/// of the grid completes.
pub fn run_all_experiments(
    train: &FundDataset,
    test: &FundDataset,
    val: &FundDataset,
    grid: &GridConfig,
) -> Result<ResultTable, ExperimentError> {
    validate_grid(grid)?;

    let mut table = ResultTable::default();

    for model_type in &grid.models {
        for &n_clusters in &grid.cluster_counts {
            for strategy in &grid.preprocessing {
                log::info!(
                    "Running experiment: model={}, clusters={}, preprocessing={}",
                    model_type.name(),
                    n_clusters,
                    strategy.name()
                );

                match run_experiment(
                    model_type,
                    train,
                    test,
                    val,
                    strategy,
                    n_clusters,
                    grid.random_state,
                ) {
                    Ok(outcome) => {
                        for (name, labeled, transformed) in outcome.partitions() {
                            let row = evaluate_partition(
                                name,
                                labeled,
                                transformed,
                                model_type,
                                n_clusters,
                                strategy,
                                &grid.look_features,
                            );
                            table.rows.push(row);
                        }
                    }
                    Err(err) => {
                        log::warn!(
                            "Experiment failed (model={}, clusters={}, preprocessing={}): {}",
                            model_type.name(),
                            n_clusters,
                            strategy.name(),
                            err
                        );
                        for name in DATASET_NAMES {
                            table.rows.push(failed_row(
                                name,
                                model_type,
                                n_clusters,
                                strategy,
                                &err,
                            ));
                        }
                    }
                }
            }
        }
    }

    Ok(table)
}

fn validate_grid(grid: &GridConfig) -> Result<(), ExperimentError> {
    if grid.models.is_empty() {
        return Err(ExperimentError::Configuration(
            "grid has no model types".to_string(),
        ));
    }
    if grid.cluster_counts.is_empty() {
        return Err(ExperimentError::Configuration(
            "grid has no cluster counts".to_string(),
        ));
    }
    if grid.preprocessing.is_empty() {
        return Err(ExperimentError::Configuration(
            "grid has no preprocessing strategies".to_string(),
        ));
    }
    if let Some(&bad) = grid.cluster_counts.iter().find(|&&c| c < 2) {
        return Err(ExperimentError::Configuration(format!(
            "cluster count must be at least 2, got {}",
            bad
        )));
    }
    Ok(())
}

fn evaluate_partition(
    name: &str,
    labeled: &LabeledDataset,
    transformed: &Array2<f64>,
    model_type: &ModelType,
    n_clusters: usize,
    strategy: &PreProcessing,
    look_features: &[String],
) -> ResultRow {
    let scores = evaluate_clusters(transformed, &labeled.labels);
    if scores.is_degenerate() {
        log::warn!(
            "Degenerate clustering on {} (model={}, clusters={}, preprocessing={})",
            name,
            model_type.name(),
            n_clusters,
            strategy.name()
        );
    }

    let (profiles, error) = match cluster_profiles(labeled, look_features) {
        Ok(profiles) => (profiles, None),
        Err(err) => (Vec::new(), Some(err.to_string())),
    };

    ResultRow {
        dataset: name.to_string(),
        model: model_type.name().to_string(),
        n_clusters,
        preprocessing: strategy.name().to_string(),
        silhouette: scores.silhouette,
        calinski: scores.calinski,
        profiles,
        error,
    }
}

fn failed_row(
    name: &str,
    model_type: &ModelType,
    n_clusters: usize,
    strategy: &PreProcessing,
    err: &ExperimentError,
) -> ResultRow {
    ResultRow {
        dataset: name.to_string(),
        model: model_type.name().to_string(),
        n_clusters,
        preprocessing: strategy.name().to_string(),
        silhouette: f64::NAN,
        calinski: f64::NAN,
        profiles: Vec::new(),
        error: Some(err.to_string()),
    }
}
