//! fundcluster: clustering experiments over investment-fund time series.
//!
//! This crate provides the experiment-grid evaluation engine used to segment
//! Brazilian investment funds from their monthly regulatory filings: leakage-safe
//! preprocessing strategies (robust scaling, PCA), cluster model adapters
//! (k-means, Gaussian mixture), internal validity metrics, and a grid
//! orchestrator that sweeps {model x cluster count x preprocessing} and collects
//! one comparable result table.
//!
//! The design favors small, testable modules. Datasets arrive pre-split into
//! train/test/validation partitions; stateful transforms and models are fit on
//! the training partition only.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod evaluation;
pub mod experiment;
pub mod logging;
pub mod models;
pub mod preprocessing;
