//! Integration tests for the cluster evaluator: metric values, the
//! degenerate sentinel, and look-feature profiles.

mod common;

use fundcluster::evaluation::{cluster_profiles, evaluate_clusters};

#[test]
fn separated_blobs_score_well_on_both_metrics() {
    let data = common::blob_dataset(60, 5);
    let labels: Vec<usize> = (0..60).map(|i| usize::from(i >= 30)).collect();

    let scores = evaluate_clusters(&data.x, &labels);
    assert!(scores.silhouette > 0.5, "silhouette = {}", scores.silhouette);
    assert!(scores.silhouette <= 1.0);
    assert!(scores.calinski > 10.0, "calinski = {}", scores.calinski);
    assert!(!scores.is_degenerate());
}

#[test]
fn single_label_is_exactly_negative_infinity() {
    let data = common::blob_dataset(20, 6);
    let scores = evaluate_clusters(&data.x, &vec![0; 20]);
    assert_eq!(scores.silhouette, f64::NEG_INFINITY);
    assert_eq!(scores.calinski, f64::NEG_INFINITY);
}

#[test]
fn constant_data_does_not_raise() {
    // All rows identical: whatever the labels, metrics stay finite or
    // degenerate, never a panic or NaN from division by zero.
    let data = common::constant_dataset(12);
    let one_label = evaluate_clusters(&data.x, &vec![0; 12]);
    assert!(one_label.is_degenerate());

    let labels: Vec<usize> = (0..12).map(|i| i % 2).collect();
    let split = evaluate_clusters(&data.x, &labels);
    assert!(!split.silhouette.is_nan());
    assert!(!split.calinski.is_nan());
}

#[test]
fn profiles_average_look_features_per_cluster() {
    let data = common::blob_dataset(40, 8);
    let labels: Vec<usize> = (0..40).map(|i| usize::from(i >= 20)).collect();
    let labeled = data.with_labels(labels);

    let profiles = cluster_profiles(&labeled, &common::look_features()).unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0].label, 0);
    assert_eq!(profiles[0].size, 20);
    assert_eq!(profiles[1].size, 20);

    // Blob 0 sits near 0, blob 1 near 10, for every look feature.
    for (name, mean) in &profiles[0].means {
        assert!(mean.abs() < 1.0, "cluster 0 {} = {}", name, mean);
    }
    for (name, mean) in &profiles[1].means {
        assert!((mean - 10.0).abs() < 1.0, "cluster 1 {} = {}", name, mean);
    }
}

#[test]
fn unknown_look_feature_is_a_configuration_error() {
    let data = common::blob_dataset(10, 9);
    let labeled = data.with_labels(vec![0; 10]);
    let err = cluster_profiles(&labeled, &["max_drawdown".to_string()]).unwrap_err();
    assert!(matches!(
        err,
        fundcluster::error::ExperimentError::Configuration(_)
    ));
}
