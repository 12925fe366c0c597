//! Internal cluster-validity metrics and per-cluster look-feature profiles.
//!
//! Geometric metrics (silhouette, Calinski-Harabasz) are computed in the
//! transformed model-input space. A clustering that collapses to a single
//! label is scored as negative infinity for both metrics — a sentinel the
//! grid keeps as data so degenerate configurations stay auditable instead of
//! aborting the sweep.

use ndarray::Array2;
use rayon::prelude::*;
use std::fmt;

use crate::data_handling::LabeledDataset;
use crate::error::ExperimentError;

/// Internal validity scores for one (matrix, labels) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterScores {
    pub silhouette: f64,
    pub calinski: f64,
}

impl ClusterScores {
    pub fn degenerate() -> Self {
        ClusterScores {
            silhouette: f64::NEG_INFINITY,
            calinski: f64::NEG_INFINITY,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.silhouette == f64::NEG_INFINITY && self.calinski == f64::NEG_INFINITY
    }
}

/// Score a clustering with silhouette and Calinski-Harabasz.
///
/// Returns the degenerate sentinel when fewer than two distinct labels are
/// present (single-cluster collapse) or when there are fewer than two rows.
pub fn evaluate_clusters(x: &Array2<f64>, labels: &[usize]) -> ClusterScores {
    assert_eq!(x.nrows(), labels.len(), "one label per row required");

    let mut unique = labels.to_vec();
    unique.sort_unstable();
    unique.dedup();

    if unique.len() <= 1 || x.nrows() < 2 {
        return ClusterScores::degenerate();
    }

    ClusterScores {
        silhouette: silhouette_score(x, labels),
        calinski: calinski_harabasz_score(x, labels),
    }
}

/// Mean per-sample silhouette coefficient, in [-1, 1].
///
/// For a sample i: a = mean distance to its own cluster's other members,
/// b = lowest mean distance to any other cluster, s = (b - a) / max(a, b).
/// Samples in singleton clusters score 0, as do samples with no other
/// non-empty cluster to compare against.
pub fn silhouette_score(x: &Array2<f64>, labels: &[usize]) -> f64 {
    let n = x.nrows();
    let k = labels.iter().copied().max().map_or(0, |m| m + 1);

    let mut counts = vec![0usize; k];
    for &label in labels {
        counts[label] += 1;
    }

    // Per-sample scores are computed in parallel but reduced sequentially:
    // a parallel sum would group the additions by work-steal splits and the
    // result would not be bit-identical across runs.
    let scores: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| {
            let row_i = x.row(i);
            // Accumulated distance from i to every cluster.
            let mut dist_sum = vec![0.0f64; k];
            for j in 0..n {
                if i == j {
                    continue;
                }
                let d = row_i
                    .iter()
                    .zip(x.row(j).iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt();
                dist_sum[labels[j]] += d;
            }

            let own = labels[i];
            if counts[own] <= 1 {
                return 0.0;
            }
            let a = dist_sum[own] / (counts[own] - 1) as f64;
            let b = (0..k)
                .filter(|&c| c != own && counts[c] > 0)
                .map(|c| dist_sum[c] / counts[c] as f64)
                .fold(f64::INFINITY, f64::min);
            if !b.is_finite() {
                // Single non-empty cluster: there is nothing to separate from.
                return 0.0;
            }

            let denom = a.max(b);
            if denom > 0.0 {
                (b - a) / denom
            } else {
                0.0
            }
        })
        .collect();

    scores.iter().sum::<f64>() / n as f64
}

/// Calinski-Harabasz index: between-cluster over within-cluster dispersion,
/// scaled by degrees of freedom. Higher is better; zero within-dispersion
/// (every point on its centroid) scores 1.0.
pub fn calinski_harabasz_score(x: &Array2<f64>, labels: &[usize]) -> f64 {
    let (n, d) = x.dim();
    let k = labels.iter().copied().max().map_or(0, |m| m + 1);

    let overall_mean = x.mean_axis(ndarray::Axis(0)).expect("non-empty matrix");

    let mut counts = vec![0usize; k];
    let mut centroids = Array2::<f64>::zeros((k, d));
    for (i, &label) in labels.iter().enumerate() {
        counts[label] += 1;
        for j in 0..d {
            centroids[[label, j]] += x[[i, j]];
        }
    }
    let occupied = counts.iter().filter(|&&c| c > 0).count();
    for c in 0..k {
        if counts[c] > 0 {
            for j in 0..d {
                centroids[[c, j]] /= counts[c] as f64;
            }
        }
    }

    let mut between = 0.0;
    for c in 0..k {
        if counts[c] == 0 {
            continue;
        }
        let dist2: f64 = (0..d)
            .map(|j| (centroids[[c, j]] - overall_mean[j]).powi(2))
            .sum();
        between += counts[c] as f64 * dist2;
    }

    let mut within = 0.0;
    for (i, &label) in labels.iter().enumerate() {
        within += (0..d)
            .map(|j| (x[[i, j]] - centroids[[label, j]]).powi(2))
            .sum::<f64>();
    }

    if within == 0.0 {
        return 1.0;
    }
    (between / (occupied as f64 - 1.0)) / (within / (n - occupied) as f64)
}

/// Per-cluster mean of each look feature, for human review of what the
/// clusters actually capture. Not used for model selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterProfile {
    pub label: usize,
    pub size: usize,
    pub means: Vec<(String, f64)>,
}

impl fmt::Display for ClusterProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:size={}", self.label, self.size)?;
        for (name, mean) in &self.means {
            write!(f, ",{}={:.6}", name, mean)?;
        }
        Ok(())
    }
}

/// Group the labeled partition by cluster label and average the requested
/// look-feature columns (the original, untransformed values).
pub fn cluster_profiles(
    labeled: &LabeledDataset,
    look_features: &[String],
) -> Result<Vec<ClusterProfile>, ExperimentError> {
    let columns: Vec<(String, usize)> = look_features
        .iter()
        .map(|name| {
            labeled
                .data
                .column_index(name)
                .map(|idx| (name.clone(), idx))
                .ok_or_else(|| {
                    ExperimentError::Configuration(format!(
                        "look feature '{}' not found in dataset",
                        name
                    ))
                })
        })
        .collect::<Result<_, _>>()?;

    let mut profiles = Vec::new();
    for label in labeled.unique_labels() {
        let rows: Vec<usize> = labeled
            .labels
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| if l == label { Some(i) } else { None })
            .collect();

        let means = columns
            .iter()
            .map(|(name, idx)| {
                let sum: f64 = rows.iter().map(|&r| labeled.data.x[[r, *idx]]).sum();
                (name.clone(), sum / rows.len() as f64)
            })
            .collect();

        profiles.push(ClusterProfile {
            label,
            size: rows.len(),
            means,
        });
    }
    Ok(profiles)
}
