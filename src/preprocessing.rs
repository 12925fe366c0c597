//! Leakage-safe preprocessing strategies for train/test/validation triples.
//!
//! Provides a robust (median/IQR) scaler and a PCA projection, each with an
//! explicit fit/transform split so that fitted state always comes from the
//! training partition alone. `PreProcessing` names the four strategies the
//! experiment grid sweeps over and applies them consistently to all three
//! partitions.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;

/// Robust per-column scaler: centers on the median and scales by the
/// interquartile range. Resists the outlier-heavy tails of fund returns
/// better than mean/variance standardization.
#[derive(Clone, Debug)]
pub struct RobustScaler {
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

impl RobustScaler {
    /// Minimum scale to avoid division by zero on constant columns.
    const MIN_SCALE: f64 = 1e-6;

    /// Fit center/scale from the training matrix only.
    pub fn fit(x: &Array2<f64>) -> RobustScaler {
        let (nrows, ncols) = x.dim();
        assert!(nrows > 0 && ncols > 0, "RobustScaler::fit requires non-empty matrix");

        let mut center = Vec::with_capacity(ncols);
        let mut scale = Vec::with_capacity(ncols);
        for c in 0..ncols {
            let mut col: Vec<f64> = x.column(c).to_vec();
            col.sort_by(|a, b| a.partial_cmp(b).expect("non-finite value in scaler input"));
            let median = quantile(&col, 0.5);
            let iqr = quantile(&col, 0.75) - quantile(&col, 0.25);
            center.push(median);
            scale.push(iqr.max(Self::MIN_SCALE));
        }
        RobustScaler { center, scale }
    }

    /// Transform any matrix with the fitted center/scale.
    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let (nrows, ncols) = x.dim();
        assert_eq!(ncols, self.center.len(), "column count changed since fit");
        let mut out = x.clone();
        for r in 0..nrows {
            for c in 0..ncols {
                out[[r, c]] = (x[[r, c]] - self.center[c]) / self.scale[c];
            }
        }
        out
    }
}

/// Linear dimensionality reduction fitted on the training partition.
///
/// Columns are centered on the train means and projected onto the leading
/// eigenvectors of the train covariance matrix.
#[derive(Clone, Debug)]
pub struct Pca {
    mean: Array1<f64>,
    /// (n_features, n_components), columns ordered by descending eigenvalue.
    components: Array2<f64>,
    pub explained_variance: Vec<f64>,
}

impl Pca {
    pub fn fit(x: &Array2<f64>, n_components: usize) -> Result<Pca, ExperimentError> {
        let (nrows, ncols) = x.dim();
        if n_components == 0 {
            return Err(ExperimentError::Configuration(
                "PCA component count must be positive".to_string(),
            ));
        }
        if n_components > ncols {
            return Err(ExperimentError::Configuration(format!(
                "PCA component count {} exceeds feature count {}",
                n_components, ncols
            )));
        }
        if nrows < 2 {
            return Err(ExperimentError::Configuration(
                "PCA requires at least two training rows".to_string(),
            ));
        }

        let mean = x.mean_axis(ndarray::Axis(0)).expect("non-empty matrix");
        let centered = x - &mean.view().insert_axis(ndarray::Axis(0));
        let cov = centered.t().dot(&centered) / (nrows as f64 - 1.0);

        let (eigenvalues, eigenvectors) = symmetric_eigen(&cov);

        // Order eigenpairs by descending eigenvalue and keep the leading ones.
        let mut order: Vec<usize> = (0..ncols).collect();
        order.sort_by(|&a, &b| {
            eigenvalues[b]
                .partial_cmp(&eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut components = Array2::zeros((ncols, n_components));
        let mut explained_variance = Vec::with_capacity(n_components);
        for (out_col, &src_col) in order.iter().take(n_components).enumerate() {
            for row in 0..ncols {
                components[[row, out_col]] = eigenvectors[[row, src_col]];
            }
            explained_variance.push(eigenvalues[src_col].max(0.0));
        }

        Ok(Pca {
            mean,
            components,
            explained_variance,
        })
    }

    pub fn n_components(&self) -> usize {
        self.components.ncols()
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let centered = x - &self.mean.view().insert_axis(ndarray::Axis(0));
        centered.dot(&self.components)
    }
}

/// Linear-interpolation quantile of a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Eigendecomposition of a symmetric matrix via cyclic Jacobi rotations.
///
/// Returns (eigenvalues, eigenvectors) with eigenvectors as columns, unsorted.
fn symmetric_eigen(a: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut m = a.clone();
    let mut v: Array2<f64> = Array2::eye(n);

    for _sweep in 0..100 {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += m[[p, q]] * m[[p, q]];
            }
        }
        if off < 1e-22 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if m[[p, q]].abs() < 1e-300 {
                    continue;
                }
                let theta = (m[[q, q]] - m[[p, p]]) / (2.0 * m[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                // M <- J^T M J, applied as row then column rotations.
                for j in 0..n {
                    let mpj = m[[p, j]];
                    let mqj = m[[q, j]];
                    m[[p, j]] = c * mpj - s * mqj;
                    m[[q, j]] = s * mpj + c * mqj;
                }
                for i in 0..n {
                    let mip = m[[i, p]];
                    let miq = m[[i, q]];
                    m[[i, p]] = c * mip - s * miq;
                    m[[i, q]] = s * mip + c * miq;
                }
                for i in 0..n {
                    let vip = v[[i, p]];
                    let viq = v[[i, q]];
                    v[[i, p]] = c * vip - s * viq;
                    v[[i, q]] = s * vip + c * viq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| m[[i, i]]).collect();
    (eigenvalues, v)
}

/// Preprocessing strategy applied uniformly to a train/test/validation triple.
///
/// All fitted state (scaler center/scale, PCA mean/components) comes from the
/// training partition alone; test and validation are only ever transformed.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum PreProcessing {
    /// Baseline: matrices pass through unchanged.
    None,
    /// Robust scaling only.
    Scaled,
    /// PCA on raw units — a deliberate comparison point against scaled PCA.
    Pca { n_components: usize },
    /// Robust scaling followed by PCA on the scaled output.
    ScaledPca { n_components: usize },
}

impl PreProcessing {
    /// Stable name used to tag result rows.
    pub fn name(&self) -> &'static str {
        match self {
            PreProcessing::None => "none",
            PreProcessing::Scaled => "scaled",
            PreProcessing::Pca { .. } => "pca",
            PreProcessing::ScaledPca { .. } => "scaled_pca",
        }
    }

    /// Fit on train, transform all three partitions.
    pub fn apply(
        &self,
        train: &Array2<f64>,
        test: &Array2<f64>,
        val: &Array2<f64>,
    ) -> Result<(Array2<f64>, Array2<f64>, Array2<f64>), ExperimentError> {
        let ncols = train.ncols();
        for other in [test, val] {
            if other.ncols() != ncols {
                return Err(ExperimentError::SchemaMismatch {
                    expected: ncols,
                    found: other.ncols(),
                });
            }
        }

        match self {
            PreProcessing::None => Ok((train.clone(), test.clone(), val.clone())),
            PreProcessing::Scaled => {
                log::debug!("Fitting RobustScaler on {} train rows", train.nrows());
                let scaler = RobustScaler::fit(train);
                Ok((
                    scaler.transform(train),
                    scaler.transform(test),
                    scaler.transform(val),
                ))
            }
            PreProcessing::Pca { n_components } => {
                log::debug!(
                    "Fitting PCA ({} components) on {} train rows",
                    n_components,
                    train.nrows()
                );
                let pca = Pca::fit(train, *n_components)?;
                Ok((pca.transform(train), pca.transform(test), pca.transform(val)))
            }
            PreProcessing::ScaledPca { n_components } => {
                let scaler = RobustScaler::fit(train);
                let train_scaled = scaler.transform(train);
                let pca = Pca::fit(&train_scaled, *n_components)?;
                Ok((
                    pca.transform(&train_scaled),
                    pca.transform(&scaler.transform(test)),
                    pca.transform(&scaler.transform(val)),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn robust_scaler_centers_on_median() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [100.0]];
        let scaler = RobustScaler::fit(&x);
        // Median of [1,2,3,4,100] is 3; the outlier does not move the center.
        assert!((scaler.center[0] - 3.0).abs() < 1e-12);

        let t = scaler.transform(&x);
        assert!((t[[2, 0]]).abs() < 1e-12, "median row should map to 0");
    }

    #[test]
    fn robust_scaler_constant_column_clamped() {
        let x = array![[5.0], [5.0], [5.0]];
        let scaler = RobustScaler::fit(&x);
        assert_eq!(scaler.scale[0], RobustScaler::MIN_SCALE);
        let t = scaler.transform(&x);
        assert!(t.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn pca_recovers_dominant_direction() {
        // Points along the x-axis with tiny y noise: first component should
        // capture nearly all variance.
        let x = array![
            [-2.0, 0.01],
            [-1.0, -0.01],
            [0.0, 0.02],
            [1.0, -0.02],
            [2.0, 0.0]
        ];
        let pca = Pca::fit(&x, 2).unwrap();
        assert!(pca.explained_variance[0] > 100.0 * pca.explained_variance[1]);

        let projected = pca.transform(&x);
        assert_eq!(projected.dim(), (5, 2));
    }

    #[test]
    fn pca_rejects_too_many_components() {
        let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let err = Pca::fit(&x, 3).unwrap_err();
        assert!(matches!(err, ExperimentError::Configuration(_)));
    }

    #[test]
    fn symmetric_eigen_diagonalizes() {
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let (values, vectors) = symmetric_eigen(&a);
        let mut sorted = values.clone();
        sorted.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert!((sorted[0] - 1.0).abs() < 1e-9);
        assert!((sorted[1] - 3.0).abs() < 1e-9);

        // Columns should be orthonormal.
        for c in 0..2 {
            let norm: f64 = (0..2).map(|r| vectors[[r, c]] * vectors[[r, c]]).sum();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn apply_rejects_column_mismatch() {
        let train = array![[1.0, 2.0], [3.0, 4.0]];
        let bad = array![[1.0], [2.0]];
        let err = PreProcessing::Scaled
            .apply(&train, &bad, &train)
            .unwrap_err();
        assert_eq!(
            err,
            ExperimentError::SchemaMismatch {
                expected: 2,
                found: 1
            }
        );
    }
}
