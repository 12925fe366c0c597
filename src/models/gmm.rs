//! Gaussian mixture clustering: diagonal-covariance EM with k-means
//! initialized means, plus the `ClusterTrainer` adapter used by the grid.

use ndarray::Array2;
use statrs::distribution::{Continuous, Normal};

use crate::config::{ModelParams, ModelType};
use crate::error::ExperimentError;
use crate::models::cluster_trait::{ClusterTrainer, ParamUpdate};
use crate::models::kmeans::KMeans;

const MIN_WEIGHT: f64 = 1e-12;

/// Probabilistic mixture clustering. Each component is an axis-aligned
/// Gaussian; points are assigned to the most likely component.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    pub n_components: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
    /// Floor added to every variance, keeping densities finite on
    /// near-constant columns.
    pub reg_covar: f64,
    pub seed: u64,
    weights: Option<Vec<f64>>,
    means: Option<Array2<f64>>,
    variances: Option<Array2<f64>>,
    /// Mean per-sample log-likelihood of the kept run.
    pub log_likelihood: f64,
}

struct FittedState {
    weights: Vec<f64>,
    means: Array2<f64>,
    variances: Array2<f64>,
    log_likelihood: f64,
}

impl GaussianMixture {
    pub fn new(
        n_components: usize,
        seed: u64,
        n_init: usize,
        max_iter: usize,
        tol: f64,
        reg_covar: f64,
    ) -> Self {
        GaussianMixture {
            n_components,
            n_init,
            max_iter,
            tol,
            reg_covar,
            seed,
            weights: None,
            means: None,
            variances: None,
            log_likelihood: f64::NEG_INFINITY,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<(), ExperimentError> {
        if x.nrows() == 0 {
            return Err(ExperimentError::Configuration(
                "cannot fit a Gaussian mixture on an empty matrix".to_string(),
            ));
        }

        let mut best: Option<FittedState> = None;
        for run in 0..self.n_init.max(1) {
            let state = self.run_once(x, self.seed.wrapping_add(run as u64))?;
            log::trace!(
                "GMM restart {} converged with log-likelihood {:.6}",
                run,
                state.log_likelihood
            );
            let better = best
                .as_ref()
                .map_or(true, |b| state.log_likelihood > b.log_likelihood);
            if better {
                best = Some(state);
            }
        }

        let state = best.expect("at least one EM run");
        self.log_likelihood = state.log_likelihood;
        self.weights = Some(state.weights);
        self.means = Some(state.means);
        self.variances = Some(state.variances);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ExperimentError> {
        let weights = self.weights.as_ref().ok_or(ExperimentError::NotFitted)?;
        let means = self.means.as_ref().ok_or(ExperimentError::NotFitted)?;
        let variances = self.variances.as_ref().ok_or(ExperimentError::NotFitted)?;

        let log_prob = component_log_prob(x, weights, means, variances)?;
        Ok((0..x.nrows())
            .map(|i| {
                let mut best = 0;
                let mut best_lp = f64::NEG_INFINITY;
                for c in 0..self.n_components {
                    if log_prob[[i, c]] > best_lp {
                        best_lp = log_prob[[i, c]];
                        best = c;
                    }
                }
                best
            })
            .collect())
    }

    fn run_once(&self, x: &Array2<f64>, seed: u64) -> Result<FittedState, ExperimentError> {
        let (n, d) = x.dim();
        let k = self.n_components;

        // Means start at k-means centroids; variances at the pooled
        // per-column variance so every component begins with full support.
        let mut init = KMeans::new(k, seed, 1, 50, 1e-6);
        init.fit(x)?;
        let mut means = init
            .centroids()
            .expect("k-means just fitted")
            .clone();

        let col_means = x.mean_axis(ndarray::Axis(0)).expect("non-empty matrix");
        let mut variances = Array2::zeros((k, d));
        for j in 0..d {
            let var = x
                .column(j)
                .iter()
                .map(|v| (v - col_means[j]).powi(2))
                .sum::<f64>()
                / n as f64;
            for c in 0..k {
                variances[[c, j]] = var + self.reg_covar;
            }
        }

        let mut weights = vec![1.0 / k as f64; k];
        let mut log_likelihood = f64::NEG_INFINITY;

        for _ in 0..self.max_iter {
            // E-step
            let log_prob = component_log_prob(x, &weights, &means, &variances)?;
            let mut resp = Array2::zeros((n, k));
            let mut total_ll = 0.0;
            for i in 0..n {
                let lse = log_sum_exp(log_prob.row(i).as_slice().expect("contiguous row"));
                total_ll += lse;
                for c in 0..k {
                    resp[[i, c]] = (log_prob[[i, c]] - lse).exp();
                }
            }
            let ll = total_ll / n as f64;
            if (ll - log_likelihood).abs() < self.tol {
                log_likelihood = ll;
                break;
            }
            log_likelihood = ll;

            // M-step
            for c in 0..k {
                let nk: f64 = (0..n).map(|i| resp[[i, c]]).sum();
                if nk < MIN_WEIGHT {
                    weights[c] = MIN_WEIGHT;
                    continue;
                }
                weights[c] = nk / n as f64;
                for j in 0..d {
                    let mean = (0..n).map(|i| resp[[i, c]] * x[[i, j]]).sum::<f64>() / nk;
                    means[[c, j]] = mean;
                    let var = (0..n)
                        .map(|i| resp[[i, c]] * (x[[i, j]] - mean).powi(2))
                        .sum::<f64>()
                        / nk;
                    variances[[c, j]] = var + self.reg_covar;
                }
            }
        }

        Ok(FittedState {
            weights,
            means,
            variances,
            log_likelihood,
        })
    }
}

/// Weighted per-component log density, shape (n, k).
fn component_log_prob(
    x: &Array2<f64>,
    weights: &[f64],
    means: &Array2<f64>,
    variances: &Array2<f64>,
) -> Result<Array2<f64>, ExperimentError> {
    let (n, d) = x.dim();
    let k = weights.len();

    let mut normals = Vec::with_capacity(k * d);
    for c in 0..k {
        for j in 0..d {
            let std_dev = variances[[c, j]].sqrt();
            let normal = Normal::new(means[[c, j]], std_dev).map_err(|e| {
                ExperimentError::Configuration(format!("degenerate mixture component: {}", e))
            })?;
            normals.push(normal);
        }
    }

    let mut log_prob = Array2::zeros((n, k));
    for i in 0..n {
        for c in 0..k {
            let mut lp = weights[c].max(MIN_WEIGHT).ln();
            for j in 0..d {
                lp += normals[c * d + j].ln_pdf(x[[i, j]]);
            }
            log_prob[[i, c]] = lp;
        }
    }
    Ok(log_prob)
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Adapter exposing the Gaussian mixture through the grid's trainer contract.
pub struct GmmTrainer {
    params: ModelParams,
    model: Option<GaussianMixture>,
}

impl GmmTrainer {
    pub fn new(params: ModelParams) -> Self {
        GmmTrainer {
            params,
            model: None,
        }
    }
}

impl ClusterTrainer for GmmTrainer {
    fn set_params(&mut self, update: ParamUpdate) {
        if let Some(n_clusters) = update.n_clusters {
            self.params.n_clusters = n_clusters;
        }
        if let Some(random_state) = update.random_state {
            self.params.random_state = random_state;
        }
        if let ModelType::Gmm {
            n_init,
            max_iter,
            tol,
            ..
        } = &mut self.params.model_type
        {
            if let Some(v) = update.n_init {
                *n_init = v;
            }
            if let Some(v) = update.max_iter {
                *max_iter = v;
            }
            if let Some(v) = update.tol {
                *tol = v;
            }
        }
    }

    fn build(&mut self) -> Result<(), ExperimentError> {
        if self.params.n_clusters < 2 {
            return Err(ExperimentError::Configuration(format!(
                "cluster count must be at least 2, got {}",
                self.params.n_clusters
            )));
        }
        match self.params.model_type {
            ModelType::Gmm {
                n_init,
                max_iter,
                tol,
                reg_covar,
            } => {
                if n_init == 0 || max_iter == 0 {
                    return Err(ExperimentError::Configuration(
                        "n_init and max_iter must be positive".to_string(),
                    ));
                }
                if reg_covar <= 0.0 {
                    return Err(ExperimentError::Configuration(
                        "reg_covar must be positive".to_string(),
                    ));
                }
                // The grid speaks in clusters; the mixture's native
                // hyperparameter is its component count.
                let n_components = self.params.n_clusters;
                self.model = Some(GaussianMixture::new(
                    n_components,
                    self.params.random_state,
                    n_init,
                    max_iter,
                    tol,
                    reg_covar,
                ));
                Ok(())
            }
            _ => Err(ExperimentError::Configuration(
                "GmmTrainer built with non-gmm parameters".to_string(),
            )),
        }
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<(), ExperimentError> {
        let model = self.model.as_mut().ok_or(ExperimentError::NotBuilt)?;
        model.fit(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ExperimentError> {
        let model = self.model.as_ref().ok_or(ExperimentError::NotBuilt)?;
        model.predict(x)
    }

    fn name(&self) -> &str {
        "gmm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::str::FromStr;

    fn two_blob_matrix() -> Array2<f64> {
        array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.2],
            [-0.1, 0.1],
            [10.0, 10.1],
            [10.2, 10.0],
            [9.9, 10.2],
            [10.1, 9.9]
        ]
    }

    #[test]
    fn gmm_separates_two_blobs() {
        let x = two_blob_matrix();
        let mut model = GaussianMixture::new(2, 42, 1, 100, 1e-6, 1e-6);
        model.fit(&x).unwrap();
        let labels = model.predict(&x).unwrap();

        assert_eq!(labels.len(), 8);
        assert!(labels.iter().all(|&l| l < 2));
        assert!(labels[..4].iter().all(|&l| l == labels[0]));
        assert!(labels[4..].iter().all(|&l| l == labels[4]));
        assert_ne!(labels[0], labels[4]);
    }

    #[test]
    fn gmm_is_deterministic_for_fixed_seed() {
        let x = two_blob_matrix();
        let mut a = GaussianMixture::new(2, 3, 2, 100, 1e-6, 1e-6);
        let mut b = GaussianMixture::new(2, 3, 2, 100, 1e-6, 1e-6);
        a.fit(&x).unwrap();
        b.fit(&x).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn log_sum_exp_matches_direct_sum() {
        let values: [f64; 3] = [-1.0, -2.0, -3.0];
        let direct: f64 = values.iter().map(|v| v.exp()).sum::<f64>().ln();
        assert!((log_sum_exp(&values) - direct).abs() < 1e-12);
    }

    #[test]
    fn trainer_translates_cluster_count_at_build() {
        let params = ModelParams::new(3, 0, ModelType::from_str("gmm").unwrap());
        let mut trainer = GmmTrainer::new(params);
        trainer.build().unwrap();
        assert_eq!(trainer.model.as_ref().unwrap().n_components, 3);
    }

    #[test]
    fn trainer_guards_call_order() {
        let params = ModelParams::new(2, 0, ModelType::from_str("gmm").unwrap());
        let mut trainer = GmmTrainer::new(params);
        let x = two_blob_matrix();
        assert_eq!(trainer.fit(&x).unwrap_err(), ExperimentError::NotBuilt);

        trainer.build().unwrap();
        assert_eq!(trainer.predict(&x).unwrap_err(), ExperimentError::NotFitted);
    }
}
