//! K-means clustering: seeded k-means++ initialization, Lloyd iterations,
//! best-of-n restarts, plus the `ClusterTrainer` adapter used by the grid.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ModelParams, ModelType};
use crate::error::ExperimentError;
use crate::models::cluster_trait::{ClusterTrainer, ParamUpdate};

/// Partition-based clustering with a fixed number of centroids.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub k: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
    centroids: Option<Array2<f64>>,
    /// Within-cluster sum of squared distances of the kept run.
    pub inertia: f64,
}

impl KMeans {
    pub fn new(k: usize, seed: u64, n_init: usize, max_iter: usize, tol: f64) -> Self {
        KMeans {
            k,
            n_init,
            max_iter,
            tol,
            seed,
            centroids: None,
            inertia: f64::INFINITY,
        }
    }

    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }

    /// Fit on the training matrix, keeping the restart with lowest inertia.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<(), ExperimentError> {
        if x.nrows() == 0 {
            return Err(ExperimentError::Configuration(
                "cannot fit k-means on an empty matrix".to_string(),
            ));
        }

        let mut best_inertia = f64::INFINITY;
        let mut best_centroids: Option<Array2<f64>> = None;

        for run in 0..self.n_init.max(1) {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(run as u64));
            let (centroids, inertia) = self.run_once(x, &mut rng);
            log::trace!("k-means restart {} finished with inertia {:.6}", run, inertia);
            if inertia < best_inertia {
                best_inertia = inertia;
                best_centroids = Some(centroids);
            }
        }

        self.inertia = best_inertia;
        self.centroids = best_centroids;
        Ok(())
    }

    /// Assign each row of `x` to its nearest fitted centroid.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ExperimentError> {
        let centroids = self.centroids.as_ref().ok_or(ExperimentError::NotFitted)?;
        Ok((0..x.nrows())
            .map(|r| nearest_centroid(&x.row(r).to_vec(), centroids).0)
            .collect())
    }

    fn run_once(&self, x: &Array2<f64>, rng: &mut StdRng) -> (Array2<f64>, f64) {
        let n = x.nrows();
        let mut centroids = kmeanspp_init(x, self.k, rng);
        let mut labels = vec![0usize; n];
        let mut prev_inertia = f64::INFINITY;

        for _ in 0..self.max_iter {
            let mut inertia = 0.0;
            for r in 0..n {
                let (nearest, dist2) = nearest_centroid(&x.row(r).to_vec(), &centroids);
                labels[r] = nearest;
                inertia += dist2;
            }

            if (prev_inertia - inertia).abs() < self.tol {
                break;
            }
            prev_inertia = inertia;

            centroids = update_centroids(x, &labels, &centroids);
        }

        // Inertia against the final centroids, not the pre-update ones.
        let inertia = (0..n)
            .map(|r| nearest_centroid(&x.row(r).to_vec(), &centroids).1)
            .sum();

        (centroids, inertia)
    }
}

/// k-means++ seeding: the first centroid is uniform, each further centroid is
/// sampled proportionally to squared distance from the nearest chosen one.
fn kmeanspp_init(x: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let (n, d) = x.dim();
    let mut centroids = Array2::zeros((k, d));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&x.row(first));

    let mut dist2: Vec<f64> = (0..n)
        .map(|r| squared_distance(&x.row(r).to_vec(), &centroids.row(0).to_vec()))
        .collect();

    for c in 1..k {
        let total: f64 = dist2.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut idx = n - 1;
            for (i, &w) in dist2.iter().enumerate() {
                target -= w;
                if target <= 0.0 {
                    idx = i;
                    break;
                }
            }
            idx
        } else {
            // All remaining points coincide with a centroid already.
            rng.gen_range(0..n)
        };

        centroids.row_mut(c).assign(&x.row(chosen));
        for r in 0..n {
            let d2 = squared_distance(&x.row(r).to_vec(), &centroids.row(c).to_vec());
            if d2 < dist2[r] {
                dist2[r] = d2;
            }
        }
    }

    centroids
}

fn nearest_centroid(point: &[f64], centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.outer_iter().enumerate() {
        let d2 = squared_distance(point, centroid.as_slice().expect("contiguous row"));
        if d2 < best_dist {
            best_dist = d2;
            best = c;
        }
    }
    (best, best_dist)
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Mean of each cluster's members; empty clusters keep their old centroid.
fn update_centroids(x: &Array2<f64>, labels: &[usize], previous: &Array2<f64>) -> Array2<f64> {
    let (n, d) = x.dim();
    let k = previous.nrows();
    let mut sums = Array2::<f64>::zeros((k, d));
    let mut counts = vec![0usize; k];

    for r in 0..n {
        let label = labels[r];
        counts[label] += 1;
        for j in 0..d {
            sums[[label, j]] += x[[r, j]];
        }
    }

    let mut centroids = previous.clone();
    for c in 0..k {
        if counts[c] > 0 {
            for j in 0..d {
                centroids[[c, j]] = sums[[c, j]] / counts[c] as f64;
            }
        }
    }
    centroids
}

/// Adapter exposing k-means through the grid's trainer contract.
pub struct KMeansTrainer {
    params: ModelParams,
    model: Option<KMeans>,
}

impl KMeansTrainer {
    pub fn new(params: ModelParams) -> Self {
        KMeansTrainer {
            params,
            model: None,
        }
    }
}

impl ClusterTrainer for KMeansTrainer {
    fn set_params(&mut self, update: ParamUpdate) {
        if let Some(n_clusters) = update.n_clusters {
            self.params.n_clusters = n_clusters;
        }
        if let Some(random_state) = update.random_state {
            self.params.random_state = random_state;
        }
        if let ModelType::KMeans {
            n_init,
            max_iter,
            tol,
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
            ModelType::KMeans {
                n_init,
                max_iter,
                tol,
            } => {
                if n_init == 0 || max_iter == 0 {
                    return Err(ExperimentError::Configuration(
                        "n_init and max_iter must be positive".to_string(),
                    ));
                }
                self.model = Some(KMeans::new(
                    self.params.n_clusters,
                    self.params.random_state,
                    n_init,
                    max_iter,
                    tol,
                ));
                Ok(())
            }
            _ => Err(ExperimentError::Configuration(
                "KMeansTrainer built with non-kmeans parameters".to_string(),
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
        "kmeans"
    }
}
