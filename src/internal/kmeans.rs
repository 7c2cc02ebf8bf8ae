//! Lloyd's k-means with k-means++ seeding over 3-D colour points.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::Rng;

use crate::{Error, Result};

const MAX_ITER: usize = 300;

/// A fitted clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    pub centroids: Vec<Vector3<f64>>,
    /// Sum of squared distances of the points to their centroid.
    pub inertia: f64,
}

impl KMeans {
    /// Fit `k` clusters, keeping the lowest-inertia run of `n_init` restarts.
    pub fn fit(points: &[Vector3<f64>], k: usize, n_init: usize, rng: &mut StdRng) -> Result<Self> {
        if k == 0 || points.len() < k {
            return Err(Error::Clustering(format!(
                "cannot fit {} clusters to {} points",
                k,
                points.len()
            )));
        }

        let mut best: Option<KMeans> = None;
        for _ in 0..n_init.max(1) {
            let run = lloyd(points, seed_plus_plus(points, k, rng));
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }
        best.ok_or_else(|| Error::Clustering("no k-means run completed".to_string()))
    }

    /// Index of the nearest centroid. Ties go to the lowest index.
    pub fn predict(&self, point: &Vector3<f64>) -> usize {
        nearest(&self.centroids, point).0
    }

    pub fn labels(&self, points: &[Vector3<f64>]) -> Vec<usize> {
        points.iter().map(|p| self.predict(p)).collect()
    }
}

fn nearest(centroids: &[Vector3<f64>], point: &Vector3<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = (c - point).norm_squared();
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// k-means++: each next centroid is drawn with probability proportional to
/// its squared distance from the nearest centroid chosen so far.
fn seed_plus_plus(points: &[Vector3<f64>], k: usize, rng: &mut StdRng) -> Vec<Vector3<f64>> {
    let mut centroids = vec![points[rng.gen_range(0..points.len())]];

    while centroids.len() < k {
        let weights: Vec<f64> = points.iter().map(|p| nearest(&centroids, p).1).collect();
        let total: f64 = weights.iter().sum();

        let index = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        } else {
            rng.gen_range(0..points.len())
        };
        centroids.push(points[index]);
    }
    centroids
}

fn lloyd(points: &[Vector3<f64>], mut centroids: Vec<Vector3<f64>>) -> KMeans {
    let k = centroids.len();
    let mut labels = vec![usize::MAX; points.len()];

    for _ in 0..MAX_ITER {
        let mut changed = false;
        for (label, p) in labels.iter_mut().zip(points) {
            let nearest_label = nearest(&centroids, p).0;
            if *label != nearest_label {
                *label = nearest_label;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![Vector3::zeros(); k];
        let mut counts = vec![0usize; k];
        for (&label, p) in labels.iter().zip(points) {
            sums[label] += p;
            counts[label] += 1;
        }
        // An empty cluster keeps its previous centroid.
        for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
            if count > 0 {
                *centroid = sum / count as f64;
            }
        }
    }

    let inertia = points.iter().map(|p| nearest(&centroids, p).1).sum();
    KMeans { centroids, inertia }
}
