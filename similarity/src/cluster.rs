//! Clustered inverted-file index (IVF).
//!
//! K-means++ seeding followed by Lloyd iterations partitions the vector set
//! into `nClusters` postings; search ranks centroids by Euclidean distance
//! to the query and scans the union of the `nProbe` nearest postings,
//! re-ranking by cosine similarity. Follows the same `add`-then-`build`-
//! then-`search` lifecycle as the graph index.

use crate::distance::{cosine_similarity, euclidean_distance};
use crate::error::Error;
use crate::vector::Vector;

use parking_lot::RwLock;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::HashMap;

const MOVEMENT_EPSILON: f32 = 1e-4;

struct State {
    vectors: HashMap<String, Vector>,
    centroids: Vec<Vector>,
    postings: HashMap<usize, Vec<String>>,
    built: bool,
}

/// A k-means-partitioned inverted-file ANN index.
pub struct ClusterIndex {
    dim: usize,
    n_clusters: usize,
    n_probe: usize,
    max_iter: usize,
    seed: Option<u64>,
    state: RwLock<State>,
}

impl ClusterIndex {
    pub fn new(dim: usize, n_clusters: usize, n_probe: usize, max_iter: usize) -> Self {
        Self::with_seed(dim, n_clusters, n_probe, max_iter, None)
    }

    pub fn with_seed(
        dim: usize,
        n_clusters: usize,
        n_probe: usize,
        max_iter: usize,
        seed: Option<u64>,
    ) -> Self {
        Self {
            dim,
            n_clusters: n_clusters.max(1),
            n_probe: n_probe.max(1),
            max_iter,
            seed,
            state: RwLock::new(State {
                vectors: HashMap::new(),
                centroids: Vec::new(),
                postings: HashMap::new(),
                built: false,
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.state.read().vectors.len()
    }

    pub fn is_built(&self) -> bool {
        self.state.read().built
    }

    /// Number of distinct posting keys; equals the centroid count once built.
    pub fn cluster_count(&self) -> usize {
        self.state.read().postings.len()
    }

    /// Reverts `built` to false; a rebuild is required before the next
    /// `search` uses the partitioned path again.
    #[tracing::instrument(skip(self, v))]
    pub fn add(&self, id: String, v: Vector) -> Result<(), Error> {
        if v.dim() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                found: v.dim(),
            });
        }
        let mut state = self.state.write();
        state.vectors.insert(id, v);
        state.built = false;
        Ok(())
    }

    /// K-means++ seeding plus Lloyd iterations. A build on an empty index
    /// is a warned no-op, not an error.
    #[tracing::instrument(skip(self))]
    pub fn build(&self) -> Result<(), Error> {
        let mut state = self.state.write();
        if state.vectors.is_empty() {
            tracing::warn!("cluster index build skipped: no vectors");
            return Ok(());
        }

        let ids: Vec<String> = state.vectors.keys().cloned().collect();
        let vecs: Vec<Vector> = ids.iter().map(|id| state.vectors[id].clone()).collect();
        let k = self.n_clusters.min(ids.len());

        let mut rng = match self.seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_entropy(),
        };

        let centroids = kmeans_plus_plus_seed(&vecs, k, &mut rng);
        let centroids = lloyd_iterate(&vecs, centroids, self.max_iter);

        let assignments: Vec<usize> = vecs
            .par_iter()
            .map(|v| nearest_centroid(v, &centroids))
            .collect();

        let mut postings: HashMap<usize, Vec<String>> = HashMap::new();
        for (id, cluster) in ids.iter().zip(assignments.iter()) {
            postings.entry(*cluster).or_default().push(id.clone());
        }

        // k-means++ can duplicate a seed centroid (nearest_centroid breaks
        // ties to the first index), leaving a centroid with no postings.
        // Drop those so the centroid count always equals the distinct
        // posting-key count.
        let mut used: Vec<usize> = postings.keys().cloned().collect();
        used.sort_unstable();
        let centroids: Vec<Vector> = used.iter().map(|&i| centroids[i].clone()).collect();
        let postings: HashMap<usize, Vec<String>> = used
            .into_iter()
            .enumerate()
            .map(|(new_idx, old_idx)| (new_idx, postings.remove(&old_idx).expect("key from postings")))
            .collect();

        state.centroids = centroids;
        state.postings = postings;
        state.built = true;
        Ok(())
    }

    /// Exact linear scan over every stored vector, ranked by cosine
    /// similarity to `q`, descending.
    fn exact_scan(state: &State, q: &Vector, k: usize) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = state
            .vectors
            .iter()
            .map(|(id, v)| (id.clone(), cosine_similarity(v.as_slice(), q.as_slice()).unwrap_or(0.0)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Falls back to [`Self::exact_scan`] when not built or empty, else
    /// probes the `nProbe` nearest centroids' postings.
    #[tracing::instrument(skip(self, q))]
    pub fn search(&self, q: &Vector, k: usize) -> Result<Vec<(String, f32)>, Error> {
        if q.dim() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                found: q.dim(),
            });
        }
        let state = self.state.read();
        if state.vectors.is_empty() {
            return Ok(Vec::new());
        }
        if !state.built {
            return Ok(Self::exact_scan(&state, q, k));
        }

        let mut ranked_centroids: Vec<(usize, f32)> = state
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, euclidean_distance(c.as_slice(), q.as_slice()).unwrap_or(f32::MAX)))
            .collect();
        ranked_centroids.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut scored: Vec<(String, f32)> = Vec::new();
        for (cluster, _) in ranked_centroids.into_iter().take(self.n_probe) {
            if let Some(ids) = state.postings.get(&cluster) {
                for id in ids {
                    if let Some(v) = state.vectors.get(id) {
                        let sim = cosine_similarity(v.as_slice(), q.as_slice()).unwrap_or(0.0);
                        scored.push((id.clone(), sim));
                    }
                }
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

fn nearest_centroid(v: &Vector, centroids: &[Vector]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, euclidean_distance(c.as_slice(), v.as_slice()).unwrap_or(f32::MAX)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// k-means++ seeding: first centroid uniform, subsequent ones sampled with
/// probability proportional to squared distance to the nearest chosen
/// centroid so far.
fn kmeans_plus_plus_seed(vecs: &[Vector], k: usize, rng: &mut SmallRng) -> Vec<Vector> {
    if vecs.is_empty() || k == 0 {
        return Vec::new();
    }
    let mut centroids = Vec::with_capacity(k);
    let first = rng.gen_range(0..vecs.len());
    centroids.push(vecs[first].clone());

    while centroids.len() < k {
        let sq_dists: Vec<f32> = vecs
            .iter()
            .map(|v| {
                centroids
                    .iter()
                    .map(|c| {
                        let d = euclidean_distance(c.as_slice(), v.as_slice()).unwrap_or(0.0);
                        d * d
                    })
                    .fold(f32::MAX, f32::min)
            })
            .collect();
        let total: f32 = sq_dists.iter().sum();
        if total <= 0.0 {
            // All remaining points coincide with a chosen centroid; fill
            // deterministically rather than looping forever.
            let idx = centroids.len() % vecs.len();
            centroids.push(vecs[idx].clone());
            continue;
        }
        let mut target = rng.gen::<f32>() * total;
        let mut chosen = vecs.len() - 1;
        for (i, d) in sq_dists.iter().enumerate() {
            if target <= *d {
                chosen = i;
                break;
            }
            target -= *d;
        }
        centroids.push(vecs[chosen].clone());
    }
    centroids
}

/// Lloyd iterations: assign-then-recompute until convergence or `max_iter`
/// Empty clusters retain their previous centroid.
fn lloyd_iterate(vecs: &[Vector], mut centroids: Vec<Vector>, max_iter: usize) -> Vec<Vector> {
    if centroids.is_empty() {
        return centroids;
    }
    let dim = centroids[0].dim();

    for _ in 0..max_iter {
        let assignments: Vec<usize> = vecs
            .par_iter()
            .map(|v| nearest_centroid(v, &centroids))
            .collect();

        let mut sums = vec![vec![0.0f32; dim]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (v, &cluster) in vecs.iter().zip(assignments.iter()) {
            counts[cluster] += 1;
            for (acc, &x) in sums[cluster].iter_mut().zip(v.as_slice()) {
                *acc += x;
            }
        }

        let mut max_movement = 0.0f32;
        let mut next = Vec::with_capacity(centroids.len());
        for (i, centroid) in centroids.iter().enumerate() {
            if counts[i] == 0 {
                next.push(centroid.clone());
                continue;
            }
            let mean: Vec<f32> = sums[i].iter().map(|&s| s / counts[i] as f32).collect();
            let movement = euclidean_distance(centroid.as_slice(), &mean).unwrap_or(0.0);
            max_movement = max_movement.max(movement);
            next.push(Vector::new(mean));
        }
        centroids = next;

        if max_movement < MOVEMENT_EPSILON {
            break;
        }
    }
    centroids
}
