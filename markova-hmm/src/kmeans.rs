//! Initial model guess from k-means clustering of observations.
//!
//! Baum-Welch only finds a local maximum, so the starting model matters.
//! [`initial_hmm`] clusters the flattened corpus into one group per state,
//! fits each state's emission distribution to its cluster, and starts from
//! uniform initial and transition probabilities.

use markova_core::{MarkovaError, Result};

use crate::corpus::flatten;
use crate::model::Hmm;
use crate::opdf::Opdf;

/// A cluster center over observations of type `O`.
pub trait Centroid<O>: Clone {
    /// A centroid located at a single observation.
    fn from_observation(observation: &O) -> Self;

    /// Distance between the centroid and `observation` (non-negative).
    fn distance(&self, observation: &O) -> f64;

    /// Move the centroid to the center of `members` (never empty).
    fn recompute(&mut self, members: &[&O]);
}

/// Centroid of real-valued observations: their arithmetic mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarCentroid(pub f64);

impl Centroid<f64> for ScalarCentroid {
    fn from_observation(observation: &f64) -> Self {
        Self(*observation)
    }

    fn distance(&self, observation: &f64) -> f64 {
        (self.0 - observation).abs()
    }

    fn recompute(&mut self, members: &[&f64]) {
        self.0 = members.iter().copied().sum::<f64>() / members.len() as f64;
    }
}

/// Configuration for k-means clustering.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KMeansConfig {
    /// Maximum number of Lloyd iterations (at least one is always run).
    pub max_iter: usize,
    /// Seed of the k-means++ initialization.
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            seed: 42,
        }
    }
}

/// Cluster `observations` into `k` groups.
///
/// Uses k-means++ seeding and Lloyd's algorithm; stops when no label changes.
/// Returns the cluster label of every observation.
///
/// # Errors
///
/// Returns an error if `k` is zero or exceeds the number of observations.
pub fn kmeans<O, C: Centroid<O>>(
    observations: &[&O],
    k: usize,
    config: &KMeansConfig,
) -> Result<Vec<usize>> {
    let n = observations.len();
    if k == 0 {
        return Err(MarkovaError::InvalidInput("n_clusters must be > 0".into()));
    }
    if k > n {
        return Err(MarkovaError::InvalidInput(format!(
            "n_clusters ({k}) > n_observations ({n})"
        )));
    }

    // k-means++ init
    let mut rng = Xorshift64(config.seed.max(1));
    let mut centroids = Vec::with_capacity(k);
    centroids.push(C::from_observation(
        observations[rng.next_bounded(n as u64) as usize],
    ));
    while centroids.len() < k {
        let dists: Vec<f64> = observations
            .iter()
            .map(|o| {
                centroids
                    .iter()
                    .map(|c| c.distance(*o).powi(2))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = dists.iter().sum();
        let chosen = if total == 0.0 {
            // All points identical; just pick next point
            centroids.len() % n
        } else {
            let threshold = rng.next_f64() * total;
            let mut cumulative = 0.0;
            let mut chosen = n - 1;
            for (i, &d) in dists.iter().enumerate() {
                cumulative += d;
                if cumulative >= threshold {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        centroids.push(C::from_observation(observations[chosen]));
    }

    // Lloyd's iterations
    let mut labels = vec![usize::MAX; n];
    for _iter in 0..config.max_iter.max(1) {
        let mut changed = false;
        for (i, o) in observations.iter().enumerate() {
            let best = nearest(&centroids, *o);
            if labels[i] != best {
                labels[i] = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&O> = observations
                .iter()
                .zip(&labels)
                .filter(|(_, &l)| l == c)
                .map(|(&o, _)| o)
                .collect();
            // Empty cluster: keep old centroid
            if !members.is_empty() {
                centroid.recompute(&members);
            }
        }
    }

    Ok(labels)
}

/// Build an initial HMM with `n_states` states from a training corpus.
///
/// Observations are clustered with [`kmeans`]; state `i` gets a copy of
/// `prototype` fitted with equal weights to cluster `i`. A state whose cluster
/// ends up empty keeps the unfitted prototype.
///
/// # Errors
///
/// Returns an error if `n_states` is zero or exceeds the number of
/// observations, or if fitting an emission distribution fails.
pub fn initial_hmm<D, C, S>(
    n_states: usize,
    sequences: &[S],
    prototype: &D,
    config: &KMeansConfig,
) -> Result<Hmm<D>>
where
    D: Opdf,
    C: Centroid<D::Observation>,
    S: AsRef<[D::Observation]>,
{
    let observations = flatten(sequences);
    let labels = kmeans::<_, C>(&observations, n_states, config)?;

    let opdfs = (0..n_states)
        .map(|state| {
            let members: Vec<&D::Observation> = observations
                .iter()
                .zip(&labels)
                .filter(|(_, &l)| l == state)
                .map(|(&o, _)| o)
                .collect();
            let mut opdf = prototype.clone();
            if !members.is_empty() {
                let weights = vec![1.0 / members.len() as f64; members.len()];
                opdf.fit(&members, &weights)?;
            }
            Ok(opdf)
        })
        .collect::<Result<Vec<D>>>()?;

    Hmm::uniform(opdfs)
}

fn nearest<O, C: Centroid<O>>(centroids: &[C], observation: &O) -> usize {
    let mut best_dist = f64::INFINITY;
    let mut best_c = 0;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = centroid.distance(observation);
        if d < best_dist {
            best_dist = d;
            best_c = c;
        }
    }
    best_c
}

/// Minimal xorshift64 PRNG.
struct Xorshift64(u64);

impl Xorshift64 {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn next_bounded(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / ((1u64 << 53) as f64)
    }
}
