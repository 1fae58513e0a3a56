//! Weighted k-means over candidate centers.
//!
//! Exactly three clusters are expected, one per finder pattern. A
//! single k-means run is sensitive to its random initialization, so the
//! routine restarts from fresh random seeds and keeps the try with the
//! lowest weighted within-cluster cost.

use log::debug;
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::error::LocateError;

/// A QR symbol carries three finder patterns.
pub const NUM_FINDER_PATTERNS: usize = 3;

/// Centroids closer than this (squared) between iterations count as
/// converged.
const CONVERGENCE_EPS_SQ: f64 = 1e-8;

/// Clustering settings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Iteration cap per try.
    pub max_iterations: usize,
    /// Independent restarts; the best try wins. 15+ makes missing the
    /// correct three-way split improbable.
    pub max_tries: usize,
    /// Seed for the restart RNG. Equal seeds reproduce runs exactly.
    pub seed: u64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            max_tries: 16,
            seed: 0,
        }
    }
}

impl ClusterParams {
    /// Default settings with a seed drawn from system entropy.
    pub fn randomized() -> Self {
        Self {
            seed: rand::random(),
            ..Self::default()
        }
    }
}

/// Weighted summary of one cluster.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Centroid {
    /// Weight-weighted average position of the members.
    pub position: Point2<f64>,
    pub total_weight: f64,
    /// Weight-weighted average matched window lengths.
    pub avg_width: f64,
    pub avg_height: f64,
}

impl Centroid {
    fn seeded_at(candidate: &Candidate) -> Self {
        Self {
            position: candidate.position,
            total_weight: 0.0,
            avg_width: candidate.matched_width,
            avg_height: candidate.matched_height,
        }
    }
}

/// Best-of-N clustering outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Clustering {
    pub centroids: [Centroid; NUM_FINDER_PATTERNS],
    /// Winning cluster index per input candidate.
    pub assignments: Vec<usize>,
    /// Total weighted within-cluster squared distance of the best try.
    pub cost: f64,
}

/// Partition candidates into [`NUM_FINDER_PATTERNS`] weighted clusters.
///
/// Passing fewer candidates than clusters is a caller bug and fails
/// loudly instead of fabricating geometry.
pub fn cluster_candidates(
    candidates: &[Candidate],
    params: &ClusterParams,
) -> Result<Clustering, LocateError> {
    let k = NUM_FINDER_PATTERNS;
    if candidates.len() < k {
        return Err(LocateError::NotEnoughForClustering {
            needed: k,
            got: candidates.len(),
        });
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut indices: Vec<usize> = (0..candidates.len()).collect();

    indices.shuffle(&mut rng);
    let mut best = run_single_try(candidates, &indices[..k], params.max_iterations);
    debug!("clustering try 0: cost {:.3}", best.cost);

    for try_index in 1..params.max_tries.max(1) {
        indices.shuffle(&mut rng);
        let result = run_single_try(candidates, &indices[..k], params.max_iterations);

        debug!("clustering try {try_index}: cost {:.3}", result.cost);
        if result.cost < best.cost {
            best = result;
        }
    }

    Ok(best)
}

fn run_single_try(
    candidates: &[Candidate],
    seed_indices: &[usize],
    max_iterations: usize,
) -> Clustering {
    let mut centroids = [
        Centroid::seeded_at(&candidates[seed_indices[0]]),
        Centroid::seeded_at(&candidates[seed_indices[1]]),
        Centroid::seeded_at(&candidates[seed_indices[2]]),
    ];
    let mut assignments = vec![0usize; candidates.len()];

    for _ in 0..max_iterations {
        // Assignment step: nearest centroid by squared distance.
        let mut changed = false;
        for (i, candidate) in candidates.iter().enumerate() {
            let nearest = nearest_centroid(&centroids, candidate.position);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        // Update step: weighted means; empty clusters keep their
        // previous centroid so no candidate is ever lost to a crash.
        let mut sum_pos = [[0.0f64; 2]; NUM_FINDER_PATTERNS];
        let mut sum_width = [0.0f64; NUM_FINDER_PATTERNS];
        let mut sum_height = [0.0f64; NUM_FINDER_PATTERNS];
        let mut sum_weight = [0.0f64; NUM_FINDER_PATTERNS];

        for (candidate, &cluster) in candidates.iter().zip(assignments.iter()) {
            let w = candidate.weight;
            sum_pos[cluster][0] += w * candidate.position.x;
            sum_pos[cluster][1] += w * candidate.position.y;
            sum_width[cluster] += w * candidate.matched_width;
            sum_height[cluster] += w * candidate.matched_height;
            sum_weight[cluster] += w;
        }

        let mut max_movement = 0.0f64;
        for (c, centroid) in centroids.iter_mut().enumerate() {
            if sum_weight[c] <= 0.0 {
                continue;
            }
            let next = Point2::new(
                sum_pos[c][0] / sum_weight[c],
                sum_pos[c][1] / sum_weight[c],
            );
            max_movement = max_movement.max((next - centroid.position).norm_squared());
            centroid.position = next;
            centroid.total_weight = sum_weight[c];
            centroid.avg_width = sum_width[c] / sum_weight[c];
            centroid.avg_height = sum_height[c] / sum_weight[c];
        }

        if !changed || max_movement < CONVERGENCE_EPS_SQ {
            break;
        }
    }

    let cost = candidates
        .iter()
        .zip(assignments.iter())
        .map(|(candidate, &cluster)| {
            candidate.weight * (candidate.position - centroids[cluster].position).norm_squared()
        })
        .sum();

    Clustering {
        centroids,
        assignments,
        cost,
    }
}

fn nearest_centroid(centroids: &[Centroid; NUM_FINDER_PATTERNS], p: Point2<f64>) -> usize {
    let mut best = 0usize;
    let mut best_d2 = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d2 = (p - centroid.position).norm_squared();
        if d2 < best_d2 {
            best_d2 = d2;
            best = c;
        }
    }
    best
}
