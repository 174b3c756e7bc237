//! Sparse neighbor graph over a point cloud
//!
//! Every star links to its nearest neighbor. The next `k - 1` candidates are
//! kept at random: the draw comes from `Beta(rank + 1, rank_beta)`, so lower
//! ranked candidates draw larger values, and must fall under a threshold that
//! shrinks as the candidate gets farther away than the nearest neighbor.

use rand::Rng;
use rand_distr::{Beta, Distribution};
use tracing::info;

use crate::config::NeighborConfig;
use crate::error::ConfigError;
use crate::graph::Galaxy;
use crate::spatial::{KdTree, Neighbor};
use crate::vector::Vec3;

/// Distances below this are treated as coincident when scaling thresholds
const MIN_DISTANCE: f64 = 1e-6;

/// Builds a thinned k-nearest-neighbor graph
#[derive(Debug, Clone)]
pub struct NeighborGraphBuilder {
    config: NeighborConfig,
    /// Retention draw for each candidate rank, index 0 unused (always kept)
    rank_draws: Vec<Beta<f64>>,
}

impl NeighborGraphBuilder {
    pub fn new(config: &NeighborConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rank_draws = (0..config.neighbor_k)
            .map(|rank| {
                Beta::new(rank as f64 + 1.0, config.rank_beta)
                    .map_err(|_| ConfigError::invalid("rank_beta", "must be positive", config.rank_beta))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            config: config.clone(),
            rank_draws,
        })
    }

    /// Connect the given stars
    ///
    /// Stars are visited in id order and candidates in distance order, so the
    /// result depends only on the positions and the RNG state.
    pub fn build<R: Rng + ?Sized>(&self, positions: Vec<Vec3>, rng: &mut R) -> Galaxy {
        let tree = KdTree::new(&positions);
        let k = self.config.neighbor_k.min(positions.len().saturating_sub(1));
        let mut galaxy = Galaxy::from_positions(positions);

        for v in 0..galaxy.len() {
            let position = galaxy.star(v).position;
            let candidates: Vec<Neighbor> = tree
                .nearest(position, k, self.config.neighbor_eps, Some(v))
                .into_iter()
                .filter(|n| n.distance.is_finite())
                .collect();

            let Some(nearest) = candidates.first() else {
                continue;
            };
            galaxy.connect(v, nearest.index);

            let scale = nearest.distance.max(MIN_DISTANCE);
            for (rank, candidate) in candidates.iter().enumerate().skip(1) {
                let draw = self.rank_draws[rank].sample(rng);
                if draw < self.threshold(candidate.distance, scale) {
                    galaxy.connect(v, candidate.index);
                }
            }
        }

        info!(
            stars = galaxy.len(),
            edges = galaxy.edge_count(),
            "built neighbor graph"
        );
        galaxy
    }

    /// Acceptance threshold for a candidate at `distance`
    ///
    /// Equals `retention_threshold` at the nearest neighbor's distance and
    /// decays as a power of the distance ratio beyond it.
    pub fn threshold(&self, distance: f64, nearest: f64) -> f64 {
        let ratio = (distance / nearest.max(MIN_DISTANCE)).max(1.0);
        self.config.retention_threshold * ratio.powf(-self.config.distance_falloff)
    }
}
