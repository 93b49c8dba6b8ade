//! 3D layout algorithms
//!
//! - Force-directed: fixed-iteration Euler integration of all-pairs repulsion
//!   and edge attraction. Not a converging physics solver.
//! - Concentric levels: one ring per level, rings stacked along the y axis.
//! - Circular: a single ring in the y = 0 plane.

use super::common::{GraphView, Point3};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::f64::consts::PI;

/// Force-directed layout parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ForceLayoutConfig {
    /// Number of Euler steps
    pub iterations: usize,
    /// Initial positions are drawn uniformly from `[-bound, bound]` on each axis
    pub bound: f64,
    /// Repulsion constant: force = repulsion / distance²
    pub repulsion: f64,
    /// Attraction constant: force = distance * weight * attraction
    pub attraction: f64,
    /// Step size applied to the net force
    pub damping: f64,
    /// Seed for the initial placement
    pub seed: u64,
}

impl Default for ForceLayoutConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            bound: 500.0,
            repulsion: 10_000.0,
            attraction: 0.1,
            damping: 0.1,
            seed: 42,
        }
    }
}

/// Force-directed layout.
///
/// Each iteration first computes every node's net force against a frozen
/// snapshot of the positions, then applies all updates. Force computation is
/// parallel; the result does not depend on scheduling.
pub fn force_directed(view: &GraphView, config: &ForceLayoutConfig) -> Vec<Point3> {
    let n = view.node_count;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let bound = config.bound.abs().max(f64::EPSILON);
    let mut positions: Vec<Point3> = (0..n)
        .map(|_| {
            [
                rng.gen_range(-bound..=bound),
                rng.gen_range(-bound..=bound),
                rng.gen_range(-bound..=bound),
            ]
        })
        .collect();

    for _ in 0..config.iterations {
        let snapshot = &positions;
        let forces: Vec<Point3> = (0..n)
            .into_par_iter()
            .map(|i| net_force(i, snapshot, view, config))
            .collect();

        for (p, f) in positions.iter_mut().zip(forces) {
            p[0] += f[0] * config.damping;
            p[1] += f[1] * config.damping;
            p[2] += f[2] * config.damping;
        }
    }

    positions
}

fn net_force(i: usize, positions: &[Point3], view: &GraphView, config: &ForceLayoutConfig) -> Point3 {
    let pi = positions[i];
    let mut force = [0.0f64; 3];

    // Repulsion from every other node
    for (j, pj) in positions.iter().enumerate() {
        if j == i {
            continue;
        }
        let delta = [pi[0] - pj[0], pi[1] - pj[1], pi[2] - pj[2]];
        let dist = (delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]).sqrt();
        let floored = dist.max(1.0);
        let magnitude = config.repulsion / (floored * floored);
        let direction = if dist > 0.0 {
            [delta[0] / dist, delta[1] / dist, delta[2] / dist]
        } else {
            // Coincident nodes: push apart along x, lower index to the left
            [if i < j { -1.0 } else { 1.0 }, 0.0, 0.0]
        };
        force[0] += direction[0] * magnitude;
        force[1] += direction[1] * magnitude;
        force[2] += direction[2] * magnitude;
    }

    // Attraction along incident edges
    for (&j, &w) in view.neighbors(i).iter().zip(view.neighbor_weights(i)) {
        let pj = positions[j];
        force[0] += (pj[0] - pi[0]) * w * config.attraction;
        force[1] += (pj[1] - pi[1]) * w * config.attraction;
        force[2] += (pj[2] - pi[2]) * w * config.attraction;
    }

    force
}

/// Concentric ring layout.
///
/// Nodes on level `l` are spread evenly over a ring of radius
/// `base_radius + l * ring_spacing` at height `y = l * level_height`, in
/// input order.
pub fn concentric_levels(
    levels: &[usize],
    base_radius: f64,
    ring_spacing: f64,
    level_height: f64,
) -> Vec<Point3> {
    let max_level = levels.iter().copied().max().unwrap_or(0);
    let mut counts = vec![0usize; max_level + 1];
    for &l in levels {
        counts[l] += 1;
    }

    let mut seen = vec![0usize; max_level + 1];
    levels
        .iter()
        .map(|&level| {
            let index = seen[level];
            seen[level] += 1;
            let angle = index as f64 / counts[level] as f64 * 2.0 * PI;
            let radius = base_radius + level as f64 * ring_spacing;
            [
                radius * angle.cos(),
                level as f64 * level_height,
                radius * angle.sin(),
            ]
        })
        .collect()
}

/// Single ring of radius `radius` in the y = 0 plane
pub fn circular(node_count: usize, radius: f64) -> Vec<Point3> {
    (0..node_count)
        .map(|i| {
            let angle = i as f64 / node_count as f64 * 2.0 * PI;
            [radius * angle.cos(), 0.0, radius * angle.sin()]
        })
        .collect()
}
