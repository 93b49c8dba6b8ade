//! K-means clustering over 3D points
//!
//! Lloyd iterations with k-means++ seeding. Seeding draws from a seeded RNG so
//! the same input always produces the same clustering.

use super::common::{distance_squared, Point3};
use rand::prelude::*;
use rand::rngs::StdRng;

/// K-means parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KMeansConfig {
    /// Requested number of clusters (clamped to the number of points)
    pub k: usize,
    /// Iteration cap
    pub max_iterations: usize,
    /// Seed for k-means++ sampling
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 8,
            max_iterations: 50,
            seed: 42,
        }
    }
}

/// Result of a k-means run
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster index per input point
    pub assignments: Vec<usize>,
    /// Final centroids, indexed by cluster
    pub centroids: Vec<Point3>,
    /// Iterations executed
    pub iterations: usize,
    /// Whether assignments stopped changing before the cap
    pub converged: bool,
}

impl KMeansResult {
    /// Member indices grouped by cluster, in cluster order
    pub fn groups(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.centroids.len()];
        for (i, &c) in self.assignments.iter().enumerate() {
            groups[c].push(i);
        }
        groups
    }
}

/// Run k-means on `points`.
///
/// Returns an empty result for empty input. The effective `k` is
/// `min(config.k, points.len())` and at least one.
pub fn kmeans(points: &[Point3], config: &KMeansConfig) -> KMeansResult {
    let n = points.len();
    if n == 0 {
        return KMeansResult {
            assignments: Vec::new(),
            centroids: Vec::new(),
            iterations: 0,
            converged: true,
        };
    }

    let k = config.k.clamp(1, n);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut centroids = kmeans_plus_plus_init(points, k, &mut rng);

    let mut assignments = vec![usize::MAX; n];
    let mut iterations = 0;
    let mut converged = false;

    for iter in 0..config.max_iterations.max(1) {
        iterations = iter + 1;

        // Assignment step
        let next = assign(points, &centroids);
        if next == assignments {
            converged = true;
            break;
        }
        assignments = next;

        // Update step
        centroids = compute_centroids(points, &assignments, &centroids);
    }

    KMeansResult {
        assignments,
        centroids,
        iterations,
        converged,
    }
}

fn assign(points: &[Point3], centroids: &[Point3]) -> Vec<usize> {
    points
        .iter()
        .map(|p| {
            let mut best = 0;
            let mut best_dist = f64::MAX;
            for (j, c) in centroids.iter().enumerate() {
                let d = distance_squared(p, c);
                if d < best_dist {
                    best_dist = d;
                    best = j;
                }
            }
            best
        })
        .collect()
}

/// Mean of the points assigned to each cluster. A cluster that lost all of
/// its members keeps its previous centroid.
fn compute_centroids(points: &[Point3], assignments: &[usize], previous: &[Point3]) -> Vec<Point3> {
    let k = previous.len();
    let mut sums = vec![[0.0f64; 3]; k];
    let mut counts = vec![0usize; k];

    for (p, &c) in points.iter().zip(assignments) {
        counts[c] += 1;
        for d in 0..3 {
            sums[c][d] += p[d];
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, count), prev)| {
            if count == 0 {
                *prev
            } else {
                let n = count as f64;
                [sum[0] / n, sum[1] / n, sum[2] / n]
            }
        })
        .collect()
}

/// K-means++ seeding: each subsequent centroid is sampled with probability
/// proportional to its squared distance from the nearest chosen centroid.
///
/// May return fewer than `k` centroids when the input has fewer distinct
/// points than `k`.
fn kmeans_plus_plus_init(points: &[Point3], k: usize, rng: &mut StdRng) -> Vec<Point3> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..n)]);

    let mut min_distances = vec![f64::MAX; n];

    while centroids.len() < k {
        let last = centroids[centroids.len() - 1];
        for (i, p) in points.iter().enumerate() {
            let d = distance_squared(p, &last);
            if d < min_distances[i] {
                min_distances[i] = d;
            }
        }

        let total: f64 = min_distances.iter().sum();
        if total <= 0.0 {
            // Every point coincides with a centroid already
            break;
        }

        let mut target = rng.gen::<f64>() * total;
        let mut chosen = n - 1;
        for (i, &d) in min_distances.iter().enumerate() {
            if d <= 0.0 {
                continue;
            }
            if target < d {
                chosen = i;
                break;
            }
            target -= d;
        }
        // Floating point leftovers can land on an already chosen point
        if min_distances[chosen] <= 0.0 {
            match min_distances.iter().position(|&d| d > 0.0) {
                Some(i) => chosen = i,
                None => break,
            }
        }
        centroids.push(points[chosen]);
    }

    centroids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Point3> {
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [100.0, 100.0, 100.0],
            [101.0, 100.0, 100.0],
            [100.0, 101.0, 100.0],
        ]
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let points = two_blobs();
        let result = kmeans(&points, &KMeansConfig { k: 2, ..Default::default() });

        assert_eq!(result.centroids.len(), 2);
        assert!(result.converged);
        assert_eq!(result.assignments[0], result.assignments[1]);
        assert_eq!(result.assignments[0], result.assignments[2]);
        assert_eq!(result.assignments[3], result.assignments[4]);
        assert_ne!(result.assignments[0], result.assignments[3]);
    }

    #[test]
    fn test_kmeans_is_deterministic_for_seed() {
        let points = two_blobs();
        let config = KMeansConfig { k: 3, max_iterations: 50, seed: 7 };
        let a = kmeans(&points, &config);
        let b = kmeans(&points, &config);
        assert_eq!(a.assignments, b.assignments);
    }

    #[test]
    fn test_kmeans_k_larger_than_points() {
        let points = vec![[0.0, 0.0, 0.0], [5.0, 5.0, 5.0]];
        let result = kmeans(&points, &KMeansConfig { k: 10, ..Default::default() });
        assert_eq!(result.centroids.len(), 2);
        assert_ne!(result.assignments[0], result.assignments[1]);
    }

    #[test]
    fn test_kmeans_identical_points() {
        let points = vec![[1.0, 1.0, 1.0]; 5];
        let result = kmeans(&points, &KMeansConfig { k: 3, ..Default::default() });
        assert_eq!(result.centroids.len(), 1);
        assert!(result.assignments.iter().all(|&a| a == 0));
        assert_eq!(result.groups(), vec![vec![0, 1, 2, 3, 4]]);
    }

    #[test]
    fn test_kmeans_empty() {
        let result = kmeans(&[], &KMeansConfig::default());
        assert!(result.assignments.is_empty());
        assert!(result.centroids.is_empty());
    }
}
