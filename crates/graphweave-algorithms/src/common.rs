//! Shared utilities for clustering and layout algorithms
//!
//! Provides a read-only, dense view of an undirected weighted graph plus the
//! small amount of 3D vector math the algorithms need.

/// A point in 3D space
pub type Point3 = [f64; 3];

/// The origin
pub const ORIGIN: Point3 = [0.0, 0.0, 0.0];

/// Squared Euclidean distance between two points
#[inline]
pub fn distance_squared(a: &Point3, b: &Point3) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Euclidean distance between two points
#[inline]
pub fn distance(a: &Point3, b: &Point3) -> f64 {
    distance_squared(a, b).sqrt()
}

/// Mean of a set of points. Returns the origin for an empty set.
pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Point3 {
    let mut sum = ORIGIN;
    let mut count = 0usize;
    for p in points {
        sum[0] += p[0];
        sum[1] += p[1];
        sum[2] += p[2];
        count += 1;
    }
    if count == 0 {
        return ORIGIN;
    }
    let n = count as f64;
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

/// True when every coordinate is a finite number
#[inline]
pub fn is_finite(p: &Point3) -> bool {
    p.iter().all(|c| c.is_finite())
}

/// A dense, integer-indexed, undirected view of the graph topology using
/// Compressed Sparse Row (CSR) format.
///
/// Every undirected edge `(u, v, w)` is stored twice, once in each endpoint's
/// row, so `neighbors(u)` and `neighbors(v)` both see it.
#[derive(Debug, Clone)]
pub struct GraphView {
    /// Number of nodes
    pub node_count: usize,
    /// Offsets into `targets`. Size = node_count + 1
    pub offsets: Vec<usize>,
    /// Contiguous array of neighbor indices
    pub targets: Vec<usize>,
    /// Edge weights aligned with `targets`
    pub weights: Vec<f64>,
}

impl GraphView {
    /// Build a view from an undirected edge list.
    ///
    /// Self-loops and edges with an out-of-range endpoint are skipped.
    pub fn from_edges(node_count: usize, edges: &[(usize, usize, f64)]) -> Self {
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); node_count];
        for &(u, v, w) in edges {
            if u == v || u >= node_count || v >= node_count {
                continue;
            }
            rows[u].push((v, w));
            rows[v].push((u, w));
        }

        let mut offsets = Vec::with_capacity(node_count + 1);
        let mut targets = Vec::new();
        let mut weights = Vec::new();

        offsets.push(0);
        for row in rows {
            for (v, w) in row {
                targets.push(v);
                weights.push(w);
            }
            offsets.push(targets.len());
        }

        Self {
            node_count,
            offsets,
            targets,
            weights,
        }
    }

    /// Degree of a node (by index)
    pub fn degree(&self, idx: usize) -> usize {
        self.offsets[idx + 1] - self.offsets[idx]
    }

    /// Neighbors of a node
    pub fn neighbors(&self, idx: usize) -> &[usize] {
        &self.targets[self.offsets[idx]..self.offsets[idx + 1]]
    }

    /// Weights aligned with `neighbors(idx)`
    pub fn neighbor_weights(&self, idx: usize) -> &[f64] {
        &self.weights[self.offsets[idx]..self.offsets[idx + 1]]
    }

    /// Number of stored undirected edges
    pub fn edge_count(&self) -> usize {
        self.targets.len() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_view_projection() {
        // 0 - 1 - 2, plus a self loop and an out-of-range edge that are ignored
        let edges = vec![(0, 1, 0.5), (1, 2, 0.9), (2, 2, 1.0), (0, 7, 1.0)];
        let view = GraphView::from_edges(3, &edges);

        assert_eq!(view.node_count, 3);
        assert_eq!(view.edge_count(), 2);
        assert_eq!(view.degree(1), 2);
        assert!(view.neighbors(0).contains(&1));
        assert!(view.neighbors(2).contains(&1));
        assert_eq!(view.neighbor_weights(0), &[0.5]);
    }

    #[test]
    fn test_centroid_and_distance() {
        let pts = [[0.0, 0.0, 0.0], [2.0, 4.0, 6.0]];
        assert_eq!(centroid(pts.iter()), [1.0, 2.0, 3.0]);
        assert_eq!(centroid(std::iter::empty()), ORIGIN);
        assert!((distance(&[0.0, 0.0, 0.0], &[3.0, 4.0, 0.0]) - 5.0).abs() < 1e-12);
        assert!(!is_finite(&[f64::NAN, 0.0, 0.0]));
    }
}
