//! Layout stage: assigns every node a 3D position

use super::build_view;
use crate::config::{LayoutConfig, LayoutMethod};
use crate::graph::{Edge, Node, Vec3};
use graphweave_algorithms::{circular, concentric_levels, force_directed, Point3};
use tracing::{debug, warn};

/// Positions nodes with one of the layout methods
#[derive(Debug, Clone, Default)]
pub struct LayoutStage {
    config: LayoutConfig,
}

impl LayoutStage {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    /// Position `nodes` in place. Returns the number of non-finite
    /// coordinates that were reset to the origin.
    pub fn apply(&self, nodes: &mut [Node], edges: &[Edge], method: LayoutMethod) -> usize {
        if nodes.is_empty() {
            return 0;
        }
        let method = method.resolve();
        let points = match method {
            LayoutMethod::ForceDirected => {
                let indexed = build_view(nodes, edges);
                force_directed(&indexed.view, &self.config.force)
            }
            LayoutMethod::Hierarchical | LayoutMethod::Tree => {
                let levels: Vec<usize> = nodes.iter().map(|n| n.node_type.layout_level()).collect();
                concentric_levels(
                    &levels,
                    self.config.base_radius,
                    self.config.ring_spacing,
                    self.config.level_height,
                )
            }
            LayoutMethod::Circular => circular(nodes.len(), self.config.circular_radius),
        };
        debug!("Laid out {} nodes with {:?}", nodes.len(), method);
        assign_positions(nodes, &points)
    }
}

/// Copy `points` onto `nodes`, replacing non-finite positions with the
/// origin. Returns how many were replaced.
pub fn assign_positions(nodes: &mut [Node], points: &[Point3]) -> usize {
    let mut reset = 0;
    for (node, point) in nodes.iter_mut().zip(points) {
        let position = Vec3::from(*point);
        if position.is_finite() {
            node.position = position;
        } else {
            warn!("Node {} got a non-finite position {:?}, using origin", node.id, point);
            node.position = Vec3::ORIGIN;
            reset += 1;
        }
    }
    reset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeType, NodeMetadata, NodeProperties, NodeType};
    use chrono::Utc;

    fn node(id: &str, node_type: NodeType) -> Node {
        let now = Utc::now();
        Node::new(id, id, node_type, NodeProperties::Other, NodeMetadata::new(now, now, 0.5, 0))
    }

    fn sample() -> Vec<Node> {
        vec![
            node("d1", NodeType::Document),
            node("d2", NodeType::Document),
            node("i1", NodeType::Insight),
            node("t1", NodeType::Tag),
        ]
    }

    #[test]
    fn test_hierarchical_levels() {
        let mut nodes = sample();
        LayoutStage::default().apply(&mut nodes, &[], LayoutMethod::Hierarchical);
        assert!((nodes[0].position.x - 200.0).abs() < 1e-9);
        assert_eq!(nodes[0].position.y, 0.0);
        assert!((nodes[1].position.x + 200.0).abs() < 1e-9);
        assert!((nodes[2].position.x - 350.0).abs() < 1e-9);
        assert_eq!(nodes[2].position.y, 200.0);
        assert!((nodes[3].position.x - 500.0).abs() < 1e-9);
        assert_eq!(nodes[3].position.y, 400.0);
    }

    #[test]
    fn test_tree_matches_hierarchical() {
        let mut a = sample();
        let mut b = sample();
        LayoutStage::default().apply(&mut a, &[], LayoutMethod::Tree);
        LayoutStage::default().apply(&mut b, &[], LayoutMethod::Hierarchical);
        let pa: Vec<Vec3> = a.iter().map(|n| n.position).collect();
        let pb: Vec<Vec3> = b.iter().map(|n| n.position).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_circular() {
        let mut nodes = sample();
        LayoutStage::default().apply(&mut nodes, &[], LayoutMethod::Circular);
        for n in &nodes {
            assert!((n.position.distance(&Vec3::ORIGIN) - 300.0).abs() < 1e-9);
            assert_eq!(n.position.y, 0.0);
        }
    }

    #[test]
    fn test_force_directed_is_finite_and_deterministic() {
        let mut a = sample();
        let mut b = sample();
        let edges = vec![Edge::new("d1".into(), "d2".into(), EdgeType::Similarity, 0.8)];
        let stage = LayoutStage::default();
        assert_eq!(stage.apply(&mut a, &edges, LayoutMethod::ForceDirected), 0);
        stage.apply(&mut b, &edges, LayoutMethod::ForceDirected);
        assert!(a.iter().all(|n| n.position.is_finite()));
        assert_eq!(a[0].position, b[0].position);
    }

    #[test]
    fn test_non_finite_positions_reset() {
        let mut nodes = sample();
        let points = vec![[f64::NAN, 0.0, 0.0], [1.0, 2.0, 3.0], [0.0, f64::INFINITY, 0.0], [0.0; 3]];
        assert_eq!(assign_positions(&mut nodes, &points), 2);
        assert_eq!(nodes[0].position, Vec3::ORIGIN);
        assert_eq!(nodes[1].position, Vec3::new(1.0, 2.0, 3.0));
    }
}
