//! Clustering and layout stages
//!
//! The numeric work lives in the `graphweave-algorithms` crate, which only
//! knows dense integer indices. This module provides the adapter layer that
//! projects nodes and edges onto a `GraphView` and maps results back.

pub mod clustering;
pub mod layout;

pub use clustering::ClusteringStage;
pub use layout::LayoutStage;

use crate::graph::{Edge, Node, NodeId};
use graphweave_algorithms::{GraphView, Point3};
use rustc_hash::FxHashMap;

/// A `GraphView` over a node slice, indexed in slice order
#[derive(Debug, Clone)]
pub struct IndexedView<'a> {
    pub index: FxHashMap<&'a NodeId, usize>,
    pub view: GraphView,
}

/// Project `nodes`/`edges` onto a view weighted by edge weight. Edges whose
/// endpoints are not in `nodes` are skipped.
pub fn build_view<'a>(nodes: &'a [Node], edges: &[Edge]) -> IndexedView<'a> {
    build_view_with(nodes, edges, |edge, _, _| edge.weight)
}

/// Like `build_view`, with the view weight computed from the edge and its
/// two endpoint nodes
pub fn build_view_with<'a, F>(nodes: &'a [Node], edges: &[Edge], weight: F) -> IndexedView<'a>
where
    F: Fn(&Edge, &Node, &Node) -> f64,
{
    let index: FxHashMap<&NodeId, usize> = nodes.iter().enumerate().map(|(i, n)| (&n.id, i)).collect();
    let triples: Vec<(usize, usize, f64)> = edges
        .iter()
        .filter_map(|edge| {
            let u = *index.get(&edge.source)?;
            let v = *index.get(&edge.target)?;
            Some((u, v, weight(edge, &nodes[u], &nodes[v])))
        })
        .collect();
    let view = GraphView::from_edges(nodes.len(), &triples);
    IndexedView { index, view }
}

/// Current node positions in slice order
pub fn positions(nodes: &[Node]) -> Vec<Point3> {
    nodes.iter().map(|n| n.position.to_point()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeType, NodeMetadata, NodeProperties, NodeType};
    use chrono::Utc;

    fn node(id: &str) -> Node {
        let now = Utc::now();
        Node::new(id, id, NodeType::Concept, NodeProperties::Other, NodeMetadata::new(now, now, 0.5, 0))
    }

    #[test]
    fn test_build_view_skips_unknown_endpoints() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![
            Edge::new("a".into(), "b".into(), EdgeType::Similarity, 0.4),
            Edge::new("b".into(), "ghost".into(), EdgeType::Similarity, 0.9),
        ];
        let indexed = build_view(&nodes, &edges);
        assert_eq!(indexed.view.edge_count(), 1);
        assert_eq!(indexed.index[&NodeId::new("c")], 2);
        assert_eq!(indexed.view.neighbor_weights(0), &[0.4]);

        let doubled = build_view_with(&nodes, &edges, |e, _, _| e.weight * 2.0);
        assert_eq!(doubled.view.neighbor_weights(1), &[0.8]);
    }
}
