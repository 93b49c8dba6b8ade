//! The built graph snapshot
//!
//! A `Graph` is produced once per build and never mutated afterwards; the
//! orchestrator shares it behind an `Arc`.

use super::cluster::Cluster;
use super::edge::Edge;
use super::node::Node;
use super::types::{EdgeId, NodeId};
use chrono::{SecondsFormat, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::warn;

/// Structural violations found by `Graph::validate`
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Node {0} appears more than once")]
    DuplicateNode(NodeId),

    #[error("Edge {edge} references missing node {node}")]
    DanglingEdge { edge: EdgeId, node: NodeId },

    #[error("{field} of {id} is {value}, outside [0, 1]")]
    OutOfRange {
        id: String,
        field: &'static str,
        value: f64,
    },
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Summary stored alongside the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetadata {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub cluster_names: Vec<String>,
    /// ISO-8601 build time
    pub last_update: String,
    pub version: u64,
}

/// Node, edge and cluster counts by kind
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStatistics {
    pub nodes_by_type: BTreeMap<String, usize>,
    pub edges_by_type: BTreeMap<String, usize>,
    pub cluster_count: usize,
    pub avg_degree: f64,
    pub isolated_nodes: usize,
}

/// A positioned, clustered graph ready for rendering or export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<Cluster>,
    pub metadata: GraphMetadata,
}

impl Graph {
    /// Assemble a graph, stamping metadata with the current time
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>, clusters: Vec<Cluster>, version: u64) -> Self {
        let metadata = GraphMetadata {
            total_nodes: nodes.len(),
            total_edges: edges.len(),
            cluster_names: clusters.iter().map(|c| c.name.clone()).collect(),
            last_update: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            version,
        };
        Graph {
            nodes,
            edges,
            clusters,
            metadata,
        }
    }

    /// A graph with no nodes
    pub fn empty(version: u64) -> Self {
        Graph::new(Vec::new(), Vec::new(), Vec::new(), version)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Look up a node by id
    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Edges touching `id`
    pub fn edges_of<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.touches(id))
    }

    /// Check the structural invariants: unique node ids, edges between
    /// existing nodes, unit-range strength/weight/confidence.
    pub fn validate(&self) -> GraphResult<()> {
        let mut ids = FxHashSet::default();
        for node in &self.nodes {
            if !ids.insert(&node.id) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
            check_unit(node.id.as_str(), "strength", node.metadata.strength)?;
        }
        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !ids.contains(endpoint) {
                    return Err(GraphError::DanglingEdge {
                        edge: edge.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
            check_unit(edge.id.as_str(), "weight", edge.weight)?;
            check_unit(edge.id.as_str(), "confidence", edge.metadata.confidence)?;
        }
        Ok(())
    }

    /// Counts by kind and degree summary
    pub fn statistics(&self) -> GraphStatistics {
        let mut stats = GraphStatistics {
            cluster_count: self.clusters.len(),
            ..Default::default()
        };
        for node in &self.nodes {
            *stats.nodes_by_type.entry(node.node_type.to_string()).or_insert(0) += 1;
        }
        let mut degree: HashMap<&NodeId, usize> = HashMap::new();
        for edge in &self.edges {
            *stats.edges_by_type.entry(edge.edge_type.to_string()).or_insert(0) += 1;
            *degree.entry(&edge.source).or_insert(0) += 1;
            *degree.entry(&edge.target).or_insert(0) += 1;
        }
        if !self.nodes.is_empty() {
            stats.avg_degree = (2 * self.edges.len()) as f64 / self.nodes.len() as f64;
        }
        stats.isolated_nodes = self.nodes.iter().filter(|n| !degree.contains_key(&n.id)).count();
        stats
    }
}

fn check_unit(id: &str, field: &'static str, value: f64) -> GraphResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(GraphError::OutOfRange {
            id: id.to_string(),
            field,
            value,
        })
    }
}

/// Drop edges whose endpoints are not both in `nodes`. Returns the number
/// of edges removed.
pub fn drop_orphan_edges(nodes: &[Node], edges: &mut Vec<Edge>) -> usize {
    let ids: FxHashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
    let before = edges.len();
    edges.retain(|e| ids.contains(&e.source) && ids.contains(&e.target));
    let dropped = before - edges.len();
    if dropped > 0 {
        warn!("Dropped {} edges referencing missing nodes", dropped);
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeType, NodeMetadata, NodeProperties, NodeType};

    fn node(id: &str) -> Node {
        let now = Utc::now();
        Node::new(id, id, NodeType::Concept, NodeProperties::Other, NodeMetadata::new(now, now, 0.5, 0))
    }

    #[test]
    fn test_metadata_is_derived() {
        let graph = Graph::new(
            vec![node("a"), node("b")],
            vec![Edge::new("a".into(), "b".into(), EdgeType::Similarity, 0.5)],
            Vec::new(),
            3,
        );
        assert_eq!(graph.metadata.total_nodes, 2);
        assert_eq!(graph.metadata.total_edges, 1);
        assert_eq!(graph.metadata.version, 3);
        assert!(chrono::DateTime::parse_from_rfc3339(&graph.metadata.last_update).is_ok());
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_dangling_edges() {
        let graph = Graph::new(
            vec![node("a")],
            vec![Edge::new("a".into(), "zz".into(), EdgeType::Similarity, 0.5)],
            Vec::new(),
            1,
        );
        assert!(matches!(graph.validate(), Err(GraphError::DanglingEdge { .. })));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let graph = Graph::new(vec![node("a"), node("a")], Vec::new(), Vec::new(), 1);
        assert_eq!(graph.validate(), Err(GraphError::DuplicateNode(NodeId::new("a"))));
    }

    #[test]
    fn test_drop_orphan_edges() {
        let nodes = vec![node("a"), node("b")];
        let mut edges = vec![
            Edge::new("a".into(), "b".into(), EdgeType::Similarity, 0.5),
            Edge::new("a".into(), "ghost".into(), EdgeType::Similarity, 0.5),
        ];
        assert_eq!(drop_orphan_edges(&nodes, &mut edges), 1);
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn test_statistics() {
        let graph = Graph::new(
            vec![node("a"), node("b"), node("c")],
            vec![Edge::new("a".into(), "b".into(), EdgeType::Tag, 0.5)],
            Vec::new(),
            1,
        );
        let stats = graph.statistics();
        assert_eq!(stats.nodes_by_type["concept"], 3);
        assert_eq!(stats.edges_by_type["tag"], 1);
        assert_eq!(stats.isolated_nodes, 1);
        assert!((stats.avg_degree - 2.0 / 3.0).abs() < 1e-12);
        assert!(Graph::empty(0).is_empty());
    }
}
