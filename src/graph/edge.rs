//! Edge implementation for the knowledge graph
//!
//! Edges are undirected for filtering and clustering purposes; `source` and
//! `target` only record which endpoint produced the edge.

use super::node::clamp_unit;
use super::property::{PropertyMap, PropertyValue};
use super::types::{pair_key, EdgeId, EdgeType, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bookkeeping attached to every edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeMetadata {
    pub created_at: DateTime<Utc>,
    /// Always within [0, 1]
    pub confidence: f64,
}

/// An edge in the knowledge graph. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique identifier for this edge
    pub id: EdgeId,

    pub source: NodeId,

    pub target: NodeId,

    #[serde(rename = "type")]
    pub edge_type: EdgeType,

    /// Always within [0, 1]
    pub weight: f64,

    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub properties: PropertyMap,

    pub metadata: EdgeMetadata,
}

impl Edge {
    /// Create an edge with a deterministic id; weight and confidence are
    /// clamped into [0, 1]
    pub fn new(source: NodeId, target: NodeId, edge_type: EdgeType, weight: f64) -> Self {
        let weight = clamp_unit(weight);
        Edge {
            id: EdgeId::between(edge_type, &source, &target),
            source,
            target,
            edge_type,
            weight,
            properties: PropertyMap::new(),
            metadata: EdgeMetadata {
                created_at: Utc::now(),
                confidence: weight,
            },
        }
    }

    /// Override the confidence (clamped)
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.metadata.confidence = clamp_unit(confidence);
        self
    }

    /// Attach a property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Canonical unordered endpoint key
    pub fn key(&self) -> (&NodeId, &NodeId) {
        pair_key(&self.source, &self.target)
    }

    /// Owned canonical key, for use in sets and maps
    pub fn owned_key(&self) -> (NodeId, NodeId) {
        let (a, b) = self.key();
        (a.clone(), b.clone())
    }

    /// Whether `id` is one of the endpoints
    pub fn touches(&self, id: &NodeId) -> bool {
        &self.source == id || &self.target == id
    }

    /// The endpoint opposite `id`
    pub fn other(&self, id: &NodeId) -> &NodeId {
        if &self.source == id {
            &self.target
        } else {
            &self.source
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_edge() {
        let edge = Edge::new("b".into(), "a".into(), EdgeType::Similarity, 0.42);
        assert_eq!(edge.id.as_str(), "similarity:b:a");
        assert_eq!(edge.weight, 0.42);
        assert_eq!(edge.metadata.confidence, 0.42);
        assert_eq!(edge.key(), (&NodeId::new("a"), &NodeId::new("b")));
    }

    #[test]
    fn test_weight_and_confidence_are_clamped() {
        let edge = Edge::new("a".into(), "b".into(), EdgeType::Tag, 3.0).with_confidence(-1.0);
        assert_eq!(edge.weight, 1.0);
        assert_eq!(edge.metadata.confidence, 0.0);
    }

    #[test]
    fn test_endpoints() {
        let edge = Edge::new("a".into(), "b".into(), EdgeType::Reference, 0.8)
            .with_property("origin", "relation");
        let a = NodeId::new("a");
        assert!(edge.touches(&a));
        assert_eq!(edge.other(&a), &NodeId::new("b"));
        assert!(!edge.touches(&NodeId::new("c")));
        assert_eq!(edge.properties["origin"].as_string(), Some("relation"));
    }
}
