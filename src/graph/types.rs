//! Core type definitions for the knowledge graph

use graphweave_algorithms::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

/// Unique identifier for an edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        EdgeId(id.into())
    }

    /// Deterministic id for an edge of `edge_type` between two nodes
    pub fn between(edge_type: EdgeType, a: &NodeId, b: &NodeId) -> Self {
        EdgeId(format!("{}:{}:{}", edge_type.as_str(), a, b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical unordered key for a pair of node ids: `(min, max)`
pub fn pair_key<'a>(a: &'a NodeId, b: &'a NodeId) -> (&'a NodeId, &'a NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Document,
    Insight,
    Tag,
    Person,
    Concept,
    Source,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Document => "document",
            NodeType::Insight => "insight",
            NodeType::Tag => "tag",
            NodeType::Person => "person",
            NodeType::Concept => "concept",
            NodeType::Source => "source",
        }
    }

    /// Ring used by the hierarchical layout
    pub fn layout_level(&self) -> usize {
        match self {
            NodeType::Document | NodeType::Source => 0,
            NodeType::Insight | NodeType::Concept | NodeType::Person => 1,
            NodeType::Tag => 2,
        }
    }

    /// Default render color
    pub fn default_color(&self) -> &'static str {
        match self {
            NodeType::Document => "#4f8ef7",
            NodeType::Insight => "#f7b84f",
            NodeType::Tag => "#5fd38d",
            NodeType::Person => "#e377c2",
            NodeType::Concept => "#9467bd",
            NodeType::Source => "#8c564b",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Edge kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeType {
    Reference,
    Similarity,
    Derivation,
    Tag,
    Mention,
    ParentChild,
    Cluster,
    Connection,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Reference => "reference",
            EdgeType::Similarity => "similarity",
            EdgeType::Derivation => "derivation",
            EdgeType::Tag => "tag",
            EdgeType::Mention => "mention",
            EdgeType::ParentChild => "parent-child",
            EdgeType::Cluster => "cluster",
            EdgeType::Connection => "connection",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Position in 3D space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ORIGIN: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn distance(&self, other: &Vec3) -> f64 {
        graphweave_algorithms::distance(&self.to_point(), &other.to_point())
    }

    pub fn to_point(self) -> Point3 {
        [self.x, self.y, self.z]
    }
}

impl From<Point3> for Vec3 {
    fn from(p: Point3) -> Self {
        Vec3 { x: p[0], y: p[1], z: p[2] }
    }
}
