//! Knowledge graph data model
//!
//! - Nodes with a kind, typed attributes, residual attributes and a 3D position
//! - Undirected weighted edges with a kind
//! - Clusters with centroid, radius and summary metadata
//! - The immutable `Graph` snapshot produced by every build

pub mod cluster;
pub mod edge;
pub mod event;
pub mod node;
pub mod property;
pub mod store;
pub mod tags;
pub mod types;

// Re-export main types
pub use cluster::{palette_color, Cluster, ClusterMetadata, ClusterType, DateRange};
pub use edge::{Edge, EdgeMetadata};
pub use event::GraphEvent;
pub use node::{
    clamp_unit, DocumentProperties, InsightProperties, Node, NodeMetadata, NodeProperties,
    TagProperties,
};
pub use property::{PropertyMap, PropertyValue};
pub use store::{drop_orphan_edges, Graph, GraphError, GraphMetadata, GraphResult, GraphStatistics};
pub use tags::{HierarchicalTags, TagTier};
pub use types::{pair_key, EdgeId, EdgeType, NodeId, NodeType, Vec3};
