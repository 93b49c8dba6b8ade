//! Node implementation for the knowledge graph
//!
//! A node's domain attributes are typed per node kind (`NodeProperties`);
//! anything the pipeline does not interpret is kept in `extra`.

use super::property::PropertyMap;
use super::tags::{HierarchicalTags, TagTier};
use super::types::{NodeId, NodeType, Vec3};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attributes of a document node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentProperties {
    pub url: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: HierarchicalTags,
    /// Explicit quality score (0-100) when the record carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub interaction_count: u64,
    /// Ids of records this document links to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// Attributes of an insight node derived from a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightProperties {
    pub source_document: NodeId,
    pub text: String,
    /// Name of the pattern that matched
    pub pattern: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Attributes of a tag node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagProperties {
    pub tag: String,
    /// Most specific tier the tag was seen in
    pub tier: TagTier,
    pub document_count: usize,
}

/// Typed node attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeProperties {
    Document(DocumentProperties),
    Insight(InsightProperties),
    Tag(TagProperties),
    Other,
}

/// Bookkeeping attached to every node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Always within [0, 1]
    pub strength: f64,
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
}

impl NodeMetadata {
    pub fn new(created_at: DateTime<Utc>, last_updated: DateTime<Utc>, strength: f64, depth: u32) -> Self {
        Self {
            created_at,
            last_updated,
            strength: clamp_unit(strength),
            depth,
            cluster: None,
        }
    }
}

/// A node in the knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier for this node
    pub id: NodeId,

    pub label: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Assigned by the layout stage
    pub position: Vec3,

    pub size: f64,

    pub color: String,

    pub properties: NodeProperties,

    /// Record attributes not interpreted by the pipeline
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub extra: PropertyMap,

    pub metadata: NodeMetadata,
}

impl Node {
    /// Create a node at the origin with size and color derived from its kind
    /// and strength
    pub fn new(
        id: impl Into<NodeId>,
        label: impl Into<String>,
        node_type: NodeType,
        properties: NodeProperties,
        metadata: NodeMetadata,
    ) -> Self {
        Node {
            id: id.into(),
            label: label.into(),
            node_type,
            position: Vec3::ORIGIN,
            size: 4.0 + metadata.strength * 12.0,
            color: node_type.default_color().to_string(),
            properties,
            extra: PropertyMap::new(),
            metadata,
        }
    }

    /// Document attributes, if this is a document node
    pub fn as_document(&self) -> Option<&DocumentProperties> {
        match &self.properties {
            NodeProperties::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Body text for documents and insights, empty otherwise
    pub fn content(&self) -> &str {
        match &self.properties {
            NodeProperties::Document(doc) => &doc.content,
            NodeProperties::Insight(insight) => &insight.text,
            _ => "",
        }
    }

    /// All tags attached to this node, most specific first
    pub fn tags(&self) -> Vec<&str> {
        match &self.properties {
            NodeProperties::Document(doc) => doc.tags.flatten(),
            NodeProperties::Insight(insight) => insight.tags.iter().map(String::as_str).collect(),
            NodeProperties::Tag(tag) => vec![tag.tag.as_str()],
            NodeProperties::Other => Vec::new(),
        }
    }

    /// Explicit quality score (0-100), documents only
    pub fn explicit_quality(&self) -> Option<f64> {
        self.as_document().and_then(|d| d.quality_score)
    }

    pub fn interaction_count(&self) -> u64 {
        self.as_document().map_or(0, |d| d.interaction_count)
    }

    /// Cluster id assigned by the clustering stage
    pub fn cluster(&self) -> Option<&str> {
        self.metadata.cluster.as_deref()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Clamp to [0, 1], mapping NaN to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
