//! Cluster model
//!
//! Clusters are recomputed on every build by the clustering stage.

use super::types::{NodeId, Vec3};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fixed palette cluster colors are drawn from
pub const CLUSTER_PALETTE: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Which strategy produced a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterType {
    Semantic,
    Kmeans,
    Hierarchical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    /// Mean quality score (0-100) of the members
    pub avg_quality: f64,
    /// Up to three most frequent member tags
    pub dominant_tags: Vec<String>,
    /// Earliest and latest member creation time
    pub date_range: DateRange,
    pub node_count: usize,
}

/// A named group of nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub cluster_type: ClusterType,
    pub members: Vec<NodeId>,
    /// Mean member position
    pub centroid: Vec3,
    /// Largest member distance from the centroid
    pub radius: f64,
    pub color: String,
    pub metadata: ClusterMetadata,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.members.contains(id)
    }
}

/// Stable palette color for a cluster id
pub fn palette_color(id: &str) -> &'static str {
    let digest = Sha256::digest(id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let index = u64::from_be_bytes(bytes) % CLUSTER_PALETTE.len() as u64;
    CLUSTER_PALETTE[index as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_color_is_stable() {
        let a = palette_color("cluster-ai");
        assert_eq!(a, palette_color("cluster-ai"));
        assert!(CLUSTER_PALETTE.contains(&a));
    }

    #[test]
    fn test_palette_spreads_ids() {
        let colors: std::collections::HashSet<&str> =
            (0..50).map(|i| palette_color(&format!("cluster-{}", i))).collect();
        assert!(colors.len() > 3);
    }
}
