//! Clustering stage
//!
//! Three strategies over the positioned graph:
//! - **semantic**: bucket by primary tag, merge undersized buckets into their
//!   best-connected neighbour, split oversized buckets with k-means
//! - **kmeans**: k-means++ over node positions
//! - **hierarchical**: average-linkage agglomeration over edge weights
//!
//! Every produced cluster is summarized (centroid, radius, color, metadata)
//! and its id is written to each member's `metadata.cluster`.

use super::{build_view_with, positions};
use crate::config::{ClusteringMethod, ClusteringOptions};
use crate::graph::{
    palette_color, Cluster, ClusterMetadata, ClusterType, DateRange, Edge, Node, NodeId, Vec3,
};
use crate::similarity::effective_quality;
use crate::similarity::quality::NEUTRAL_QUALITY;
use chrono::{DateTime, Utc};
use graphweave_algorithms::{average_linkage, centroid, kmeans, AgglomerativeConfig, KMeansConfig, Point3};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use tracing::debug;

/// Iteration cap for k-means
pub const KMEANS_MAX_ITERATIONS: usize = 50;

/// Bucket for nodes with no tags
pub const UNCATEGORIZED: &str = "uncategorized";

/// How many tags a cluster summary lists
const DOMINANT_TAGS: usize = 3;

/// Half-life, in days, of creation-time proximity in hierarchical links
const DATE_PROXIMITY_HALF_LIFE_DAYS: f64 = 30.0;

/// A group of node indices before it is summarized
struct Group {
    id: String,
    name: Option<String>,
    members: Vec<usize>,
}

/// Groups nodes into clusters
#[derive(Debug, Clone)]
pub struct ClusteringStage {
    options: ClusteringOptions,
    now: DateTime<Utc>,
}

impl ClusteringStage {
    pub fn new(options: ClusteringOptions) -> Self {
        Self {
            options,
            now: Utc::now(),
        }
    }

    /// Fix the time fallback quality is measured against
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn options(&self) -> &ClusteringOptions {
        &self.options
    }

    /// Cluster `nodes` with the configured method. Members get their
    /// `metadata.cluster` set; nodes left out of every cluster have it cleared.
    pub fn cluster(&self, nodes: &mut [Node], edges: &[Edge]) -> Vec<Cluster> {
        for node in nodes.iter_mut() {
            node.metadata.cluster = None;
        }
        if nodes.is_empty() {
            return Vec::new();
        }

        let (cluster_type, groups) = match self.options.method {
            ClusteringMethod::None => return Vec::new(),
            ClusteringMethod::Semantic => (ClusterType::Semantic, self.semantic(nodes, edges)),
            ClusteringMethod::Kmeans => (ClusterType::Kmeans, self.kmeans_groups(nodes)),
            ClusteringMethod::Hierarchical => (ClusterType::Hierarchical, self.hierarchical(nodes, edges)),
        };

        let clusters: Vec<Cluster> = groups
            .into_iter()
            .enumerate()
            .map(|(i, group)| self.summarize(nodes, group, cluster_type, i))
            .collect();

        let index: FxHashMap<NodeId, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.id.clone(), i)).collect();
        for cluster in &clusters {
            for member in &cluster.members {
                if let Some(&i) = index.get(member) {
                    nodes[i].metadata.cluster = Some(cluster.id.clone());
                }
            }
        }

        debug!(
            "{:?} clustering produced {} clusters over {} nodes",
            cluster_type,
            clusters.len(),
            nodes.len()
        );
        clusters
    }

    fn min_size(&self) -> usize {
        self.options.min_cluster_size.max(1)
    }

    fn semantic(&self, nodes: &[Node], edges: &[Edge]) -> Vec<Group> {
        let mut assignment: Vec<String> = nodes.iter().map(|n| self.bucket_key(n)).collect();
        let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, key) in assignment.iter().enumerate() {
            buckets.entry(key.clone()).or_default().push(i);
        }

        self.merge_small_buckets(&mut buckets, &mut assignment, nodes, edges);

        let limit = nodes.len() as f64 / self.options.max_clusters.max(1) as f64;
        let points = positions(nodes);
        let mut groups = Vec::new();
        for (key, mut members) in buckets {
            members.sort_unstable();
            let parts = self.split(&points, members, limit);
            let slug = crate::builder::slugify(&key);
            let slug = if slug.is_empty() { UNCATEGORIZED.to_string() } else { slug };
            if parts.len() == 1 {
                groups.extend(parts.into_iter().map(|members| Group {
                    id: format!("cluster-{}", slug),
                    name: Some(key.clone()),
                    members,
                }));
            } else {
                groups.extend(parts.into_iter().enumerate().map(|(n, members)| Group {
                    id: format!("cluster-{}-{}", slug, n + 1),
                    name: Some(format!("{} ({})", key, n + 1)),
                    members,
                }));
            }
        }
        dedupe_ids(&mut groups);
        groups
    }

    /// First priority tag the node carries, else its first tag, else
    /// `uncategorized`. Without tag consideration the node type is used.
    fn bucket_key(&self, node: &Node) -> String {
        if !self.options.consider_tags {
            return node.node_type.as_str().to_string();
        }
        let tags: Vec<String> = node.tags().into_iter().map(str::to_lowercase).collect();
        self.options
            .priority_tags
            .iter()
            .map(|p| p.to_lowercase())
            .find(|p| tags.contains(p))
            .or_else(|| tags.into_iter().next())
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }

    /// Repeatedly fold the smallest undersized bucket into the bucket it
    /// shares the most edges with (the largest one when it has none)
    fn merge_small_buckets(
        &self,
        buckets: &mut BTreeMap<String, Vec<usize>>,
        assignment: &mut [String],
        nodes: &[Node],
        edges: &[Edge],
    ) {
        let index: FxHashMap<&NodeId, usize> = nodes.iter().enumerate().map(|(i, n)| (&n.id, i)).collect();
        let endpoints: Vec<(usize, usize)> = edges
            .iter()
            .filter_map(|e| Some((*index.get(&e.source)?, *index.get(&e.target)?)))
            .collect();

        while buckets.len() > 1 {
            let Some(small) = buckets
                .iter()
                .filter(|(_, members)| members.len() < self.min_size())
                .min_by(|a, b| a.1.len().cmp(&b.1.len()).then_with(|| a.0.cmp(b.0)))
                .map(|(key, _)| key.clone())
            else {
                break;
            };

            let mut connections: BTreeMap<&str, usize> = BTreeMap::new();
            for &(u, v) in &endpoints {
                let (bu, bv) = (assignment[u].as_str(), assignment[v].as_str());
                if bu == small && bv != small {
                    *connections.entry(bv).or_insert(0) += 1;
                } else if bv == small && bu != small {
                    *connections.entry(bu).or_insert(0) += 1;
                }
            }

            let Some(target) = buckets
                .iter()
                .filter(|(key, _)| **key != small)
                .max_by(|a, b| {
                    let ca = connections.get(a.0.as_str()).copied().unwrap_or(0);
                    let cb = connections.get(b.0.as_str()).copied().unwrap_or(0);
                    ca.cmp(&cb)
                        .then_with(|| a.1.len().cmp(&b.1.len()))
                        .then_with(|| b.0.cmp(a.0))
                })
                .map(|(key, _)| key.clone())
            else {
                break;
            };

            let moved = buckets.remove(&small).unwrap_or_default();
            debug!("Merging bucket {} ({} nodes) into {}", small, moved.len(), target);
            for &i in &moved {
                assignment[i] = target.clone();
            }
            buckets.entry(target).or_default().extend(moved);
        }
    }

    /// Split `members` with k-means while it exceeds `limit`. A split is
    /// only accepted when every part keeps at least `min_cluster_size` nodes.
    fn split(&self, points: &[Point3], members: Vec<usize>, limit: f64) -> Vec<Vec<usize>> {
        let size = members.len();
        if size as f64 <= limit {
            return vec![members];
        }
        let k = (size / self.min_size()).min((size as f64 / limit.max(1.0)).ceil() as usize);
        if k < 2 {
            return vec![members];
        }

        let sub: Vec<Point3> = members.iter().map(|&i| points[i]).collect();
        let result = kmeans(
            &sub,
            &KMeansConfig {
                k,
                max_iterations: KMEANS_MAX_ITERATIONS,
                seed: self.options.seed,
            },
        );
        let parts: Vec<Vec<usize>> = result
            .groups()
            .into_iter()
            .filter(|g| !g.is_empty())
            .map(|g| g.into_iter().map(|j| members[j]).collect())
            .collect();
        if parts.len() < 2 || parts.iter().any(|p| p.len() < self.min_size()) {
            return vec![members];
        }
        parts
            .into_iter()
            .flat_map(|part| self.split(points, part, limit))
            .collect()
    }

    fn kmeans_groups(&self, nodes: &[Node]) -> Vec<Group> {
        let k = self.options.max_clusters.min(nodes.len());
        let result = kmeans(
            &positions(nodes),
            &KMeansConfig {
                k,
                max_iterations: KMEANS_MAX_ITERATIONS,
                seed: self.options.seed,
            },
        );
        debug!(
            "k-means with k={} stopped after {} iterations (converged: {})",
            k, result.iterations, result.converged
        );
        result
            .groups()
            .into_iter()
            .filter(|g| g.len() >= self.min_size())
            .enumerate()
            .map(|(i, members)| Group {
                id: format!("kmeans-{}", i),
                name: None,
                members,
            })
            .collect()
    }

    fn hierarchical(&self, nodes: &[Node], edges: &[Edge]) -> Vec<Group> {
        let indexed = build_view_with(nodes, edges, |edge, a, b| self.link_weight(edge, a, b));
        let config = AgglomerativeConfig {
            max_clusters: self.options.max_clusters,
            min_similarity: self.options.distance_threshold,
        };
        average_linkage(&indexed.view, &config)
            .into_iter()
            .filter(|g| g.len() >= self.min_size())
            .enumerate()
            .map(|(i, members)| Group {
                id: format!("hierarchical-{}", i),
                name: None,
                members,
            })
            .collect()
    }

    /// Edge weight, optionally averaged with date and quality closeness
    fn link_weight(&self, edge: &Edge, a: &Node, b: &Node) -> f64 {
        let mut weight = edge.weight;
        if self.options.consider_dates {
            let days = (a.metadata.created_at - b.metadata.created_at).num_seconds().abs() as f64 / 86_400.0;
            weight = (weight + 0.5f64.powf(days / DATE_PROXIMITY_HALF_LIFE_DAYS)) / 2.0;
        }
        if self.options.consider_quality {
            let delta = (self.quality(a) - self.quality(b)).abs();
            weight = (weight + (1.0 - delta / 100.0)) / 2.0;
        }
        weight
    }

    fn quality(&self, node: &Node) -> f64 {
        node.as_document()
            .map(|doc| effective_quality(doc, node.metadata.created_at, self.now).value)
            .unwrap_or(NEUTRAL_QUALITY)
    }

    fn summarize(&self, nodes: &[Node], group: Group, cluster_type: ClusterType, ordinal: usize) -> Cluster {
        let members: Vec<&Node> = group.members.iter().map(|&i| &nodes[i]).collect();
        let points: Vec<Point3> = members.iter().map(|n| n.position.to_point()).collect();
        let center = Vec3::from(centroid(&points));
        let radius = members
            .iter()
            .map(|n| n.position.distance(&center))
            .fold(0.0, f64::max);

        let dominant_tags = dominant_tags(&members);
        let avg_quality = members.iter().map(|n| self.quality(n)).sum::<f64>() / members.len().max(1) as f64;
        let start = members.iter().map(|n| n.metadata.created_at).min().unwrap_or(self.now);
        let end = members.iter().map(|n| n.metadata.created_at).max().unwrap_or(self.now);

        let name = group
            .name
            .or_else(|| dominant_tags.first().cloned())
            .unwrap_or_else(|| format!("Cluster {}", ordinal + 1));

        Cluster {
            color: palette_color(&group.id).to_string(),
            id: group.id,
            name,
            cluster_type,
            members: members.iter().map(|n| n.id.clone()).collect(),
            centroid: center,
            radius,
            metadata: ClusterMetadata {
                avg_quality,
                dominant_tags,
                date_range: DateRange { start, end },
                node_count: members.len(),
            },
        }
    }
}

/// Most frequent lowercase member tags, ties broken alphabetically
fn dominant_tags(members: &[&Node]) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for node in members {
        for tag in node.tags() {
            *counts.entry(tag.to_lowercase()).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(DOMINANT_TAGS).map(|(tag, _)| tag).collect()
}

/// Distinct bucket keys can share a slug; later groups take a numeric
/// suffix so every cluster id stays unique
fn dedupe_ids(groups: &mut [Group]) {
    let mut taken: FxHashSet<String> = FxHashSet::default();
    for group in groups.iter_mut() {
        if taken.insert(group.id.clone()) {
            continue;
        }
        let base = std::mem::take(&mut group.id);
        let mut n = 2;
        while !taken.insert(format!("{}-{}", base, n)) {
            n += 1;
        }
        group.id = format!("{}-{}", base, n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DocumentProperties, EdgeType, HierarchicalTags, NodeMetadata, NodeProperties, NodeType};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn doc(id: &str, tags: &[&str], position: [f64; 3]) -> Node {
        let mut node = Node::new(
            id,
            id,
            NodeType::Document,
            NodeProperties::Document(DocumentProperties {
                quality_score: Some(60.0),
                tags: HierarchicalTags {
                    topical: tags.iter().map(|t| t.to_string()).collect(),
                    ..Default::default()
                },
                ..Default::default()
            }),
            NodeMetadata::new(now(), now(), 0.5, 0),
        );
        node.position = Vec3::from(position);
        node
    }

    fn edge(a: &str, b: &str, weight: f64) -> Edge {
        Edge::new(a.into(), b.into(), EdgeType::Similarity, weight)
    }

    fn stage(method: ClusteringMethod) -> ClusteringStage {
        ClusteringStage::new(ClusteringOptions {
            method,
            ..Default::default()
        })
        .with_reference_time(now())
    }

    #[test]
    fn test_semantic_merges_small_bucket_into_best_connected() {
        let mut nodes = vec![
            doc("a1", &["agents"], [0.0; 3]),
            doc("a2", &["agents"], [0.0; 3]),
            doc("a3", &["agents"], [0.0; 3]),
            doc("r1", &["rag"], [0.0; 3]),
            doc("r2", &["rag"], [0.0; 3]),
            doc("r3", &["rag"], [0.0; 3]),
            doc("m1", &["misc"], [0.0; 3]),
        ];
        let edges = vec![edge("m1", "r1", 0.5), edge("m1", "r2", 0.5), edge("m1", "a1", 0.5)];

        let clusters = stage(ClusteringMethod::Semantic).cluster(&mut nodes, &edges);
        assert_eq!(clusters.len(), 2);
        let rag = clusters.iter().find(|c| c.id == "cluster-rag").unwrap();
        assert!(rag.contains(&NodeId::new("m1")));
        assert_eq!(rag.len(), 4);
        assert_eq!(nodes[6].cluster(), Some("cluster-rag"));
        assert!(clusters.iter().all(|c| c.len() >= 3));
    }

    #[test]
    fn test_semantic_merge_without_edges_goes_to_largest() {
        let mut nodes = vec![
            doc("a1", &["agents"], [0.0; 3]),
            doc("a2", &["agents"], [0.0; 3]),
            doc("a3", &["agents"], [0.0; 3]),
            doc("a4", &["agents"], [0.0; 3]),
            doc("r1", &["rag"], [0.0; 3]),
            doc("r2", &["rag"], [0.0; 3]),
            doc("r3", &["rag"], [0.0; 3]),
            doc("u1", &[], [0.0; 3]),
        ];
        let clusters = stage(ClusteringMethod::Semantic).cluster(&mut nodes, &[]);
        assert_eq!(nodes[7].cluster(), Some("cluster-agents"));
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_semantic_ids_stay_unique_when_slugs_collide() {
        let mut nodes = vec![
            doc("s1", &["Machine Learning"], [0.0; 3]),
            doc("s2", &["Machine Learning"], [0.0; 3]),
            doc("s3", &["Machine Learning"], [0.0; 3]),
            doc("h1", &["machine-learning"], [0.0; 3]),
            doc("h2", &["machine-learning"], [0.0; 3]),
            doc("h3", &["machine-learning"], [0.0; 3]),
        ];
        let stage = ClusteringStage::new(ClusteringOptions {
            method: ClusteringMethod::Semantic,
            max_clusters: 2,
            ..Default::default()
        })
        .with_reference_time(now());

        let clusters = stage.cluster(&mut nodes, &[]);
        let ids: Vec<&str> = clusters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["cluster-machine-learning", "cluster-machine-learning-2"]);
        assert_eq!(nodes[0].cluster(), Some("cluster-machine-learning"));
        assert_eq!(nodes[3].cluster(), Some("cluster-machine-learning-2"));
    }

    #[test]
    fn test_semantic_priority_tags_win() {
        let clustering = stage(ClusteringMethod::Semantic);
        let node = doc("x", &["zeta", "RAG", "agents"], [0.0; 3]);
        assert_eq!(clustering.bucket_key(&node), "agents");
        assert_eq!(clustering.bucket_key(&doc("y", &["Zeta"], [0.0; 3])), "zeta");
        assert_eq!(clustering.bucket_key(&doc("z", &[], [0.0; 3])), UNCATEGORIZED);
    }

    #[test]
    fn test_semantic_splits_oversized_bucket() {
        let mut nodes: Vec<Node> = (0..6)
            .map(|i| {
                let x = if i < 3 { -500.0 } else { 500.0 };
                doc(&format!("n{}", i), &["agents"], [x + i as f64, 0.0, 0.0])
            })
            .collect();
        let options = ClusteringOptions {
            max_clusters: 2,
            ..Default::default()
        };
        let clusters = ClusteringStage::new(options).cluster(&mut nodes, &[]);
        let ids: Vec<&str> = clusters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["cluster-agents-1", "cluster-agents-2"]);
        assert!(clusters.iter().all(|c| c.len() == 3));
    }

    #[test]
    fn test_kmeans_separates_blobs_and_discards_small_groups() {
        let mut nodes = vec![
            doc("a", &[], [-500.0, 0.0, 0.0]),
            doc("b", &[], [-505.0, 0.0, 0.0]),
            doc("c", &[], [-500.0, 5.0, 0.0]),
            doc("d", &[], [500.0, 0.0, 0.0]),
            doc("e", &[], [505.0, 0.0, 0.0]),
            doc("f", &[], [500.0, 5.0, 0.0]),
        ];
        let options = ClusteringOptions {
            method: ClusteringMethod::Kmeans,
            max_clusters: 2,
            ..Default::default()
        };
        let clusters = ClusteringStage::new(options.clone()).cluster(&mut nodes, &[]);
        assert_eq!(clusters.len(), 2);
        for cluster in &clusters {
            let left = cluster.members.iter().filter(|m| ["a", "b", "c"].contains(&m.as_str())).count();
            assert!(left == 0 || left == 3);
        }

        let strict = ClusteringOptions {
            min_cluster_size: 4,
            ..options
        };
        assert!(ClusteringStage::new(strict).cluster(&mut nodes, &[]).is_empty());
        assert!(nodes.iter().all(|n| n.cluster().is_none()));
    }

    #[test]
    fn test_hierarchical_stops_at_threshold() {
        let mut nodes: Vec<Node> = ["a", "b", "c", "d", "e"].iter().map(|id| doc(id, &[], [0.0; 3])).collect();
        let edges = vec![
            edge("a", "b", 0.9),
            edge("b", "c", 0.8),
            edge("d", "e", 0.9),
            edge("c", "d", 0.1),
        ];
        let options = ClusteringOptions {
            method: ClusteringMethod::Hierarchical,
            max_clusters: 1,
            min_cluster_size: 2,
            ..Default::default()
        };
        let clusters = ClusteringStage::new(options).cluster(&mut nodes, &edges);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].id, "hierarchical-0");
        assert_eq!(clusters[0].members, vec![NodeId::new("a"), NodeId::new("b"), NodeId::new("c")]);
        assert_eq!(clusters[1].members, vec![NodeId::new("d"), NodeId::new("e")]);
        assert_eq!(clusters[1].cluster_type, ClusterType::Hierarchical);
    }

    #[test]
    fn test_link_weight_blends_dates() {
        let options = ClusteringOptions {
            consider_dates: true,
            ..Default::default()
        };
        let clustering = ClusteringStage::new(options).with_reference_time(now());
        let a = doc("a", &[], [0.0; 3]);
        let mut b = doc("b", &[], [0.0; 3]);
        b.metadata.created_at = now() - Duration::days(30);
        let w = clustering.link_weight(&edge("a", "b", 0.5), &a, &b);
        assert!((w - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_cluster_summary() {
        let mut nodes = vec![
            doc("a", &["rag", "agents"], [0.0, 0.0, 0.0]),
            doc("b", &["rag"], [2.0, 0.0, 0.0]),
            doc("c", &["rag", "zeta", "agents"], [4.0, 0.0, 0.0]),
        ];
        nodes[0].metadata.created_at = now() - Duration::days(3);
        let clusters = stage(ClusteringMethod::Semantic).cluster(&mut nodes, &[]);
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.name, "agents");
        assert_eq!(cluster.centroid, Vec3::new(2.0, 0.0, 0.0));
        assert!((cluster.radius - 2.0).abs() < 1e-9);
        assert_eq!(cluster.metadata.dominant_tags, vec!["rag", "agents", "zeta"]);
        assert_eq!(cluster.metadata.node_count, 3);
        assert!((cluster.metadata.avg_quality - 60.0).abs() < 1e-9);
        assert_eq!(cluster.metadata.date_range.start, now() - Duration::days(3));
        assert_eq!(cluster.metadata.date_range.end, now());
        assert_eq!(cluster.color, palette_color(&cluster.id));
    }

    #[test]
    fn test_none_clears_assignments() {
        let mut nodes = vec![doc("a", &["rag"], [0.0; 3])];
        nodes[0].metadata.cluster = Some("stale".into());
        assert!(stage(ClusteringMethod::None).cluster(&mut nodes, &[]).is_empty());
        assert!(nodes[0].cluster().is_none());
    }
}
