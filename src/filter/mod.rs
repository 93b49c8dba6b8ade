//! Edge filtering
//!
//! Reduces the candidate edge set in five steps:
//!
//! 1. Score every edge's importance.
//! 2. Walk edges by importance (recent edges first when configured) and keep
//!    an edge only if it meets `min_edge_weight`, its endpoint pair is not
//!    already linked, and neither endpoint is at `max_edges_per_node`.
//! 3. Optionally collapse inter-cluster edges into one summary edge per
//!    cluster pair, keeping only strong intra-cluster edges.
//! 4. Give every node left without edges one `connection` edge to its
//!    nearest neighbour by position.
//! 5. Drop edges whose endpoints are missing.
//!
//! Each node ends with at most `max_edges_per_node` edges plus at most one
//! more for connectivity.

pub mod importance;

pub use importance::ImportanceScorer;

use crate::config::EdgeFilteringOptions;
use crate::graph::{drop_orphan_edges, Edge, EdgeType, Node, NodeId};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Weight of a synthetic connectivity edge
pub const CONNECTION_WEIGHT: f64 = 0.3;

/// Intra-cluster edges above this weight survive cluster reduction
pub const INTRA_CLUSTER_MIN_WEIGHT: f64 = 0.7;

/// Counts from one filtering pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub candidates: usize,
    pub below_weight: usize,
    pub duplicates: usize,
    pub over_capacity: usize,
    pub summary_edges: usize,
    pub connection_edges: usize,
    /// Isolated nodes no neighbour had room for
    pub unconnected: usize,
    pub orphans: usize,
    pub kept: usize,
}

/// Bounds edge count per node and guarantees every node at least one edge
#[derive(Debug, Clone)]
pub struct EdgeFilter {
    options: EdgeFilteringOptions,
    now: DateTime<Utc>,
}

impl EdgeFilter {
    pub fn new(options: EdgeFilteringOptions) -> Self {
        Self {
            options,
            now: Utc::now(),
        }
    }

    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn filter(&self, nodes: &[Node], edges: Vec<Edge>) -> Vec<Edge> {
        self.filter_with_report(nodes, edges).0
    }

    pub fn filter_with_report(&self, nodes: &[Node], edges: Vec<Edge>) -> (Vec<Edge>, FilterReport) {
        let mut report = FilterReport {
            candidates: edges.len(),
            ..Default::default()
        };

        let mut kept = self.bounded_edges(nodes, edges, &mut report);

        if self.options.clustering_enabled {
            kept = self.cluster_reduce(nodes, kept, &mut report);
        }

        let (connections, unconnected) = connectivity_edges(nodes, &kept, self.options.max_edges_per_node);
        report.connection_edges = connections.len();
        report.unconnected = unconnected;
        kept.extend(connections);

        report.orphans = drop_orphan_edges(nodes, &mut kept);
        report.kept = kept.len();

        debug!(
            "Edge filter: {} candidates -> {} kept ({} below weight, {} duplicate, {} over capacity, {} summary, {} connection)",
            report.candidates,
            report.kept,
            report.below_weight,
            report.duplicates,
            report.over_capacity,
            report.summary_edges,
            report.connection_edges
        );
        (kept, report)
    }

    /// Steps 1 and 2
    fn bounded_edges(&self, nodes: &[Node], edges: Vec<Edge>, report: &mut FilterReport) -> Vec<Edge> {
        let scorer = ImportanceScorer::new(nodes, self.options.importance_weights.clone(), self.now);
        let window = self.options.recent_window_days as f64;
        let preserve_recent = self.options.preserve_recent_connections;

        let mut ranked: Vec<(bool, f64, Edge)> = edges
            .into_par_iter()
            .map(|edge| {
                let recent = preserve_recent && scorer.age_days(&edge).is_some_and(|age| age <= window);
                (recent, scorer.score(&edge), edge)
            })
            .collect();

        ranked.sort_by(|(ra, ia, a), (rb, ib, b)| {
            rb.cmp(ra)
                .then_with(|| ib.partial_cmp(ia).unwrap_or(Ordering::Equal))
                .then_with(|| a.key().cmp(&b.key()))
                .then_with(|| a.edge_type.cmp(&b.edge_type))
        });

        let max = self.options.max_edges_per_node;
        let mut degree: FxHashMap<NodeId, usize> = FxHashMap::default();
        let mut linked: FxHashSet<(NodeId, NodeId)> = FxHashSet::default();
        let mut kept = Vec::new();

        for (_, _, edge) in ranked {
            if edge.weight < self.options.min_edge_weight {
                report.below_weight += 1;
                continue;
            }
            if linked.contains(&edge.owned_key()) {
                report.duplicates += 1;
                continue;
            }
            let full = |id: &NodeId| degree.get(id).copied().unwrap_or(0) >= max;
            if full(&edge.source) || full(&edge.target) {
                report.over_capacity += 1;
                continue;
            }
            *degree.entry(edge.source.clone()).or_insert(0) += 1;
            *degree.entry(edge.target.clone()).or_insert(0) += 1;
            linked.insert(edge.owned_key());
            kept.push(edge);
        }
        kept
    }

    /// Step 3
    fn cluster_reduce(&self, nodes: &[Node], edges: Vec<Edge>, report: &mut FilterReport) -> Vec<Edge> {
        let group_of: FxHashMap<&NodeId, String> = nodes
            .iter()
            .map(|n| {
                let group = n
                    .cluster()
                    .map(str::to_string)
                    .unwrap_or_else(|| n.node_type.to_string());
                (&n.id, group)
            })
            .collect();

        let mut intra = Vec::new();
        let mut inter: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
        for edge in edges {
            let (Some(ga), Some(gb)) = (group_of.get(&edge.source), group_of.get(&edge.target)) else {
                continue;
            };
            if ga == gb {
                if edge.weight > INTRA_CLUSTER_MIN_WEIGHT {
                    intra.push(edge);
                }
            } else {
                let key = if ga <= gb {
                    (ga.clone(), gb.clone())
                } else {
                    (gb.clone(), ga.clone())
                };
                inter.entry(key).or_default().push(edge.weight);
            }
        }

        let representatives = representatives(nodes, &group_of);
        let mut degree: FxHashMap<NodeId, usize> = FxHashMap::default();
        for edge in &intra {
            *degree.entry(edge.source.clone()).or_insert(0) += 1;
            *degree.entry(edge.target.clone()).or_insert(0) += 1;
        }

        let mut summaries: Vec<(f64, String, String, usize)> = inter
            .into_iter()
            .map(|((a, b), weights)| {
                let avg = weights.iter().sum::<f64>() / weights.len() as f64;
                (avg, a, b, weights.len())
            })
            .filter(|(avg, ..)| *avg > self.options.min_edge_weight)
            .collect();
        summaries.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let max = self.options.max_edges_per_node;
        let mut reduced = intra;
        for (avg, a, b, count) in summaries {
            let (Some(&ra), Some(&rb)) = (representatives.get(&a), representatives.get(&b)) else {
                continue;
            };
            let full = |id: &NodeId| degree.get(id).copied().unwrap_or(0) >= max;
            if full(ra) || full(rb) {
                continue;
            }
            *degree.entry(ra.clone()).or_insert(0) += 1;
            *degree.entry(rb.clone()).or_insert(0) += 1;
            reduced.push(
                Edge::new(ra.clone(), rb.clone(), EdgeType::Cluster, avg)
                    .with_property("sourceCluster", a)
                    .with_property("targetCluster", b)
                    .with_property("edgeCount", count as i64),
            );
            report.summary_edges += 1;
        }
        reduced
    }
}

/// Strongest member of each group, ties broken by smallest id
fn representatives<'a>(nodes: &'a [Node], group_of: &FxHashMap<&NodeId, String>) -> FxHashMap<String, &'a NodeId> {
    let mut best: FxHashMap<String, &Node> = FxHashMap::default();
    for node in nodes {
        let Some(group) = group_of.get(&node.id) else { continue };
        best.entry(group.clone())
            .and_modify(|current| {
                let stronger = node.metadata.strength > current.metadata.strength
                    || (node.metadata.strength == current.metadata.strength && node.id < current.id);
                if stronger {
                    *current = node;
                }
            })
            .or_insert(node);
    }
    best.into_iter().map(|(group, node)| (group, &node.id)).collect()
}

/// Step 4: one synthetic edge per isolated node, to the nearest node with
/// room for it. Nodes without a synthetic edge are preferred; no node ever
/// ends above `max + 1` edges. Returns the edges and the number of nodes
/// that found no partner.
fn connectivity_edges(nodes: &[Node], edges: &[Edge], max: usize) -> (Vec<Edge>, usize) {
    if nodes.len() < 2 {
        return (Vec::new(), 0);
    }
    let index: FxHashMap<&NodeId, usize> = nodes.iter().enumerate().map(|(i, n)| (&n.id, i)).collect();
    let mut degree = vec![0usize; nodes.len()];
    for edge in edges {
        for id in [&edge.source, &edge.target] {
            if let Some(&i) = index.get(id) {
                degree[i] += 1;
            }
        }
    }

    let mut synthetic = vec![false; nodes.len()];
    let mut added = Vec::new();
    let mut unconnected = 0;
    for i in 0..nodes.len() {
        if degree[i] > 0 {
            continue;
        }
        let has_room = |j: usize| degree[j] <= max;
        let nearest = nearest(nodes, i, |j| !synthetic[j] && has_room(j)).or_else(|| nearest(nodes, i, has_room));
        let Some(j) = nearest else {
            unconnected += 1;
            continue;
        };

        degree[i] += 1;
        degree[j] += 1;
        synthetic[i] = true;
        synthetic[j] = true;
        added.push(
            Edge::new(nodes[i].id.clone(), nodes[j].id.clone(), EdgeType::Connection, CONNECTION_WEIGHT)
                .with_property("synthetic", true),
        );
    }
    if unconnected > 0 {
        warn!("{} nodes left without edges, every neighbour is at capacity", unconnected);
    }
    (added, unconnected)
}

fn nearest(nodes: &[Node], i: usize, eligible: impl Fn(usize) -> bool) -> Option<usize> {
    let origin = &nodes[i].position;
    (0..nodes.len())
        .filter(|&j| j != i && eligible(j))
        .map(|j| (j, origin.distance(&nodes[j].position)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)))
        .map(|(j, _)| j)
}
