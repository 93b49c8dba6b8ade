//! Edge importance
//!
//! A weighted sum of five components, each in [0, 1]:
//! recency of the newer endpoint (90-day half-life), edge weight, tag
//! Jaccard of the endpoints, normalized interaction count and mean endpoint
//! quality.

use crate::config::ImportanceWeights;
use crate::graph::{Edge, Node, NodeId};
use crate::similarity::quality::NEUTRAL_QUALITY;
use crate::similarity::{effective_quality, text::jaccard};
use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};

/// Half-life of the recency component, in days
pub const RECENCY_HALF_LIFE_DAYS: f64 = 90.0;

/// Per-node values the importance components read
struct NodeSignals {
    last_updated: DateTime<Utc>,
    tags: FxHashSet<String>,
    interactions: f64,
    quality: f64,
}

/// Precomputed node signals for scoring many edges
pub struct ImportanceScorer {
    weights: ImportanceWeights,
    now: DateTime<Utc>,
    signals: FxHashMap<NodeId, NodeSignals>,
    max_interactions: f64,
}

impl ImportanceScorer {
    pub fn new(nodes: &[Node], weights: ImportanceWeights, now: DateTime<Utc>) -> Self {
        let signals: FxHashMap<NodeId, NodeSignals> = nodes
            .iter()
            .map(|node| {
                let quality = node
                    .as_document()
                    .map(|doc| effective_quality(doc, node.metadata.created_at, now).value)
                    .unwrap_or(NEUTRAL_QUALITY);
                let signals = NodeSignals {
                    last_updated: node.metadata.last_updated,
                    tags: node.tags().into_iter().map(str::to_lowercase).collect(),
                    interactions: node.interaction_count() as f64,
                    quality,
                };
                (node.id.clone(), signals)
            })
            .collect();
        let max_interactions = signals.values().map(|s| s.interactions).fold(0.0, f64::max);
        Self {
            weights,
            now,
            signals,
            max_interactions,
        }
    }

    /// Age in days of the newer endpoint, `None` if an endpoint is unknown
    pub fn age_days(&self, edge: &Edge) -> Option<f64> {
        let a = self.signals.get(&edge.source)?;
        let b = self.signals.get(&edge.target)?;
        let newest = a.last_updated.max(b.last_updated);
        Some(((self.now - newest).num_seconds() as f64 / 86_400.0).max(0.0))
    }

    /// Importance in [0, 1]; edges with unknown endpoints score 0
    pub fn score(&self, edge: &Edge) -> f64 {
        let (Some(a), Some(b), Some(age)) = (
            self.signals.get(&edge.source),
            self.signals.get(&edge.target),
            self.age_days(edge),
        ) else {
            return 0.0;
        };

        let recency = 0.5f64.powf(age / RECENCY_HALF_LIFE_DAYS);
        let semantic = jaccard(&a.tags, &b.tags);
        let interaction = if self.max_interactions > 0.0 {
            (a.interactions + b.interactions) / (2.0 * self.max_interactions)
        } else {
            0.0
        };
        let quality = (a.quality + b.quality) / 200.0;

        let w = &self.weights;
        let score = w.recency * recency
            + w.strength * edge.weight
            + w.semantic * semantic
            + w.interaction * interaction
            + w.quality * quality;
        crate::graph::clamp_unit(score)
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

    fn doc(id: &str, age_days: i64, interactions: u64, tags: &[&str]) -> Node {
        let at = now() - Duration::days(age_days);
        Node::new(
            id,
            id,
            NodeType::Document,
            NodeProperties::Document(DocumentProperties {
                interaction_count: interactions,
                quality_score: Some(60.0),
                tags: HierarchicalTags {
                    general: tags.iter().map(|t| t.to_string()).collect(),
                    ..Default::default()
                },
                ..Default::default()
            }),
            NodeMetadata::new(at, at, 0.5, 0),
        )
    }

    #[test]
    fn test_components() {
        let nodes = vec![doc("a", 0, 10, &["ai", "rag"]), doc("b", 90, 0, &["ai"])];
        let scorer = ImportanceScorer::new(&nodes, ImportanceWeights::default(), now());
        let edge = Edge::new("a".into(), "b".into(), EdgeType::Similarity, 0.5);

        // recency 1.0 (newest endpoint is fresh), weight 0.5, tags 0.5,
        // interaction 10 / 20, quality 0.6
        let expected = 0.3 * 1.0 + 0.3 * 0.5 + 0.2 * 0.5 + 0.1 * 0.5 + 0.1 * 0.6;
        assert!((scorer.score(&edge) - expected).abs() < 1e-9);
        assert_eq!(scorer.age_days(&edge), Some(0.0));
    }

    #[test]
    fn test_recency_decays() {
        let nodes = vec![doc("a", 90, 0, &[]), doc("b", 90, 0, &[]), doc("c", 0, 0, &[])];
        let weights = ImportanceWeights {
            recency: 1.0,
            strength: 0.0,
            semantic: 0.0,
            interaction: 0.0,
            quality: 0.0,
        };
        let scorer = ImportanceScorer::new(&nodes, weights, now());
        let old = Edge::new("a".into(), "b".into(), EdgeType::Similarity, 0.5);
        let fresh = Edge::new("a".into(), "c".into(), EdgeType::Similarity, 0.5);
        assert!((scorer.score(&old) - 0.5).abs() < 1e-9);
        assert!((scorer.score(&fresh) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_endpoint_scores_zero() {
        let nodes = vec![doc("a", 0, 0, &[])];
        let scorer = ImportanceScorer::new(&nodes, ImportanceWeights::default(), now());
        let edge = Edge::new("a".into(), "ghost".into(), EdgeType::Similarity, 0.9);
        assert_eq!(scorer.score(&edge), 0.0);
    }

    #[test]
    fn test_huge_interaction_counts_stay_in_range() {
        let nodes = vec![doc("a", 0, u64::MAX, &[]), doc("b", 0, u64::MAX, &[]), doc("c", 0, 3, &[])];
        let weights = ImportanceWeights {
            recency: 0.0,
            strength: 0.0,
            semantic: 0.0,
            interaction: 1.0,
            quality: 0.0,
        };
        let scorer = ImportanceScorer::new(&nodes, weights, now());
        let busy = Edge::new("a".into(), "b".into(), EdgeType::Similarity, 0.5);
        let quiet = Edge::new("a".into(), "c".into(), EdgeType::Similarity, 0.5);
        assert!((scorer.score(&busy) - 1.0).abs() < 1e-9);
        assert!((scorer.score(&quiet) - 0.5).abs() < 1e-9);
    }
}
