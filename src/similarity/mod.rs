//! Multi-factor similarity between two nodes
//!
//! Six independent factors are computed, each gated by its own threshold.
//! Only factors at or above their threshold take part in the weighted
//! average, which is then raised to `exponent` and zeroed below `min_score`.
//! Scoring is symmetric: `score(a, b) == score(b, a)`.

pub mod quality;
pub mod text;
pub mod vendor;

pub use quality::{effective_quality, QualityScore};

use crate::cache::TtlLruCache;
use crate::graph::{clamp_unit, Node, NodeType, TagTier};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pairwise similarity cache, keyed by the canonical (min, max) profile keys
pub type SimilarityCache = TtlLruCache<(String, String), f64>;

/// One value per similarity factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityFactors {
    pub content: f64,
    pub tag: f64,
    pub temporal: f64,
    pub semantic: f64,
    pub quality: f64,
    pub vendor: f64,
}

impl SimilarityFactors {
    pub const ZERO: SimilarityFactors = SimilarityFactors {
        content: 0.0,
        tag: 0.0,
        temporal: 0.0,
        semantic: 0.0,
        quality: 0.0,
        vendor: 0.0,
    };

    /// Default factor weights
    pub fn default_weights() -> Self {
        SimilarityFactors {
            content: 0.30,
            tag: 0.25,
            temporal: 0.15,
            semantic: 0.15,
            quality: 0.10,
            vendor: 0.05,
        }
    }

    /// Default per-factor thresholds
    pub fn default_thresholds() -> Self {
        SimilarityFactors {
            content: 0.02,
            tag: 0.1,
            temporal: 0.05,
            semantic: 0.1,
            quality: 0.1,
            vendor: 0.3,
        }
    }

    /// `(name, value)` pairs in a fixed order
    pub fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("content", self.content),
            ("tag", self.tag),
            ("temporal", self.temporal),
            ("semantic", self.semantic),
            ("quality", self.quality),
            ("vendor", self.vendor),
        ]
    }
}

/// Similarity engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimilarityConfig {
    pub weights: SimilarityFactors,
    pub thresholds: SimilarityFactors,
    /// Exponent applied to the normalized score
    pub exponent: f64,
    /// Combined scores below this are reported as 0
    pub min_score: f64,
    /// Minimum combined score for a candidate similarity edge
    pub edge_threshold: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            weights: SimilarityFactors::default_weights(),
            thresholds: SimilarityFactors::default_thresholds(),
            exponent: 1.5,
            min_score: 0.1,
            edge_threshold: 0.15,
        }
    }
}

/// Per-factor scores and the combined result for one pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityBreakdown {
    pub factors: SimilarityFactors,
    pub combined: f64,
}

impl SimilarityBreakdown {
    /// Name of the factor with the largest weighted contribution
    pub fn dominant_factor(&self, weights: &SimilarityFactors) -> Option<&'static str> {
        self.factors
            .named()
            .into_iter()
            .zip(weights.named())
            .map(|((name, value), (_, weight))| (name, value * weight))
            .filter(|(_, contribution)| *contribution > 0.0)
            .fold(None, |best: Option<(&'static str, f64)>, (name, c)| match best {
                Some((_, b)) if b >= c => best,
                _ => Some((name, c)),
            })
            .map(|(name, _)| name)
    }
}

/// Everything the factors need from a node, computed once per node
#[derive(Debug, Clone)]
pub struct NodeProfile {
    /// Identity plus last-update time; two profiles with the same key score
    /// identically
    pub key: String,
    pub node_type: NodeType,
    features: FxHashSet<String>,
    char_len: usize,
    tiers: [FxHashSet<String>; 4],
    title: FxHashSet<String>,
    content_type: Option<String>,
    vendor: Option<String>,
    quality: Option<QualityScore>,
    created_at: DateTime<Utc>,
}

/// Scores node pairs. Cheap to clone; the optional cache is shared.
#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    config: SimilarityConfig,
    reference_time: DateTime<Utc>,
    cache: Option<Arc<SimilarityCache>>,
}

impl SimilarityEngine {
    pub fn new(config: SimilarityConfig) -> Self {
        Self {
            config,
            reference_time: Utc::now(),
            cache: None,
        }
    }

    /// Fix the "now" used by recency-dependent fallback quality
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = now;
        self
    }

    pub fn with_cache(mut self, cache: Arc<SimilarityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Extract the features of one node
    pub fn profile(&self, node: &Node) -> NodeProfile {
        let content = node.content();
        let mut tiers: [FxHashSet<String>; 4] = Default::default();
        let (content_type, vendor, quality) = match node.as_document() {
            Some(doc) => {
                for (slot, tier) in tiers.iter_mut().zip(TagTier::ALL) {
                    *slot = doc.tags.tier(tier).iter().map(|t| t.to_lowercase()).collect();
                }
                (
                    doc.content_type.as_ref().map(|c| c.trim().to_lowercase()),
                    doc.vendor.clone(),
                    Some(effective_quality(doc, node.metadata.created_at, self.reference_time)),
                )
            }
            None => {
                tiers[TagTier::General as usize] =
                    node.tags().into_iter().map(str::to_lowercase).collect();
                (None, None, None)
            }
        };

        NodeProfile {
            key: format!("{}@{}", node.id, node.metadata.last_updated.timestamp_millis()),
            node_type: node.node_type,
            features: text::feature_set(content),
            char_len: content.chars().count(),
            tiers,
            title: text::title_tokens(&node.label),
            content_type,
            vendor,
            quality,
            created_at: node.metadata.created_at,
        }
    }

    /// Combined similarity of two nodes
    pub fn score(&self, a: &Node, b: &Node) -> f64 {
        self.score_profiles(&self.profile(a), &self.profile(b))
    }

    /// Combined similarity of two profiled nodes, consulting the cache
    pub fn score_profiles(&self, a: &NodeProfile, b: &NodeProfile) -> f64 {
        let Some(cache) = &self.cache else {
            return self.breakdown(a, b).combined;
        };
        let key = if a.key <= b.key {
            (a.key.clone(), b.key.clone())
        } else {
            (b.key.clone(), a.key.clone())
        };
        if let Some(score) = cache.get(&key) {
            return score;
        }
        let score = self.breakdown(a, b).combined;
        cache.insert(key, score);
        score
    }

    /// Every factor plus the combined score, uncached
    pub fn breakdown(&self, a: &NodeProfile, b: &NodeProfile) -> SimilarityBreakdown {
        let factors = SimilarityFactors {
            content: gate(
                text::content_similarity(&a.features, a.char_len, &b.features, b.char_len),
                self.config.thresholds.content,
            ),
            tag: gate(tag_similarity(&a.tiers, &b.tiers), self.config.thresholds.tag),
            temporal: gate(
                temporal_similarity(a.created_at, b.created_at),
                self.config.thresholds.temporal,
            ),
            semantic: gate(semantic_similarity(a, b), self.config.thresholds.semantic),
            quality: gate(
                match (a.quality, b.quality) {
                    (Some(qa), Some(qb)) => quality::quality_similarity(qa, qb),
                    _ => 0.0,
                },
                self.config.thresholds.quality,
            ),
            vendor: gate(
                match (&a.vendor, &b.vendor) {
                    (Some(va), Some(vb)) => vendor::vendor_similarity(va, vb),
                    _ => 0.0,
                },
                self.config.thresholds.vendor,
            ),
        };

        SimilarityBreakdown {
            factors,
            combined: self.combine(&factors),
        }
    }

    fn combine(&self, factors: &SimilarityFactors) -> f64 {
        let (mut weighted, mut total_weight) = (0.0, 0.0);
        for ((_, value), (_, weight)) in factors.named().into_iter().zip(self.config.weights.named()) {
            if value > 0.0 {
                weighted += value * weight;
                total_weight += weight;
            }
        }
        if total_weight <= 0.0 {
            return 0.0;
        }
        let score = (weighted / total_weight).powf(self.config.exponent);
        if score < self.config.min_score {
            0.0
        } else {
            clamp_unit(score)
        }
    }
}

fn gate(value: f64, threshold: f64) -> f64 {
    if value.is_finite() && value >= threshold {
        value
    } else {
        0.0
    }
}

/// Weight-normalized Jaccard over the tiers that share at least one tag
pub fn tag_similarity(a: &[FxHashSet<String>; 4], b: &[FxHashSet<String>; 4]) -> f64 {
    let (mut weighted, mut total_weight) = (0.0, 0.0);
    for ((sa, sb), tier) in a.iter().zip(b.iter()).zip(TagTier::ALL) {
        let shared = sa.intersection(sb).count();
        if shared == 0 {
            continue;
        }
        let weight = tier.similarity_weight();
        weighted += weight * text::jaccard(sa, sb);
        total_weight += weight;
    }
    if total_weight > 0.0 {
        weighted / total_weight
    } else {
        0.0
    }
}

/// Step function on the creation-time gap
pub fn temporal_similarity(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    const MINUTE_MS: i64 = 60_000;
    let gap = (a - b).num_milliseconds().abs();
    match gap {
        g if g <= 30 * MINUTE_MS => 0.7,
        g if g <= 120 * MINUTE_MS => 0.4,
        g if g <= 360 * MINUTE_MS => 0.2,
        g if g <= 1440 * MINUTE_MS => 0.05,
        _ => 0.0,
    }
}

fn semantic_similarity(a: &NodeProfile, b: &NodeProfile) -> f64 {
    let mut score = 0.0;
    if let (Some(ca), Some(cb)) = (&a.content_type, &b.content_type) {
        if !ca.is_empty() && ca == cb {
            score += 0.2;
        }
    }
    let title_overlap = text::jaccard(&a.title, &b.title);
    if title_overlap >= 0.3 {
        score += 0.5 * title_overlap;
    }
    let domain = TagTier::Domain as usize;
    if a.tiers[domain].intersection(&b.tiers[domain]).next().is_some() {
        score += 0.15;
    }
    score.min(0.7)
}
