//! Graph builder
//!
//! Turns source records into document nodes, optionally derives insight and
//! tag nodes, and generates candidate edges. Pair scoring is the O(n²) part
//! and runs on the rayon pool; output order is fixed by record order.

pub mod insight;

pub use insight::{ExtractedInsight, InsightExtractor, InsightPattern};

use crate::config::TransformationOptions;
use crate::graph::{
    pair_key, DocumentProperties, Edge, EdgeType, InsightProperties, Node, NodeId, NodeMetadata,
    NodeProperties, NodeType, TagProperties, TagTier,
};
use crate::similarity::{effective_quality, SimilarityEngine};
use crate::source::{RecordFields, SourceRecord};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Depth of document nodes
pub const DOCUMENT_DEPTH: u32 = 0;
/// Depth of nodes derived from a document
pub const DERIVED_DEPTH: u32 = 1;

/// Weight of a reference edge
pub const REFERENCE_WEIGHT: f64 = 0.8;
/// Weight of a document-to-insight edge
pub const DERIVATION_WEIGHT: f64 = 0.9;

/// Half-life of the recency term in document strength, in days
const STRENGTH_HALF_LIFE_DAYS: f64 = 90.0;

/// Nodes and candidate edges produced by one build
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Builds nodes and candidate edges from records
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    options: TransformationOptions,
    engine: SimilarityEngine,
    extractor: InsightExtractor,
    now: DateTime<Utc>,
}

impl GraphBuilder {
    pub fn new(options: TransformationOptions, engine: SimilarityEngine) -> Self {
        Self {
            options,
            engine,
            extractor: InsightExtractor::default(),
            now: Utc::now(),
        }
    }

    pub fn with_extractor(mut self, extractor: InsightExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Fix the time recency is measured against
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self.engine = self.engine.with_reference_time(now);
        self
    }

    pub fn build(&self, records: &[SourceRecord]) -> BuildOutput {
        let documents = self.document_nodes(records);
        let mut nodes = documents.clone();
        let mut edges = Vec::new();
        let mut taken: FxHashSet<NodeId> = documents.iter().map(|n| n.id.clone()).collect();

        if self.options.include_insights && self.options.max_depth >= DERIVED_DEPTH {
            let (insights, derivations) = self.insight_nodes(&documents, &mut taken);
            nodes.extend(insights);
            edges.extend(derivations);
        }

        if self.options.include_tags && self.options.max_depth >= DERIVED_DEPTH {
            let (tags, tag_edges) = tag_nodes(&documents, &mut taken);
            nodes.extend(tags);
            edges.extend(tag_edges);
        }

        if self.options.include_references {
            edges.extend(reference_edges(&documents));
        }

        edges.extend(self.similarity_edges(&documents));

        info!(
            "Built {} nodes ({} documents) and {} candidate edges from {} records",
            nodes.len(),
            documents.len(),
            edges.len(),
            records.len()
        );
        BuildOutput { nodes, edges }
    }

    fn document_nodes(&self, records: &[SourceRecord]) -> Vec<Node> {
        let mut seen = FxHashSet::default();
        let mut weak = 0usize;
        let mut nodes = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let mut fields = RecordFields::extract(record, self.now);
            if fields.id.trim().is_empty() {
                fields.id = format!("record-{}", index);
                debug!("Record {} has no id, using {}", index, fields.id);
            }
            if !seen.insert(fields.id.clone()) {
                warn!("Skipping duplicate record id {}", fields.id);
                continue;
            }

            let node = document_node(fields, self.now);
            if node.metadata.strength < self.options.min_strength {
                weak += 1;
                continue;
            }
            nodes.push(node);
        }

        if weak > 0 {
            debug!(
                "Dropped {} documents below min strength {}",
                weak, self.options.min_strength
            );
        }
        nodes
    }

    fn insight_nodes(&self, documents: &[Node], taken: &mut FxHashSet<NodeId>) -> (Vec<Node>, Vec<Edge>) {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for doc in documents {
            for (i, insight) in self.extractor.extract(doc.content()).into_iter().enumerate() {
                let id = claim_id(format!("{}-insight-{}", doc.id, i + 1), taken);
                let tags = doc.tags().into_iter().map(str::to_string).collect();
                let metadata = NodeMetadata::new(
                    doc.metadata.created_at,
                    doc.metadata.last_updated,
                    doc.metadata.strength * 0.8,
                    DERIVED_DEPTH,
                );
                let node = Node::new(
                    id.clone(),
                    truncate_label(&insight.text, 80),
                    NodeType::Insight,
                    NodeProperties::Insight(InsightProperties {
                        source_document: doc.id.clone(),
                        text: insight.text,
                        pattern: insight.pattern,
                        tags,
                    }),
                    metadata,
                );
                edges.push(Edge::new(doc.id.clone(), id, EdgeType::Derivation, DERIVATION_WEIGHT));
                nodes.push(node);
            }
        }
        debug!("Derived {} insight nodes", nodes.len());
        (nodes, edges)
    }

    fn similarity_edges(&self, documents: &[Node]) -> Vec<Edge> {
        let profiles: Vec<_> = documents.par_iter().map(|n| self.engine.profile(n)).collect();
        let threshold = self.engine.config().edge_threshold;
        let n = documents.len();

        let edges: Vec<Edge> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let profiles = &profiles;
                (i + 1..n).filter_map(move |j| {
                    let score = self.engine.score_profiles(&profiles[i], &profiles[j]);
                    (score > 0.0 && score >= threshold).then(|| {
                        Edge::new(
                            documents[i].id.clone(),
                            documents[j].id.clone(),
                            EdgeType::Similarity,
                            score,
                        )
                    })
                })
            })
            .collect();

        debug!(
            "Scored {} document pairs, kept {} similarity edges",
            n * n.saturating_sub(1) / 2,
            edges.len()
        );
        edges
    }
}

/// Document strength in [0, 1]: 0.4 for length (saturating at 2000
/// characters), 0.3 for recency (90-day half-life) and 0.3 for quality.
pub fn document_strength(doc: &DocumentProperties, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let length = (doc.content.chars().count() as f64 / 2000.0).min(1.0);
    let age_days = ((now - created_at).num_seconds() as f64 / 86_400.0).max(0.0);
    let recency = 0.5f64.powf(age_days / STRENGTH_HALF_LIFE_DAYS);
    let quality = effective_quality(doc, created_at, now).value / 100.0;
    length * 0.4 + recency * 0.3 + quality * 0.3
}

fn document_node(fields: RecordFields, now: DateTime<Utc>) -> Node {
    let properties = DocumentProperties {
        url: fields.url,
        content: fields.content,
        content_type: fields.content_type,
        vendor: fields.vendor,
        status: fields.status,
        tags: fields.tags,
        quality_score: fields.quality_score,
        interaction_count: fields.interaction_count,
        references: fields.references,
    };
    let strength = document_strength(&properties, fields.created_at, now);
    let mut node = Node::new(
        fields.id,
        fields.title,
        NodeType::Document,
        NodeProperties::Document(properties),
        NodeMetadata::new(fields.created_at, fields.last_updated, strength, DOCUMENT_DEPTH),
    );
    node.extra = fields.extra;
    node
}

/// Lowercase, hyphen-separated form of a tag
pub fn slugify(tag: &str) -> String {
    tag.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Reserve `base`, or `base-2`, `base-3`, ... when it is already in use
fn claim_id(base: String, taken: &mut FxHashSet<NodeId>) -> NodeId {
    let mut id = NodeId::new(base.as_str());
    let mut n = 2;
    while taken.contains(&id) {
        id = NodeId::new(format!("{}-{}", base, n));
        n += 1;
    }
    taken.insert(id.clone());
    id
}

struct TagGroup<'a> {
    label: &'a str,
    tier: TagTier,
    members: Vec<(&'a NodeId, TagTier)>,
}

/// One node per distinct tag slug, linked to every document carrying it
fn tag_nodes(documents: &[Node], taken: &mut FxHashSet<NodeId>) -> (Vec<Node>, Vec<Edge>) {
    let mut groups: BTreeMap<String, TagGroup<'_>> = BTreeMap::new();
    for doc in documents {
        let Some(props) = doc.as_document() else { continue };
        let mut tiers_seen: FxHashMap<String, TagTier> = FxHashMap::default();
        for tier in TagTier::ALL {
            for tag in props.tags.tier(tier) {
                let slug = slugify(tag);
                if slug.is_empty() {
                    continue;
                }
                tiers_seen.entry(slug.clone()).or_insert(tier);
                groups.entry(slug).or_insert_with(|| TagGroup {
                    label: tag,
                    tier,
                    members: Vec::new(),
                });
            }
        }
        for (slug, tier) in tiers_seen {
            if let Some(group) = groups.get_mut(&slug) {
                group.tier = group.tier.min(tier);
                group.members.push((&doc.id, tier));
            }
        }
    }

    let max_count = groups.values().map(|g| g.members.len()).max().unwrap_or(1).max(1);
    let mut nodes = Vec::with_capacity(groups.len());
    let mut edges = Vec::new();

    for (slug, mut group) in groups {
        group.members.sort_by(|a, b| a.0.cmp(b.0));
        let id = if taken.contains(&NodeId::new(slug.as_str())) {
            claim_id(format!("tag-{}", slug), taken)
        } else {
            claim_id(slug.clone(), taken)
        };

        let member_docs: Vec<&Node> = documents
            .iter()
            .filter(|d| group.members.iter().any(|(m, _)| *m == &d.id))
            .collect();
        let created = member_docs.iter().map(|d| d.metadata.created_at).min().unwrap_or_else(Utc::now);
        let updated = member_docs.iter().map(|d| d.metadata.last_updated).max().unwrap_or(created);
        let strength = 0.3 + 0.7 * group.members.len() as f64 / max_count as f64;

        for (doc_id, tier) in &group.members {
            edges.push(
                Edge::new(id.clone(), (*doc_id).clone(), EdgeType::Tag, tier.edge_weight())
                    .with_property("tier", tier.as_str()),
            );
        }

        nodes.push(Node::new(
            id,
            group.label,
            NodeType::Tag,
            NodeProperties::Tag(TagProperties {
                tag: group.label.to_string(),
                tier: group.tier,
                document_count: group.members.len(),
            }),
            NodeMetadata::new(created, updated, strength, DERIVED_DEPTH),
        ));
    }
    debug!("Derived {} tag nodes with {} tag edges", nodes.len(), edges.len());
    (nodes, edges)
}

/// Reference edges between documents, one per unordered pair
fn reference_edges(documents: &[Node]) -> Vec<Edge> {
    let ids: FxHashSet<&NodeId> = documents.iter().map(|d| &d.id).collect();
    let mut seen: FxHashSet<(NodeId, NodeId)> = FxHashSet::default();
    let mut edges = Vec::new();
    let mut unresolved = 0usize;

    for doc in documents {
        let Some(props) = doc.as_document() else { continue };
        for reference in &props.references {
            let target = NodeId::new(reference.trim());
            if target == doc.id {
                continue;
            }
            if !ids.contains(&target) {
                unresolved += 1;
                continue;
            }
            let (a, b) = pair_key(&doc.id, &target);
            if seen.insert((a.clone(), b.clone())) {
                edges.push(Edge::new(doc.id.clone(), target, EdgeType::Reference, REFERENCE_WEIGHT));
            }
        }
    }
    if unresolved > 0 {
        debug!("{} references point outside the document set", unresolved);
    }
    edges
}

fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut label: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    label.push_str("...");
    label
}
