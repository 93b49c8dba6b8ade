//! Tiered tag model
//!
//! Records carry tags in four tiers of decreasing specificity. Similarity
//! scoring and tag edges weight each tier differently.

use serde::{Deserialize, Serialize};

/// Tag tier, most specific first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum TagTier {
    AiPrimitive,
    Topical,
    Domain,
    General,
}

impl TagTier {
    pub const ALL: [TagTier; 4] = [
        TagTier::AiPrimitive,
        TagTier::Topical,
        TagTier::Domain,
        TagTier::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagTier::AiPrimitive => "ai-primitive",
            TagTier::Topical => "topical",
            TagTier::Domain => "domain",
            TagTier::General => "general",
        }
    }

    /// Weight of this tier in tag similarity
    pub fn similarity_weight(&self) -> f64 {
        match self {
            TagTier::AiPrimitive => 1.0,
            TagTier::Topical => 0.8,
            TagTier::Domain => 0.6,
            TagTier::General => 0.4,
        }
    }

    /// Weight of a tag-node edge reaching a document through this tier
    pub fn edge_weight(&self) -> f64 {
        match self {
            TagTier::AiPrimitive => 0.9,
            TagTier::Topical => 0.8,
            TagTier::Domain => 0.7,
            TagTier::General => 0.4,
        }
    }
}

/// Tags of one document, grouped by tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalTags {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ai_primitives: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topical: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub general: Vec<String>,
}

impl HierarchicalTags {
    pub fn tier(&self, tier: TagTier) -> &[String] {
        match tier {
            TagTier::AiPrimitive => &self.ai_primitives,
            TagTier::Topical => &self.topical,
            TagTier::Domain => &self.domain,
            TagTier::General => &self.general,
        }
    }

    pub fn tier_mut(&mut self, tier: TagTier) -> &mut Vec<String> {
        match tier {
            TagTier::AiPrimitive => &mut self.ai_primitives,
            TagTier::Topical => &mut self.topical,
            TagTier::Domain => &mut self.domain,
            TagTier::General => &mut self.general,
        }
    }

    pub fn is_empty(&self) -> bool {
        TagTier::ALL.iter().all(|t| self.tier(*t).is_empty())
    }

    /// All tags, most specific tier first, duplicates (case-insensitive) removed
    pub fn flatten(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        TagTier::ALL
            .iter()
            .flat_map(|t| self.tier(*t).iter())
            .filter(|tag| seen.insert(tag.to_lowercase()))
            .map(String::as_str)
            .collect()
    }

    /// Most specific tier containing `label` (case-insensitive)
    pub fn tier_of(&self, label: &str) -> Option<TagTier> {
        let needle = label.to_lowercase();
        TagTier::ALL
            .into_iter()
            .find(|t| self.tier(*t).iter().any(|tag| tag.to_lowercase() == needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HierarchicalTags {
        HierarchicalTags {
            ai_primitives: vec!["Agents".into()],
            topical: vec!["AI".into(), "Retrieval".into()],
            domain: vec!["Research".into()],
            general: vec!["ai".into(), "reading".into()],
        }
    }

    #[test]
    fn test_tier_of_prefers_most_specific() {
        let tags = sample();
        assert_eq!(tags.tier_of("ai"), Some(TagTier::Topical));
        assert_eq!(tags.tier_of("AGENTS"), Some(TagTier::AiPrimitive));
        assert_eq!(tags.tier_of("reading"), Some(TagTier::General));
        assert_eq!(tags.tier_of("missing"), None);
    }

    #[test]
    fn test_flatten_dedupes_case_insensitively() {
        let tags = sample();
        assert_eq!(tags.flatten(), vec!["Agents", "AI", "Retrieval", "Research", "reading"]);
        assert!(!tags.is_empty());
        assert!(HierarchicalTags::default().is_empty());
    }

    #[test]
    fn test_tier_weights_are_ordered() {
        let weights: Vec<f64> = TagTier::ALL.iter().map(|t| t.edge_weight()).collect();
        assert!(weights.windows(2).all(|w| w[0] > w[1]));
    }
}
