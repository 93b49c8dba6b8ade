//! Heuristic insight extraction
//!
//! An ordered list of regex patterns; each pattern's first capture group is
//! the insight text. Earlier patterns win when two capture the same text.
//! This is pattern matching, not language understanding.

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    ("key-insight", r"(?i)\bkey\s+insights?\s*:\s*([^.!?\n]+)"),
    ("important", r"(?i)\bimportant(?:ly)?\s*:\s*([^.!?\n]+)"),
    ("conclusion", r"(?i)\bconclusions?\s*:\s*([^.!?\n]+)"),
];

static DEFAULTS: OnceLock<Vec<InsightPattern>> = OnceLock::new();

/// Insights shorter than this (in characters) are ignored
pub const MIN_INSIGHT_CHARS: usize = 8;

/// A named extraction pattern
#[derive(Debug, Clone)]
pub struct InsightPattern {
    pub name: String,
    regex: Regex,
}

impl InsightPattern {
    /// Compile a pattern. The first capture group is taken as the insight.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
        })
    }
}

/// One extracted insight
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedInsight {
    /// Name of the pattern that matched
    pub pattern: String,
    pub text: String,
}

/// Ordered pattern matcher
#[derive(Debug, Clone)]
pub struct InsightExtractor {
    patterns: Vec<InsightPattern>,
    max_per_document: usize,
}

impl Default for InsightExtractor {
    fn default() -> Self {
        let patterns = DEFAULTS.get_or_init(|| {
            DEFAULT_PATTERNS
                .iter()
                .filter_map(|(name, pattern)| match InsightPattern::new(*name, pattern) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        warn!("Skipping insight pattern {}: {}", name, e);
                        None
                    }
                })
                .collect()
        });
        Self {
            patterns: patterns.clone(),
            max_per_document: 5,
        }
    }
}

impl InsightExtractor {
    /// Extractor with no patterns
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            max_per_document: 5,
        }
    }

    /// Append a pattern after the existing ones
    pub fn with_pattern(mut self, pattern: InsightPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn with_max_per_document(mut self, max: usize) -> Self {
        self.max_per_document = max;
        self
    }

    pub fn patterns(&self) -> &[InsightPattern] {
        &self.patterns
    }

    /// Insights found in `text`, in pattern order then position order,
    /// deduplicated case-insensitively
    pub fn extract(&self, text: &str) -> Vec<ExtractedInsight> {
        let mut found: Vec<ExtractedInsight> = Vec::new();
        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                if found.len() >= self.max_per_document {
                    return found;
                }
                let Some(m) = caps.get(1) else { continue };
                let insight = m.as_str().trim();
                if insight.chars().count() < MIN_INSIGHT_CHARS {
                    continue;
                }
                if found.iter().any(|f| f.text.eq_ignore_ascii_case(insight)) {
                    continue;
                }
                found.push(ExtractedInsight {
                    pattern: pattern.name.clone(),
                    text: insight.to_string(),
                });
            }
        }
        found
    }
}
