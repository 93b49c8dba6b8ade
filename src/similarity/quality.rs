//! Quality scores and quality similarity
//!
//! Documents without an explicit quality score get a heuristic fallback in
//! 0-100 built from length, tag richness, content type, vendor, status and
//! recency.

use crate::graph::DocumentProperties;
use chrono::{DateTime, Utc};

/// Starting point of the fallback score
pub const FALLBACK_BASE: f64 = 40.0;

/// Below this either side contributes no quality similarity
pub const MIN_COMPARABLE_QUALITY: f64 = 30.0;

/// Quality used for nodes that are not documents
pub const NEUTRAL_QUALITY: f64 = 50.0;

/// A quality score and whether it came from the record itself
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityScore {
    pub value: f64,
    pub explicit: bool,
}

/// Explicit score when present, fallback otherwise
pub fn effective_quality(
    doc: &DocumentProperties,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> QualityScore {
    match doc.quality_score {
        Some(value) => QualityScore {
            value: value.clamp(0.0, 100.0),
            explicit: true,
        },
        None => QualityScore {
            value: fallback_quality(doc, created_at, now),
            explicit: false,
        },
    }
}

/// Heuristic quality in [0, 100]
pub fn fallback_quality(doc: &DocumentProperties, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let mut score = FALLBACK_BASE;

    let chars = doc.content.chars().count();
    score += match chars {
        c if c >= 3000 => 15.0,
        c if c >= 1000 => 10.0,
        c if c >= 300 => 5.0,
        _ => 0.0,
    };

    score += (doc.tags.flatten().len() as f64 * 2.0).min(10.0);

    if let Some(content_type) = &doc.content_type {
        score += content_type_bonus(content_type);
    }
    if let Some(vendor) = &doc.vendor {
        score += super::vendor::trust_bonus(vendor);
    }
    if let Some(status) = &doc.status {
        score += status_bonus(status);
    }

    let age_days = (now - created_at).num_days();
    if (0..=30).contains(&age_days) {
        score += 7.0;
    } else if (0..=180).contains(&age_days) {
        score += 3.0;
    }

    score.clamp(0.0, 100.0)
}

fn content_type_bonus(content_type: &str) -> f64 {
    let ct = content_type.to_lowercase();
    if ["research", "paper", "study"].iter().any(|k| ct.contains(k)) {
        10.0
    } else if ["article", "guide", "tutorial", "documentation"].iter().any(|k| ct.contains(k)) {
        6.0
    } else if ["note", "summary"].iter().any(|k| ct.contains(k)) {
        3.0
    } else {
        0.0
    }
}

fn status_bonus(status: &str) -> f64 {
    match status.trim().to_lowercase().as_str() {
        "published" | "complete" | "completed" | "done" | "reviewed" => 10.0,
        "in progress" | "draft" => 3.0,
        "archived" => -5.0,
        _ => 0.0,
    }
}

/// `1 - |Δ| / maxDiff`, scaled by 0.6 when both scores are explicit and by
/// 0.4 otherwise. `maxDiff` is 20 for two explicit scores and 30 otherwise.
pub fn quality_similarity(a: QualityScore, b: QualityScore) -> f64 {
    if a.value < MIN_COMPARABLE_QUALITY || b.value < MIN_COMPARABLE_QUALITY {
        return 0.0;
    }
    let (max_diff, scale) = if a.explicit && b.explicit {
        (20.0, 0.6)
    } else {
        (30.0, 0.4)
    };
    let diff = (a.value - b.value).abs();
    (1.0 - diff / max_diff).max(0.0) * scale
}
