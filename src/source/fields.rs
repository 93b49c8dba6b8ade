//! Typed view over a record's open-ended properties
//!
//! Property keys are matched case-insensitively against alias lists, with
//! `-`, `_` and whitespace treated alike. Keys that match nothing are kept
//! verbatim as residual attributes.

use super::SourceRecord;
use crate::graph::{HierarchicalTags, PropertyMap, PropertyValue, TagTier};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Title used when a record has none
pub const UNTITLED: &str = "Untitled Document";

const AI_PRIMITIVE_KEYS: &[&str] = &["ai primitives", "ai primitive", "primitives"];
const TOPICAL_KEYS: &[&str] = &["topics", "topic", "topical"];
const DOMAIN_KEYS: &[&str] = &["domain", "domains", "area"];
const GENERAL_KEYS: &[&str] = &["tags", "tag", "labels", "keywords"];
const TITLE_KEYS: &[&str] = &["title", "name"];
const CONTENT_TYPE_KEYS: &[&str] = &["content type", "type", "format"];
const VENDOR_KEYS: &[&str] = &["vendor", "company", "provider", "source"];
const STATUS_KEYS: &[&str] = &["status", "state"];
const QUALITY_KEYS: &[&str] = &["quality score", "quality", "score"];
const INTERACTION_KEYS: &[&str] = &["interactions", "interaction count", "views"];
const REFERENCE_KEYS: &[&str] = &["references", "related", "relations", "links"];

const RECOGNIZED: &[&[&str]] = &[
    AI_PRIMITIVE_KEYS,
    TOPICAL_KEYS,
    DOMAIN_KEYS,
    GENERAL_KEYS,
    TITLE_KEYS,
    CONTENT_TYPE_KEYS,
    VENDOR_KEYS,
    STATUS_KEYS,
    QUALITY_KEYS,
    INTERACTION_KEYS,
    REFERENCE_KEYS,
];

/// Fields the pipeline understands, extracted from one record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFields {
    pub id: String,
    pub title: String,
    pub url: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub tags: HierarchicalTags,
    pub content_type: Option<String>,
    pub vendor: Option<String>,
    pub status: Option<String>,
    /// Explicit quality score, clamped to 0-100
    pub quality_score: Option<f64>,
    pub interaction_count: u64,
    pub references: Vec<String>,
    /// Properties no alias matched
    pub extra: PropertyMap,
}

impl RecordFields {
    /// Extract fields, substituting defaults for anything missing or malformed.
    /// `now` stands in for unparseable timestamps.
    pub fn extract(record: &SourceRecord, now: DateTime<Utc>) -> Self {
        let props: Vec<(String, PropertyValue)> = record
            .properties
            .iter()
            .map(|(k, v)| (normalize_key(k), PropertyValue::from(v.clone())))
            .collect();

        let find = |aliases: &[&str]| lookup(&props, aliases);
        let text = |aliases: &[&str]| {
            find(aliases)
                .and_then(PropertyValue::as_text)
                .map(|s| s.trim().to_string())
        };

        let mut tags = HierarchicalTags::default();
        for (tier, keys) in [
            (TagTier::AiPrimitive, AI_PRIMITIVE_KEYS),
            (TagTier::Topical, TOPICAL_KEYS),
            (TagTier::Domain, DOMAIN_KEYS),
            (TagTier::General, GENERAL_KEYS),
        ] {
            if let Some(value) = find(keys) {
                let list = tags.tier_mut(tier);
                for tag in value.string_list() {
                    if !list.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                        list.push(tag);
                    }
                }
            }
        }

        let title = record
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| text(TITLE_KEYS))
            .unwrap_or_else(|| UNTITLED.to_string());

        let created_at = parse_time(record.created_time.as_deref(), &record.id, "createdTime")
            .unwrap_or(now);
        let last_updated = parse_time(record.last_edited_time.as_deref(), &record.id, "lastEditedTime")
            .unwrap_or(created_at);

        let quality_score = find(QUALITY_KEYS)
            .and_then(PropertyValue::as_number)
            .filter(|q| q.is_finite())
            .map(|q| q.clamp(0.0, 100.0));

        let interaction_count = find(INTERACTION_KEYS)
            .and_then(PropertyValue::as_number)
            .filter(|n| n.is_finite() && *n > 0.0)
            .map_or(0, |n| n as u64);

        let references = find(REFERENCE_KEYS)
            .map(PropertyValue::string_list)
            .unwrap_or_default();

        let extra = record
            .properties
            .iter()
            .filter(|(k, _)| {
                let key = normalize_key(k);
                !RECOGNIZED.iter().any(|aliases| aliases.contains(&key.as_str()))
            })
            .map(|(k, v)| (k.clone(), PropertyValue::from(v.clone())))
            .collect();

        RecordFields {
            id: record.id.clone(),
            title,
            url: record.url.clone().unwrap_or_default(),
            content: record.content.clone().unwrap_or_default(),
            created_at,
            last_updated,
            tags,
            content_type: text(CONTENT_TYPE_KEYS),
            vendor: text(VENDOR_KEYS),
            status: text(STATUS_KEYS),
            quality_score,
            interaction_count,
            references,
            extra,
        }
    }
}

/// First non-null value whose normalized key equals one of `aliases`,
/// trying aliases in order
fn lookup<'a>(props: &'a [(String, PropertyValue)], aliases: &[&str]) -> Option<&'a PropertyValue> {
    aliases
        .iter()
        .find_map(|alias| props.iter().find(|(k, _)| k == alias).map(|(_, v)| v))
        .filter(|v| !v.is_null())
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_time(raw: Option<&str>, id: &str, field: &str) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            debug!("Record {}: unparseable {} {:?}: {}", id, field, raw, e);
            None
        }
    }
}
