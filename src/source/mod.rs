//! Content source boundary
//!
//! The pipeline is agnostic to where records come from. A `ContentSource`
//! hands over raw records and answers "has anything changed since T?".

pub mod fields;

pub use fields::RecordFields;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

/// Source errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Remote fetch failed
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Local I/O failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Payload could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        SourceError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// A raw content record as delivered by a source adapter.
///
/// Every field is optional on the wire; missing or malformed values are
/// defaulted during extraction instead of failing the build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Kept in record order
    #[serde(default)]
    pub properties: IndexMap<String, serde_json::Value>,
    /// RFC 3339 timestamp
    #[serde(default)]
    pub created_time: Option<String>,
    /// RFC 3339 timestamp
    #[serde(default)]
    pub last_edited_time: Option<String>,
}

impl SourceRecord {
    /// Convenience constructor used by adapters and tests
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        SourceRecord {
            id: id.into(),
            title: Some(title.into()),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_created(mut self, at: DateTime<Utc>) -> Self {
        self.created_time = Some(at.to_rfc3339());
        self
    }

    pub fn with_last_edited(mut self, at: DateTime<Utc>) -> Self {
        self.last_edited_time = Some(at.to_rfc3339());
        self
    }
}

/// Supplier of records
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch the full record set
    async fn fetch_records(&self) -> SourceResult<Vec<SourceRecord>>;

    /// Whether the source data changed after `since`
    async fn has_changed(&self, _since: DateTime<Utc>) -> SourceResult<bool> {
        Ok(false)
    }

    /// Name used in logs
    fn name(&self) -> &str {
        "source"
    }
}

/// In-memory record set. Replacing the records marks the source as changed.
#[derive(Debug, Default)]
pub struct StaticSource {
    state: RwLock<(Vec<SourceRecord>, DateTime<Utc>)>,
}

impl StaticSource {
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self {
            state: RwLock::new((records, Utc::now())),
        }
    }

    /// Swap in a new record set
    pub fn replace_records(&self, records: Vec<SourceRecord>) {
        if let Ok(mut state) = self.state.write() {
            *state = (records, Utc::now());
        }
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    async fn fetch_records(&self) -> SourceResult<Vec<SourceRecord>> {
        self.state
            .read()
            .map(|state| state.0.clone())
            .map_err(|e| SourceError::FetchFailed(e.to_string()))
    }

    async fn has_changed(&self, since: DateTime<Utc>) -> SourceResult<bool> {
        self.state
            .read()
            .map(|state| state.1 > since)
            .map_err(|e| SourceError::FetchFailed(e.to_string()))
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Records read from a JSON file holding an array of records.
/// Change detection uses the file's modification time.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContentSource for JsonFileSource {
    async fn fetch_records(&self) -> SourceResult<Vec<SourceRecord>> {
        let bytes = tokio::fs::read(&self.path).await?;
        let records: Vec<SourceRecord> = serde_json::from_slice(&bytes)?;
        debug!("Read {} records from {:?}", records.len(), self.path);
        Ok(records)
    }

    async fn has_changed(&self, since: DateTime<Utc>) -> SourceResult<bool> {
        let modified = tokio::fs::metadata(&self.path).await?.modified()?;
        Ok(DateTime::<Utc>::from(modified) > since)
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_tolerates_missing_and_null_fields() {
        let records: Vec<SourceRecord> = serde_json::from_value(json!([
            {"id": "a", "title": null, "properties": {"Tags": ["AI"]}},
            {"id": "b", "createdTime": "not a date"}
        ]))
        .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].title.is_none());
        assert!(records[1].content.is_none());
        assert_eq!(records[1].created_time.as_deref(), Some("not a date"));
    }

    #[tokio::test]
    async fn test_static_source_change_detection() {
        let source = StaticSource::new(vec![SourceRecord::new("a", "A", "")]);
        let before = Utc::now();
        assert!(!source.has_changed(before).await.unwrap());

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        source.replace_records(vec![]);
        assert!(source.has_changed(before).await.unwrap());
        assert!(source.fetch_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, r#"[{"id": "x", "title": "X", "content": "hello"}]"#).unwrap();

        let source = JsonFileSource::new(&path);
        let records = source.fetch_records().await.unwrap();
        assert_eq!(records[0].id, "x");

        let missing = JsonFileSource::new(dir.path().join("missing.json"));
        assert!(matches!(missing.fetch_records().await, Err(SourceError::Io(_))));
    }
}
