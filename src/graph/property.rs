//! Open-ended property values carried by records, nodes and edges
//!
//! Record properties arrive as arbitrary JSON. The fields the pipeline
//! understands are lifted into typed structs; everything else stays here so
//! it survives a round trip to the export collaborators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Property value type supporting multiple data types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
    Null,
}

impl PropertyValue {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Get string value if this is a string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get integer value if this is an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get float value if this is a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get boolean value if this is a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get array value if this is an array
    pub fn as_array(&self) -> Option<&Vec<PropertyValue>> {
        match self {
            PropertyValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Get map value if this is a map
    pub fn as_map(&self) -> Option<&BTreeMap<String, PropertyValue>> {
        match self {
            PropertyValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Numeric value, accepting integers, floats, numeric strings and
    /// `{ "number": .. }` wrappers
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Integer(i) => Some(*i as f64),
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::String(s) => s.trim().parse::<f64>().ok(),
            PropertyValue::Map(map) => map.get("number").and_then(PropertyValue::as_number),
            _ => None,
        }
    }

    /// Single text value: a string, or the `name`/`select`/`text` of a wrapper map
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s.as_str()).filter(|s| !s.trim().is_empty()),
            PropertyValue::Map(map) => ["name", "select", "status", "text", "title"]
                .iter()
                .find_map(|k| map.get(*k).and_then(PropertyValue::as_text)),
            PropertyValue::Array(arr) => arr.iter().find_map(PropertyValue::as_text),
            _ => None,
        }
    }

    /// Flatten into a list of non-empty strings.
    ///
    /// Accepts arrays of strings, arrays of `{ "name": .. }` objects,
    /// comma-separated strings and `{ "multi_select": [..] }` wrappers.
    pub fn string_list(&self) -> Vec<String> {
        match self {
            PropertyValue::String(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            PropertyValue::Array(arr) => arr
                .iter()
                .filter_map(|v| v.as_text().map(|s| s.trim().to_string()))
                .filter(|s| !s.is_empty())
                .collect(),
            PropertyValue::Map(map) => ["multi_select", "relation", "values"]
                .iter()
                .find_map(|k| map.get(*k))
                .map(PropertyValue::string_list)
                .or_else(|| self.as_text().map(|s| vec![s.trim().to_string()]))
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Get type name as string
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "String",
            PropertyValue::Integer(_) => "Integer",
            PropertyValue::Float(_) => "Float",
            PropertyValue::Boolean(_) => "Boolean",
            PropertyValue::Array(_) => "Array",
            PropertyValue::Map(_) => "Map",
            PropertyValue::Null => "Null",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "\"{}\"", s),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Float(fl) => write!(f, "{}", fl),
            PropertyValue::Boolean(b) => write!(f, "{}", b),
            PropertyValue::Array(arr) => {
                write!(f, "[")?;
                for (i, val) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", val)?;
                }
                write!(f, "]")
            }
            PropertyValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, val)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, val)?;
                }
                write!(f, "}}")
            }
            PropertyValue::Null => write!(f, "null"),
        }
    }
}

// Convenience conversions
impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(arr: Vec<PropertyValue>) -> Self {
        PropertyValue::Array(arr)
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PropertyValue::Null,
            serde_json::Value::Bool(b) => PropertyValue::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Integer(i),
                None => PropertyValue::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => PropertyValue::String(s),
            serde_json::Value::Array(arr) => {
                PropertyValue::Array(arr.into_iter().map(PropertyValue::from).collect())
            }
            serde_json::Value::Object(map) => PropertyValue::Map(
                map.into_iter().map(|(k, v)| (k, PropertyValue::from(v))).collect(),
            ),
        }
    }
}

/// Property map for residual node and edge attributes
pub type PropertyMap = BTreeMap<String, PropertyValue>;
