//! Extracted record types
//!
//! A [`CrawlItem`] is an ordered mapping from field name to a tagged scalar.
//! Items are validated structurally against a [`RequiredSchema`] rather than
//! deserialized into a fixed struct, because every crawl target carries a
//! different set of fields.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the boolean marker some extractors attach to every record
pub const ERROR_MARKER_FIELD: &str = "error";

/// A single scalar field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    /// Explicit null / missing value
    Absent,
}

impl FieldValue {
    /// Converts a JSON value, flattening arrays and objects to their JSON text
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Absent,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::Text(s),
            nested => Self::Text(nested.to_string()),
        }
    }

    /// Returns true if the value carries no usable data
    ///
    /// Absent values and blank strings are empty; numbers and booleans
    /// (including zero and false) are not.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
            Self::Absent => Ok(()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

/// One extracted record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrawlItem {
    fields: IndexMap<String, FieldValue>,
}

impl CrawlItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an item from `(name, value)` pairs, keeping their order
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect()
    }

    /// Builds an item from a JSON object
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        object
            .into_iter()
            .map(|(k, v)| (k, FieldValue::from_json(v)))
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns true if `name` is present with a non-empty value
    pub fn has_value(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|v| !v.is_empty())
    }

    /// Identity value used for deduplication, if present and non-empty
    pub fn identity(&self, field: &str) -> Option<String> {
        self.fields
            .get(field)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    }

    /// Drops a boolean `error = false` marker
    ///
    /// Returns true if the marker was present and removed. An `error = true`
    /// field is data and is kept.
    pub fn strip_error_marker(&mut self) -> bool {
        if self.fields.get(ERROR_MARKER_FIELD).and_then(FieldValue::as_bool) == Some(false) {
            self.fields.shift_remove(ERROR_MARKER_FIELD);
            true
        } else {
            false
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for CrawlItem {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Fields an item must carry, non-empty, to be accepted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredSchema {
    fields: Vec<String>,
}

impl RequiredSchema {
    /// Creates a schema, dropping repeated names while keeping first-seen order
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        Self { fields: unique }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Required fields that are absent or empty on `item`, in schema order
    pub fn missing<'a>(&'a self, item: &CrawlItem) -> Vec<&'a str> {
        self.fields
            .iter()
            .filter(|f| !item.has_value(f))
            .map(String::as_str)
            .collect()
    }

    pub fn is_satisfied_by(&self, item: &CrawlItem) -> bool {
        self.fields.iter().all(|f| item.has_value(f))
    }
}
