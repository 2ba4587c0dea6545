//! Structured item extraction
//!
//! The `Extractor` collaborator turns fetched page content into records.
//! The bundled `JsonExtractor` handles JSON listings; other strategies plug
//! in through the same trait.

use crate::config::TargetConfig;
use crate::state::CrawlItem;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// What to extract from a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionSpec {
    /// Where the records live in the content
    pub selector: String,

    /// Fields every record must carry
    pub required_fields: Vec<String>,

    /// Fields worth extracting when present
    pub optional_fields: Vec<String>,

    /// Free-form extraction instruction
    pub instruction: String,
}

impl ExtractionSpec {
    pub fn from_target(target: &TargetConfig) -> Self {
        Self {
            selector: target.selector.clone(),
            required_fields: target.required_fields.clone(),
            optional_fields: target.optional_fields.clone(),
            instruction: target.instruction.clone(),
        }
    }
}

/// Content extraction collaborator
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extracts records from `content`
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<CrawlItem>)` - Extracted records, possibly none
    /// * `Err(HarvestError::Parse)` - The content is malformed
    async fn extract(&self, content: &str, spec: &ExtractionSpec) -> Result<Vec<CrawlItem>>;
}

/// Extractor for JSON content
///
/// A selector starting with `/` is a JSON Pointer into the document; an
/// empty selector uses the whole document. The selected value must be an
/// array of objects or a single object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

impl JsonExtractor {
    pub fn new() -> Self {
        Self
    }

    fn select<'a>(document: &'a Value, selector: &str) -> Result<&'a Value> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Ok(document);
        }
        if !selector.starts_with('/') {
            return Err(HarvestError::parse(format!(
                "Unsupported selector '{}': expected a JSON Pointer",
                selector
            )));
        }
        document
            .pointer(selector)
            .ok_or_else(|| HarvestError::parse(format!("Selector '{}' matched nothing", selector)))
    }
}

#[async_trait]
impl Extractor for JsonExtractor {
    async fn extract(&self, content: &str, spec: &ExtractionSpec) -> Result<Vec<CrawlItem>> {
        let document: Value = serde_json::from_str(content)
            .map_err(|e| HarvestError::parse(format!("Error parsing JSON: {}", e)))?;

        let selected = Self::select(&document, &spec.selector)?;

        let records = match selected {
            Value::Array(entries) => entries.clone(),
            Value::Object(_) => vec![selected.clone()],
            other => {
                return Err(HarvestError::parse(format!(
                    "Expected an array of objects, found {}",
                    json_kind(other)
                )))
            }
        };

        records
            .into_iter()
            .enumerate()
            .map(|(index, record)| match record {
                Value::Object(object) => Ok(CrawlItem::from_json_object(object)),
                other => Err(HarvestError::parse(format!(
                    "Record {} is {}, not an object",
                    index,
                    json_kind(&other)
                ))),
            })
            .collect()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
