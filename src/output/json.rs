//! JSON file writer
//!
//! Writes the accumulated items as a pretty-printed JSON array. Every record
//! carries the union of all keys seen in the batch; keys an item lacks are
//! written as empty strings.

use crate::config::OutputConfig;
use crate::output::traits::{union_of_keys, OutputResult, OutputWriter};
use crate::state::CrawlItem;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes result batches to `<directory>/<prefix>[_<timestamp>].json`
#[derive(Debug, Clone)]
pub struct JsonFileWriter {
    directory: PathBuf,
    file_prefix: String,
    timestamp: bool,
}

impl JsonFileWriter {
    pub fn new(directory: impl Into<PathBuf>, file_prefix: impl Into<String>, timestamp: bool) -> Self {
        Self {
            directory: directory.into(),
            file_prefix: file_prefix.into(),
            timestamp,
        }
    }

    /// Creates a writer from the `[output]` config section
    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.directory, &config.file_prefix, config.timestamp)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File name for a batch written now
    pub fn file_name(&self) -> String {
        if self.timestamp {
            format!(
                "{}_{}.json",
                self.file_prefix,
                Local::now().format("%Y%m%d_%H%M%S")
            )
        } else {
            format!("{}.json", self.file_prefix)
        }
    }
}

/// Builds the JSON records for a batch with every key filled in
fn to_records(items: &[CrawlItem]) -> OutputResult<Vec<serde_json::Value>> {
    let keys = union_of_keys(items);

    items
        .iter()
        .map(|item| {
            let mut record = serde_json::Map::new();
            for key in &keys {
                let value = match item.get(key) {
                    Some(v) => serde_json::to_value(v)?,
                    None => serde_json::Value::String(String::new()),
                };
                record.insert(key.clone(), value);
            }
            Ok(serde_json::Value::Object(record))
        })
        .collect()
}

impl OutputWriter for JsonFileWriter {
    fn save(&mut self, items: &[CrawlItem]) -> OutputResult<Vec<PathBuf>> {
        if items.is_empty() {
            tracing::warn!("No data to save to JSON");
            return Ok(Vec::new());
        }

        fs::create_dir_all(&self.directory)?;
        let path = self.directory.join(self.file_name());

        let records = to_records(items)?;
        let body = serde_json::to_string_pretty(&records)?;
        fs::write(&path, body)?;

        tracing::info!("Saved {} records to JSON: {}", items.len(), path.display());
        Ok(vec![path])
    }
}
