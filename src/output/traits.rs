//! Output writer trait and types
//!
//! This module defines the trait interface for result writers and the
//! errors they can produce.

use crate::state::CrawlItem;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for OutputError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(err.to_string())
    }
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for result writers
///
/// A writer receives the accumulated valid items of a crawl exactly once,
/// when the crawl ends. Items may carry different sets of keys; writers are
/// expected to emit the union of all keys and leave missing values empty.
pub trait OutputWriter: Send {
    /// Persists a batch of items
    ///
    /// # Arguments
    ///
    /// * `items` - Accumulated valid items, in acceptance order
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<PathBuf>)` - Locations written (empty if nothing was written)
    /// * `Err(OutputError)` - Failed to persist the batch
    fn save(&mut self, items: &[CrawlItem]) -> OutputResult<Vec<PathBuf>>;
}

/// Union of the keys of every item, sorted
pub fn union_of_keys(items: &[CrawlItem]) -> Vec<String> {
    let mut keys: Vec<String> = items
        .iter()
        .flat_map(|item| item.keys().map(String::from))
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_of_keys() {
        let items = vec![
            CrawlItem::from_pairs([("title", "A"), ("price", "1")]),
            CrawlItem::from_pairs([("title", "B"), ("rating", "5")]),
        ];

        assert_eq!(union_of_keys(&items), vec!["price", "rating", "title"]);
        assert!(union_of_keys(&[]).is_empty());
    }

    #[test]
    fn test_json_error_maps_to_format() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(OutputError::from(err), OutputError::Format(_)));
    }
}
