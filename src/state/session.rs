//! Transient state of one crawl run
//!
//! The session owns the seen-identity set and the accumulated valid items.
//! It is created when a crawl starts and consumed when its items are flushed.

use crate::state::item::{CrawlItem, RequiredSchema};
use std::collections::HashSet;

/// Outcome of running one item through the validation pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemVerdict {
    /// Accepted and appended to the session
    Valid,

    /// Identity field absent or empty
    MissingIdentity,

    /// One or more required fields absent or empty
    MissingFields(Vec<String>),

    /// Identity value already accepted earlier in this run
    Duplicate(String),
}

impl ItemVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Returns true if this verdict counts as a failed item
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::MissingIdentity | Self::MissingFields(_))
    }
}

/// Per-page classification counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCounts {
    /// Items returned by the extractor
    pub new_items: u64,
    pub valid_items: u64,
    pub failed_items: u64,
    pub duplicate_items: u64,
}

impl PageCounts {
    fn record(&mut self, verdict: &ItemVerdict) {
        self.new_items += 1;
        match verdict {
            ItemVerdict::Valid => self.valid_items += 1,
            ItemVerdict::MissingIdentity | ItemVerdict::MissingFields(_) => {
                self.failed_items += 1
            }
            ItemVerdict::Duplicate(_) => self.duplicate_items += 1,
        }
    }
}

/// State of a single crawl run
#[derive(Debug)]
pub struct Session {
    identity_field: String,
    schema: RequiredSchema,
    page: u32,
    seen: HashSet<String>,
    items: Vec<CrawlItem>,
}

impl Session {
    pub fn new(identity_field: impl Into<String>, schema: RequiredSchema) -> Self {
        Self {
            identity_field: identity_field.into(),
            schema,
            page: 0,
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }

    /// Current page number (0 before the first page)
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    /// Runs one item through the validation pipeline
    ///
    /// 1. Drop a boolean `error = false` marker
    /// 2. Require a non-empty identity value
    /// 3. Require every schema field, non-empty
    /// 4. Reject identities already seen in this run
    /// 5. Record the identity and keep the item
    pub fn admit(&mut self, mut item: CrawlItem) -> ItemVerdict {
        item.strip_error_marker();

        let Some(identity) = item.identity(&self.identity_field) else {
            tracing::debug!("Item found without a '{}', skipping", self.identity_field);
            return ItemVerdict::MissingIdentity;
        };

        let missing = self.schema.missing(&item);
        if !missing.is_empty() {
            tracing::debug!(
                "Incomplete data for '{}'. Missing required fields: {}",
                identity,
                missing.join(", ")
            );
            return ItemVerdict::MissingFields(missing.into_iter().map(String::from).collect());
        }

        if self.seen.contains(&identity) {
            tracing::debug!("Duplicate found: {}", identity);
            return ItemVerdict::Duplicate(identity);
        }

        self.seen.insert(identity);
        self.items.push(item);
        ItemVerdict::Valid
    }

    /// Admits every item of a page in order and tallies the verdicts
    pub fn admit_page(&mut self, items: Vec<CrawlItem>) -> PageCounts {
        let mut counts = PageCounts::default();
        for item in items {
            let verdict = self.admit(item);
            counts.record(&verdict);
        }
        counts
    }

    pub fn has_seen(&self, identity: &str) -> bool {
        self.seen.contains(identity)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Valid items accumulated so far, in acceptance order
    pub fn items(&self) -> &[CrawlItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<CrawlItem> {
        self.items
    }
}
