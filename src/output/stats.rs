//! Crawl statistics
//!
//! This module provides the running counters of a crawl and the metrics
//! derived from them.

use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::time::Instant;

/// Crawl statistics
///
/// Counters only ever grow. Throughput and success rate are computed on
/// demand.
#[derive(Debug, Clone)]
pub struct CrawlStats {
    /// Wall-clock start of the crawl
    pub started_at: DateTime<Local>,

    /// Page total, 0 when unknown
    pub total_pages: u32,

    pub current_page: u32,

    /// Items returned by the extractor
    pub total_items: u64,

    pub valid_items: u64,
    pub failed_items: u64,
    pub duplicate_items: u64,

    started: Instant,
}

impl CrawlStats {
    /// Creates empty statistics starting now
    pub fn new(total_pages: Option<u32>) -> Self {
        Self {
            started_at: Local::now(),
            total_pages: total_pages.unwrap_or(0),
            current_page: 0,
            total_items: 0,
            valid_items: 0,
            failed_items: 0,
            duplicate_items: 0,
            started: Instant::now(),
        }
    }

    /// Time since the crawl started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Extracted items per second of elapsed time
    pub fn items_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_items as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Share of extracted items that were valid, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        (self.valid_items as f64 / self.total_items as f64) * 100.0
    }

    /// Key/value lines for the final summary
    pub fn summary_lines(&self) -> Vec<(&'static str, String)> {
        vec![
            ("elapsed_time", format!("{:.1}s", self.elapsed().as_secs_f64())),
            ("items_per_second", format!("{:.2}", self.items_per_second())),
            ("total_pages", self.total_pages.to_string()),
            ("current_page", self.current_page.to_string()),
            ("total_items", self.total_items.to_string()),
            ("valid_items", self.valid_items.to_string()),
            ("failed_items", self.failed_items.to_string()),
            ("duplicate_items", self.duplicate_items.to_string()),
            ("success_rate", format!("{:.1}%", self.success_rate())),
        ]
    }
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self::new(None)
    }
}
