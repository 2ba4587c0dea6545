//! Progress tracking and display
//!
//! [`ProgressTracker`] is pure accounting: every update is applied to the
//! counters, while redraws through the [`ProgressRenderer`] are throttled to
//! a minimum interval.

use crate::output::stats::CrawlStats;
use crate::state::PageCounts;
use std::io::Write;
use std::time::Duration;
use tokio::time::Instant;

/// Default minimum time between two redraws
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// Terminal width used when drawing the status line
pub const DEFAULT_TERM_WIDTH: usize = 80;

/// Side-effecting progress display
pub trait ProgressRenderer: Send {
    /// Redraws the current status
    fn render(&mut self, stats: &CrawlStats);

    /// Closes the display after the last redraw
    fn finish(&mut self, stats: &CrawlStats);
}

/// Renderer that draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentRenderer;

impl ProgressRenderer for SilentRenderer {
    fn render(&mut self, _stats: &CrawlStats) {}

    fn finish(&mut self, _stats: &CrawlStats) {}
}

/// Renderer that redraws a single status line on stdout
#[derive(Debug, Clone)]
pub struct TerminalRenderer {
    width: usize,
}

impl TerminalRenderer {
    pub fn new(width: usize) -> Self {
        Self { width }
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_TERM_WIDTH)
    }
}

impl ProgressRenderer for TerminalRenderer {
    fn render(&mut self, stats: &CrawlStats) {
        let line = format_status(stats, self.width);
        let mut stdout = std::io::stdout().lock();
        // Progress output is best effort
        let _ = write!(stdout, "\r{}\r{}", " ".repeat(self.width), line);
        let _ = stdout.flush();
    }

    fn finish(&mut self, _stats: &CrawlStats) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout);
        let _ = stdout.flush();
    }
}

/// Formats the one-line status, truncated to `width` characters
///
/// `[====>     ] Page n/N | Items: t (Valid: v, Failed: f, Dupes: d) | Rate: r items/s Success: s%`
///
/// The bar is only drawn when the page total is known and there is room
/// for more than ten cells.
pub fn format_status(stats: &CrawlStats, width: usize) -> String {
    let mut progress = format!("Page {}", stats.current_page);
    if stats.total_pages > 0 {
        progress.push_str(&format!("/{}", stats.total_pages));
    }

    let items_info = format!(
        "Items: {} (Valid: {}, Failed: {}, Dupes: {})",
        stats.total_items, stats.valid_items, stats.failed_items, stats.duplicate_items
    );

    let rate_info = format!(
        "Rate: {:.1} items/s Success: {:.1}%",
        stats.items_per_second(),
        stats.success_rate()
    );

    let mut status = format!("{} | {} | {}", progress, items_info, rate_info);

    if stats.total_pages > 0 {
        let room = width as i64 - status.chars().count() as i64 - 5;
        let bar_width = room.min(50);
        if bar_width > 10 {
            let bar_width = bar_width as usize;
            let fraction = (stats.current_page as f64 / stats.total_pages as f64).min(1.0);
            let filled = (bar_width as f64 * fraction) as usize;
            let bar = format!(
                "[{}{}{}]",
                "=".repeat(filled),
                ">".repeat(bar_width.saturating_sub(filled).min(1)),
                " ".repeat(bar_width.saturating_sub(filled + 1))
            );
            status = format!("{} {}", bar, status);
        }
    }

    if status.chars().count() > width {
        let kept: String = status.chars().take(width.saturating_sub(3)).collect();
        status = format!("{}...", kept);
    }

    status
}

/// Accumulates crawl counters and drives the progress display
pub struct ProgressTracker {
    stats: CrawlStats,
    interval: Duration,
    last_render: Option<Instant>,
    renderer: Box<dyn ProgressRenderer>,
    finished: bool,
}

impl ProgressTracker {
    /// Creates a tracker
    ///
    /// # Arguments
    ///
    /// * `total_pages` - Page total when known up front
    /// * `interval` - Minimum time between two redraws
    /// * `renderer` - Display receiving the redraws
    pub fn new(
        total_pages: Option<u32>,
        interval: Duration,
        renderer: Box<dyn ProgressRenderer>,
    ) -> Self {
        Self {
            stats: CrawlStats::new(total_pages),
            interval,
            last_render: None,
            renderer,
            finished: false,
        }
    }

    /// Applies one page's counts and redraws if the interval has passed
    pub fn update(&mut self, page: Option<u32>, counts: &PageCounts) {
        if let Some(page) = page {
            self.stats.current_page = page;
        }

        self.stats.total_items += counts.new_items;
        self.stats.valid_items += counts.valid_items;
        self.stats.failed_items += counts.failed_items;
        self.stats.duplicate_items += counts.duplicate_items;

        let now = Instant::now();
        let due = self
            .last_render
            .map_or(true, |last| now.duration_since(last) >= self.interval);
        if due {
            self.renderer.render(&self.stats);
            self.last_render = Some(now);
        }
    }

    /// Emits the final summary
    ///
    /// Only the first call has any effect; returns false on later calls.
    pub fn finish(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;

        self.renderer.finish(&self.stats);

        tracing::info!("Crawling completed!");
        tracing::info!("Final Statistics:");
        for (key, value) in self.stats.summary_lines() {
            tracing::info!("  {}: {}", key, value);
        }
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("stats", &self.stats)
            .field("interval", &self.interval)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recording {
        renders: Arc<Mutex<Vec<u64>>>,
        finishes: Arc<Mutex<u32>>,
    }

    impl ProgressRenderer for Recording {
        fn render(&mut self, stats: &CrawlStats) {
            self.renders.lock().unwrap().push(stats.total_items);
        }

        fn finish(&mut self, _stats: &CrawlStats) {
            *self.finishes.lock().unwrap() += 1;
        }
    }

    fn counts(new: u64, valid: u64, failed: u64, duplicate: u64) -> PageCounts {
        PageCounts {
            new_items: new,
            valid_items: valid,
            failed_items: failed,
            duplicate_items: duplicate,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_updates_always_counted_renders_throttled() {
        let recording = Recording::default();
        let mut tracker = ProgressTracker::new(
            Some(3),
            Duration::from_millis(500),
            Box::new(recording.clone()),
        );

        tracker.update(Some(1), &counts(3, 2, 1, 0));
        tracker.update(Some(2), &counts(2, 1, 0, 1));
        tokio::time::advance(Duration::from_millis(600)).await;
        tracker.update(Some(3), &counts(1, 1, 0, 0));

        let stats = tracker.stats();
        assert_eq!(stats.current_page, 3);
        assert_eq!(stats.total_items, 6);
        assert_eq!(stats.valid_items, 4);
        assert_eq!(stats.failed_items, 1);
        assert_eq!(stats.duplicate_items, 1);
        assert!(stats.valid_items + stats.failed_items + stats.duplicate_items <= stats.total_items);

        // First update draws, second is throttled, third is past the interval
        assert_eq!(*recording.renders.lock().unwrap(), vec![3, 6]);
    }

    #[tokio::test]
    async fn test_finish_runs_once() {
        let recording = Recording::default();
        let mut tracker = ProgressTracker::new(None, DEFAULT_UPDATE_INTERVAL, Box::new(recording.clone()));

        assert!(tracker.finish());
        assert!(!tracker.finish());
        assert!(tracker.is_finished());
        assert_eq!(*recording.finishes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_without_page_keeps_current() {
        let mut tracker = ProgressTracker::new(None, DEFAULT_UPDATE_INTERVAL, Box::new(SilentRenderer));
        tracker.update(Some(4), &counts(1, 1, 0, 0));
        tracker.update(None, &counts(1, 0, 1, 0));

        assert_eq!(tracker.stats().current_page, 4);
        assert_eq!(tracker.stats().total_items, 2);
    }

    #[test]
    fn test_format_status_without_total() {
        let mut stats = CrawlStats::new(None);
        stats.current_page = 2;
        stats.total_items = 5;
        stats.valid_items = 3;
        stats.failed_items = 1;
        stats.duplicate_items = 1;

        let line = format_status(&stats, 200);
        assert!(line.starts_with("Page 2 | Items: 5 (Valid: 3, Failed: 1, Dupes: 1) | Rate: "));
        assert!(line.ends_with("Success: 60.0%"));
    }

    #[test]
    fn test_format_status_bar_and_truncation() {
        let mut stats = CrawlStats::new(Some(4));
        stats.current_page = 2;

        let wide = format_status(&stats, 200);
        assert!(wide.starts_with("[=========================>"));
        assert!(wide.contains("Page 2/4"));

        let narrow = format_status(&stats, 40);
        assert_eq!(narrow.chars().count(), 40);
        assert!(narrow.ends_with("..."));
        assert!(narrow.starts_with("Page 2/4"));
    }
}
