/// Crawl state definitions for the pagination loop
///
/// This module defines every state the orchestrator moves through while
/// walking a paginated listing.
use std::fmt;

/// Represents the current state of a crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlState {
    // ===== Active States =====
    /// Session created, nothing fetched yet
    Init,

    /// Page with the given number is being fetched
    Fetching(u32),

    /// Page was processed and the loop moves on
    PageOk(u32),

    // ===== Terminal States =====
    /// Page contained a no-results marker
    NoResults(u32),

    /// Page failed after retries, was malformed or yielded no items
    PageFailed { page: u32, reason: String },

    /// Page yielded items but none of them were new and valid
    NoNewItems(u32),

    /// Page limit reached or single-page mode finished
    Done(u32),
}

impl CrawlState {
    /// Returns true if this is a terminal state (the loop stops here)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NoResults(_) | Self::PageFailed { .. } | Self::NoNewItems(_) | Self::Done(_)
        )
    }

    /// Returns true if this represents a failed termination
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::PageFailed { .. })
    }

    /// Page the state refers to, if any
    pub fn page(&self) -> Option<u32> {
        match self {
            Self::Init => None,
            Self::Fetching(p)
            | Self::PageOk(p)
            | Self::NoResults(p)
            | Self::NoNewItems(p)
            | Self::Done(p) => Some(*p),
            Self::PageFailed { page, .. } => Some(*page),
        }
    }

    /// Short machine-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Fetching(_) => "fetching",
            Self::PageOk(_) => "page_ok",
            Self::NoResults(_) => "no_results",
            Self::PageFailed { .. } => "page_failed",
            Self::NoNewItems(_) => "no_new_items",
            Self::Done(_) => "done",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::PageFailed { page, reason } => {
                write!(f, "page_failed(page {}): {}", page, reason)
            }
            other => match other.page() {
                Some(page) => write!(f, "{}(page {})", other.label(), page),
                None => write!(f, "{}", other.label()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!CrawlState::Init.is_terminal());
        assert!(!CrawlState::Fetching(1).is_terminal());
        assert!(!CrawlState::PageOk(1).is_terminal());

        assert!(CrawlState::NoResults(2).is_terminal());
        assert!(CrawlState::Done(3).is_terminal());
        assert!(CrawlState::NoNewItems(2).is_terminal());
        assert!(CrawlState::PageFailed {
            page: 2,
            reason: "timeout".to_string()
        }
        .is_terminal());
    }

    #[test]
    fn test_is_failure() {
        assert!(CrawlState::PageFailed {
            page: 1,
            reason: "x".to_string()
        }
        .is_failure());
        assert!(!CrawlState::NoResults(1).is_failure());
        assert!(!CrawlState::Done(1).is_failure());
    }

    #[test]
    fn test_page() {
        assert_eq!(CrawlState::Init.page(), None);
        assert_eq!(CrawlState::Fetching(4).page(), Some(4));
        assert_eq!(
            CrawlState::PageFailed {
                page: 7,
                reason: String::new()
            }
            .page(),
            Some(7)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", CrawlState::Init), "init");
        assert_eq!(format!("{}", CrawlState::Done(3)), "done(page 3)");
        assert_eq!(format!("{}", CrawlState::NoResults(2)), "no_results(page 2)");
        assert_eq!(
            format!(
                "{}",
                CrawlState::PageFailed {
                    page: 2,
                    reason: "HTTP 500".to_string()
                }
            ),
            "page_failed(page 2): HTTP 500"
        );
    }
}
