//! State module for tracking crawl progress
//!
//! This module provides the record types and the per-run state used by the
//! crawl loop.
//!
//! # Components
//!
//! - `CrawlItem`: An extracted record (ordered field name to scalar mapping)
//! - `RequiredSchema`: Fields an item must carry to be valid
//! - `Session`: Seen identities and accumulated valid items of one run
//! - `CrawlState`: Where the pagination loop currently is

mod crawl_state;
mod item;
mod session;

// Re-export main types
pub use crawl_state::CrawlState;
pub use item::{CrawlItem, FieldValue, RequiredSchema, ERROR_MARKER_FIELD};
pub use session::{ItemVerdict, PageCounts, Session};
