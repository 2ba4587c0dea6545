//! Output module for crawl results and progress
//!
//! This module handles:
//! - Writing accumulated items to result files
//! - Recording crawl statistics and metrics
//! - Drawing the progress display

mod json;
pub mod progress;
pub mod stats;
mod traits;

pub use json::JsonFileWriter;
pub use progress::{
    format_status, ProgressRenderer, ProgressTracker, SilentRenderer, TerminalRenderer,
    DEFAULT_UPDATE_INTERVAL,
};
pub use stats::CrawlStats;
pub use traits::{union_of_keys, OutputError, OutputResult, OutputWriter};
