//! Crawler module for paginated listing harvesting
//!
//! This module contains the core crawling logic, including:
//! - Page fetching over HTTP (optionally through a proxy) or from disk
//! - Structured item extraction
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;

pub use coordinator::{contains_no_results_marker, page_url, run_crawl, Coordinator, CrawlReport};
pub use extractor::{ExtractionSpec, Extractor, JsonExtractor};
pub use fetcher::{
    build_http_client, classify_transport_error, default_user_agent, FetchResponse, Fetcher,
    HttpFetcher, TransportConfig,
};
