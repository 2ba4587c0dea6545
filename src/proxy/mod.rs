//! Proxy module for outbound identity rotation
//!
//! This module provides:
//! - A rotating pool of proxy endpoints
//! - Concurrent health probing with failure-based eviction
//! - Loading and saving proxy lists as JSON files

mod pool;
mod prober;

pub use pool::{ProbeReport, ProbeSettings, ProxyEndpoint, ProxyPool};
pub use prober::{HttpProber, ProxyProber};
