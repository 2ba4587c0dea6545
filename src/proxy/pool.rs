//! Rotating proxy pool
//!
//! The pool keeps an ordered list of endpoints and a rotation cursor.
//! Health checks fan out one probe per endpoint, join, and only then merge
//! the outcomes into the failure counters.
//!
//! | Probe outcome | Action |
//! |---------------|--------|
//! | 2xx within `max_latency` | Reset failure counter to zero |
//! | Anything else, after probe retries | Increment failure counter |
//! | Failure counter reaches `max_fail_count` | Evict from the pool |

use crate::config::ProxyConfig;
use crate::proxy::ProxyProber;
use crate::resilience::{RetryExecutor, RetryPolicy};
use crate::{HarvestError, Result};
use futures::future::join_all;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A proxy address and its consecutive probe failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub address: String,
    failures: u32,
}

impl ProxyEndpoint {
    fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            failures: 0,
        }
    }

    /// Consecutive failed probe batches
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

/// How endpoints are probed and when they are evicted
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// URL requested through each proxy
    pub test_url: String,

    /// Transport timeout for a single probe attempt
    pub timeout: Duration,

    /// Slowest acceptable round trip
    pub max_latency: Duration,

    /// Failed batches before eviction
    pub max_fail_count: u32,

    /// Retries per probe after the first attempt
    pub retries: u32,

    /// Delay before the first probe retry
    pub retry_delay: Duration,
}

impl ProbeSettings {
    /// Builds probe settings from the `[proxy]` config section
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            test_url: config.test_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            max_latency: Duration::from_millis(config.max_latency_ms),
            max_fail_count: config.max_fail_count.max(1),
            retries: config.probe_retries,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::from_config(&ProxyConfig::default())
    }
}

/// Outcome of one `test_all` batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub passed: usize,
    pub failed: usize,
    pub evicted: Vec<String>,
}

/// Accepted proxy file layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum ProxyFile {
    List(Vec<String>),
    Wrapped { proxies: Vec<String> },
}

/// Rotating set of proxy endpoints
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
    cursor: usize,
    settings: ProbeSettings,
    probe_executor: RetryExecutor,
    prober: Arc<dyn ProxyProber>,
}

impl ProxyPool {
    /// Creates an empty pool
    pub fn new(prober: Arc<dyn ProxyProber>, settings: ProbeSettings) -> Self {
        let probe_executor = RetryExecutor::new(RetryPolicy::new(
            settings.retries,
            settings.retry_delay,
            2.0,
        ));
        Self {
            endpoints: Vec::new(),
            cursor: 0,
            settings,
            probe_executor,
            prober,
        }
    }

    /// Creates a pool from the `[proxy]` config section
    ///
    /// Inline addresses are added first, then the proxy file if one is
    /// configured.
    pub fn from_config(config: &ProxyConfig, prober: Arc<dyn ProxyProber>) -> Result<Self> {
        let mut pool = Self::new(prober, ProbeSettings::from_config(config));
        for address in &config.addresses {
            pool.add(address);
        }
        if let Some(file) = &config.file {
            pool.load_file(file)?;
        }
        Ok(pool)
    }

    /// Appends `address` unless it is already in the pool
    ///
    /// Returns true if the address was added.
    pub fn add(&mut self, address: &str) -> bool {
        if self.endpoints.iter().any(|e| e.address == address) {
            return false;
        }
        self.endpoints.push(ProxyEndpoint::new(address));
        tracing::info!("Added new proxy: {}", address);
        true
    }

    /// Removes `address` from the pool
    ///
    /// Returns true if the address was present.
    pub fn remove(&mut self, address: &str) -> bool {
        let before = self.endpoints.len();
        self.endpoints.retain(|e| e.address != address);
        self.clamp_cursor();

        let removed = self.endpoints.len() != before;
        if removed {
            tracing::info!("Removed proxy: {}", address);
        }
        removed
    }

    /// Returns the endpoint at the cursor and advances it round-robin
    pub fn next(&mut self) -> Option<&ProxyEndpoint> {
        if self.endpoints.is_empty() {
            return None;
        }
        self.clamp_cursor();
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.endpoints.len();
        self.endpoints.get(index)
    }

    /// Probes every endpoint concurrently and applies the outcomes
    ///
    /// Probe failures are local: a failing endpoint is counted and possibly
    /// evicted, the batch itself never fails.
    pub async fn test_all(&mut self) -> ProbeReport {
        if self.endpoints.is_empty() {
            tracing::warn!("No proxies available to test");
            return ProbeReport::default();
        }

        let addresses: Vec<String> = self.endpoints.iter().map(|e| e.address.clone()).collect();
        let outcomes = join_all(addresses.iter().map(|address| self.probe(address))).await;

        let mut report = ProbeReport::default();
        for (endpoint, passed) in self.endpoints.iter_mut().zip(outcomes) {
            if passed {
                endpoint.failures = 0;
                report.passed += 1;
            } else {
                endpoint.failures += 1;
                report.failed += 1;
                if endpoint.failures >= self.settings.max_fail_count {
                    report.evicted.push(endpoint.address.clone());
                }
            }
        }

        let max_fail_count = self.settings.max_fail_count;
        self.endpoints.retain(|e| {
            let keep = e.failures < max_fail_count;
            if !keep {
                tracing::info!("Removing failed proxy: {}", e.address);
            }
            keep
        });
        self.clamp_cursor();

        tracing::info!(
            "Proxy test complete. {} proxies available",
            self.endpoints.len()
        );
        report
    }

    /// Probes one address through the retry executor
    async fn probe(&self, address: &str) -> bool {
        let label = format!("proxy probe {}", address);
        match self
            .probe_executor
            .run(&label, || self.probe_attempt(address))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Proxy test failed for {}: {}", address, e);
                false
            }
        }
    }

    /// A single timed probe request
    async fn probe_attempt(&self, address: &str) -> Result<()> {
        let settings = &self.settings;
        let start = Instant::now();

        let status = tokio::time::timeout(
            settings.timeout,
            self.prober.probe(address, &settings.test_url, settings.timeout),
        )
        .await
        .map_err(|_| HarvestError::transient(format!("probe timed out after {:?}", settings.timeout)))??;

        let latency = start.elapsed();
        if !(200..300).contains(&status) {
            return Err(HarvestError::transient(format!("HTTP {}", status)));
        }
        if latency > settings.max_latency {
            return Err(HarvestError::transient(format!(
                "too slow: {:.2}s > {:.2}s",
                latency.as_secs_f64(),
                settings.max_latency.as_secs_f64()
            )));
        }
        Ok(())
    }

    /// Adds every address from a JSON proxy file
    ///
    /// The file holds either a list of addresses or `{"proxies": [...]}`.
    /// A missing file is not an error; unusable addresses are skipped.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of addresses newly added
    /// * `Err(HarvestError::ProxyFile)` - The file could not be read or parsed
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("Proxy file not found: {}", path.display());
            return Ok(0);
        }

        let file_error = |message: String| HarvestError::ProxyFile {
            path: path.display().to_string(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let parsed: ProxyFile = serde_json::from_str(&content)
            .map_err(|e| file_error(format!("Invalid proxy file format: {}", e)))?;

        let addresses = match parsed {
            ProxyFile::List(list) => list,
            ProxyFile::Wrapped { proxies } => proxies,
        };

        let mut added = 0;
        for address in &addresses {
            if let Err(e) = reqwest::Proxy::all(address.as_str()) {
                tracing::warn!("Skipping invalid proxy address '{}': {}", address, e);
                continue;
            }
            if self.add(address) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Writes the current addresses as `{"proxies": [...]}`
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let body = serde_json::to_string_pretty(&serde_json::json!({
            "proxies": self.addresses(),
        }))?;
        std::fs::write(path, body).map_err(|e| HarvestError::ProxyFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn addresses(&self) -> Vec<&str> {
        self.endpoints.iter().map(|e| e.address.as_str()).collect()
    }

    pub fn get(&self, address: &str) -> Option<&ProxyEndpoint> {
        self.endpoints.iter().find(|e| e.address == address)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    fn clamp_cursor(&mut self) {
        if self.cursor >= self.endpoints.len() {
            self.cursor = 0;
        }
    }
}

impl std::fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyPool")
            .field("endpoints", &self.endpoints)
            .field("cursor", &self.cursor)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
