//! Proxy probe transport

use crate::crawler::classify_transport_error;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use std::time::Duration;

/// Issues a single probe request through a proxy
///
/// Implementations report the response status; latency and pass/fail
/// judgement belong to the pool.
#[async_trait]
pub trait ProxyProber: Send + Sync {
    /// Requests `test_url` through `address`
    ///
    /// # Returns
    ///
    /// * `Ok(u16)` - HTTP status of the probe response
    /// * `Err(HarvestError)` - The request could not be completed
    async fn probe(&self, address: &str, test_url: &str, timeout: Duration) -> Result<u16>;
}

/// reqwest-based prober
#[derive(Debug, Clone, Default)]
pub struct HttpProber;

impl HttpProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProxyProber for HttpProber {
    async fn probe(&self, address: &str, test_url: &str, timeout: Duration) -> Result<u16> {
        let proxy = Proxy::all(address)
            .map_err(|e| HarvestError::transient(format!("Invalid proxy {}: {}", address, e)))?;

        let client = Client::builder()
            .proxy(proxy)
            .timeout(timeout)
            .build()
            .map_err(|e| HarvestError::Fatal(format!("Failed to build probe client: {}", e)))?;

        let response = client
            .get(test_url)
            .send()
            .await
            .map_err(classify_transport_error)?;

        Ok(response.status().as_u16())
    }
}
