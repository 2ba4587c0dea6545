//! Page fetcher
//!
//! This module handles the transport side of the crawl:
//! - The `Fetcher` collaborator trait used by the coordinator
//! - An HTTP implementation with one cached client per proxy
//! - Reading `file://` URLs from disk
//! - Error classification into transient and fatal failures

use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// Per-request transport settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Proxy the request goes out through, if any
    pub proxy: Option<String>,

    /// Total request timeout
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn direct(timeout: Duration) -> Self {
        Self {
            proxy: None,
            timeout,
        }
    }
}

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Whether the page was retrieved
    pub success: bool,

    /// Page body (empty on failure)
    pub content: String,

    /// Why the fetch did not succeed
    pub error_message: Option<String>,
}

impl FetchResponse {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            error_message: Some(message.into()),
        }
    }

    /// Converts an unsuccessful response into a transient error
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            let message = self
                .error_message
                .unwrap_or_else(|| "fetch failed".to_string());
            Err(HarvestError::transient(message))
        }
    }
}

/// Page transport collaborator
///
/// Implementations may be slow or fail transiently; the coordinator wraps
/// every call in its retry executor.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` using `transport`
    ///
    /// # Returns
    ///
    /// * `Ok(FetchResponse)` - The request completed (possibly with `success = false`)
    /// * `Err(HarvestError::Transient)` - Network or timeout failure
    /// * `Err(HarvestError::Fatal)` - The transport cannot be used at all
    async fn fetch(&self, url: &str, transport: &TransportConfig) -> Result<FetchResponse>;
}

/// Builds an HTTP client, optionally routed through a proxy
///
/// # Arguments
///
/// * `user_agent` - User agent header value
/// * `proxy` - Proxy URL every request goes through
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(user_agent: &str, proxy: Option<&str>) -> std::result::Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(address) = proxy {
        builder = builder.proxy(Proxy::all(address)?);
    }

    builder.build()
}

/// Default user agent when none is configured
pub fn default_user_agent() -> String {
    format!("SumiHarvest/{}", env!("CARGO_PKG_VERSION"))
}

/// reqwest-based fetcher
///
/// | Condition | Result |
/// |-----------|--------|
/// | HTTP 2xx | `success = true` with the body |
/// | Other HTTP status | `success = false`, `"HTTP <code>"` |
/// | Timeout / connection error | `Err(Transient)` |
/// | Permission denied on a socket or file | `Err(Fatal)` |
/// | `file://` URL | Body read from disk |
#[derive(Debug)]
pub struct HttpFetcher {
    user_agent: String,
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl HttpFetcher {
    pub fn new(user_agent: Option<String>) -> Self {
        Self {
            user_agent: user_agent.unwrap_or_else(default_user_agent),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached client for `proxy`, building it on first use
    fn client_for(&self, proxy: Option<&str>) -> Result<Client> {
        let mut clients = self
            .clients
            .lock()
            .map_err(|_| HarvestError::Fatal("HTTP client cache poisoned".to_string()))?;

        let key = proxy.map(String::from);
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        // A bad proxy only affects this attempt; the next one rotates away from it
        let client = build_http_client(&self.user_agent, proxy).map_err(|e| match proxy {
            Some(address) => {
                HarvestError::transient(format!("Unusable proxy '{}': {}", address, e))
            }
            None => HarvestError::Fatal(format!("Failed to build HTTP client: {}", e)),
        })?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    async fn fetch_file(&self, url: &Url) -> Result<FetchResponse> {
        let path = url
            .to_file_path()
            .map_err(|_| HarvestError::Fatal(format!("Invalid file URL: {}", url)))?;

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(FetchResponse::ok(content)),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(HarvestError::Fatal(format!(
                "Permission denied reading {}",
                path.display()
            ))),
            Err(e) => Ok(FetchResponse::failed(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, transport: &TransportConfig) -> Result<FetchResponse> {
        let parsed = Url::parse(url)
            .map_err(|e| HarvestError::Fatal(format!("Invalid URL '{}': {}", url, e)))?;

        if parsed.scheme() == "file" {
            return self.fetch_file(&parsed).await;
        }

        let client = self.client_for(transport.proxy.as_deref())?;
        let response = client
            .get(parsed)
            .timeout(transport.timeout)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Ok(FetchResponse::failed(format!("HTTP {}", status.as_u16())));
        }

        let body = response.text().await.map_err(classify_transport_error)?;
        Ok(FetchResponse::ok(body))
    }
}

/// Classifies a reqwest error
///
/// Permission failures anywhere in the source chain are fatal; everything
/// else the transport reports is transient.
pub fn classify_transport_error(err: reqwest::Error) -> HarvestError {
    if has_permission_denied(&err) {
        return HarvestError::Fatal(format!("Permission denied: {}", err));
    }

    if err.is_timeout() {
        HarvestError::transient(format!("Request timeout: {}", err))
    } else if err.is_connect() {
        HarvestError::transient(format!("Connection failed: {}", err))
    } else {
        HarvestError::transient(err.to_string())
    }
}

fn has_permission_denied(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == ErrorKind::PermissionDenied {
                return true;
            }
        }
        current = e.source();
    }
    false
}
