use serde::Deserialize;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    pub output: OutputConfig,
}

/// What to crawl and how to judge the extracted records
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// First page of the listing
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Selector handed to the extractor
    #[serde(default)]
    pub selector: String,

    /// Free-form extraction instruction handed to the extractor
    #[serde(default)]
    pub instruction: String,

    /// Field used as the deduplication key
    #[serde(rename = "identity-field", default = "default_identity_field")]
    pub identity_field: String,

    /// Fields that must be present and non-empty
    #[serde(rename = "required-fields")]
    pub required_fields: Vec<String>,

    #[serde(rename = "optional-fields", default)]
    pub optional_fields: Vec<String>,

    /// Case-insensitive phrases that mark an intentionally empty page
    #[serde(rename = "no-results-markers", default = "default_no_results_markers")]
    pub no_results_markers: Vec<String>,
}

/// Pagination behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    #[serde(rename = "multi-page", default)]
    pub multi_page: bool,

    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Pause between pages (milliseconds)
    #[serde(rename = "page-delay-ms", default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Query parameter carrying the page number
    #[serde(rename = "page-param", default = "default_page_param")]
    pub page_param: String,

    /// Transport timeout for a single fetch (milliseconds)
    #[serde(rename = "fetch-timeout-ms", default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,
}

/// Retry policy for fetch and extract operations
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "initial-delay-ms", default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(rename = "backoff-multiplier", default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Sliding-window quota for outbound calls
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_calls")]
    pub calls: u32,

    #[serde(rename = "period-ms", default = "default_rate_period_ms")]
    pub period_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            calls: default_rate_calls(),
            period_ms: default_rate_period_ms(),
        }
    }
}

/// Proxy pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub addresses: Vec<String>,

    /// JSON file with additional proxy addresses
    #[serde(default)]
    pub file: Option<String>,

    /// URL requested through each proxy when probing
    #[serde(rename = "test-url", default = "default_proxy_test_url")]
    pub test_url: String,

    #[serde(rename = "timeout-ms", default = "default_proxy_timeout_ms")]
    pub timeout_ms: u64,

    /// Slowest acceptable probe round trip (milliseconds)
    #[serde(rename = "max-latency-ms", default = "default_proxy_max_latency_ms")]
    pub max_latency_ms: u64,

    /// Consecutive failed probe batches before eviction
    #[serde(rename = "max-fail-count", default = "default_proxy_max_fail_count")]
    pub max_fail_count: u32,

    #[serde(rename = "probe-retries", default = "default_proxy_probe_retries")]
    pub probe_retries: u32,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            file: None,
            test_url: default_proxy_test_url(),
            timeout_ms: default_proxy_timeout_ms(),
            max_latency_ms: default_proxy_max_latency_ms(),
            max_fail_count: default_proxy_max_fail_count(),
            probe_retries: default_proxy_probe_retries(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving result files
    pub directory: String,

    #[serde(rename = "file-prefix", default = "default_file_prefix")]
    pub file_prefix: String,

    /// Whether to append a timestamp to file names
    #[serde(default = "default_true")]
    pub timestamp: bool,
}

fn default_identity_field() -> String {
    "title".to_string()
}

/// Phrases that commonly appear on an empty listing page
pub fn default_no_results_markers() -> Vec<String> {
    [
        "No Results Found",
        "No matches found",
        "Nothing found",
        "No items found",
        "0 results",
        "No results",
        "Empty",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_pages() -> u32 {
    1
}

fn default_page_delay_ms() -> u64 {
    2000
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_rate_calls() -> u32 {
    2
}

fn default_rate_period_ms() -> u64 {
    1000
}

fn default_proxy_test_url() -> String {
    "http://httpbin.org/ip".to_string()
}

fn default_proxy_timeout_ms() -> u64 {
    10_000
}

fn default_proxy_max_latency_ms() -> u64 {
    1000
}

fn default_proxy_max_fail_count() -> u32 {
    3
}

fn default_proxy_probe_retries() -> u32 {
    2
}

fn default_file_prefix() -> String {
    "scraped_data".to_string()
}

fn default_true() -> bool {
    true
}
