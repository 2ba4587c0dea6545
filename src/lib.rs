//! Sumi-Harvest: a paginated listing harvester
//!
//! This crate drives a pagination-based crawl: pages are fetched through a
//! rate-limited retry wrapper, outbound traffic rotates through a health-checked
//! proxy pool, and extracted records are validated and deduplicated before
//! being flushed to an output writer on every exit path.

pub mod config;
pub mod crawler;
pub mod output;
pub mod proxy;
pub mod resilience;
pub mod state;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Network or timeout class failure; retried by the retry executor
    #[error("Transient failure: {message}")]
    Transient { message: String },

    /// Malformed extraction payload
    #[error("Malformed extraction payload: {message}")]
    Parse { message: String },

    #[error("Gave up after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<HarvestError>,
    },

    /// Unrecoverable failure, e.g. missing permission for a network primitive
    #[error("Fatal error: {0}")]
    Fatal(String),

    #[error("Crawl cancelled")]
    Cancelled,

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Proxy file error for {path}: {message}")]
    ProxyFile { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarvestError {
    /// Shorthand for a transient failure
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Shorthand for a parse failure
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Default retry predicate.
    ///
    /// Everything is retryable except malformed payloads, fatal errors,
    /// cancellation and an already exhausted retry loop. This also retries
    /// IO and JSON errors that are unlikely to be transient; narrow it with
    /// [`resilience::RetryPolicy::retry_on`].
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Parse { .. } | Self::Fatal(_) | Self::Cancelled | Self::RetryExhausted { .. }
        )
    }

    /// Returns true if this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport};
pub use state::{CrawlItem, CrawlState, FieldValue, RequiredSchema};
