use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, ProxyConfig, RateLimitConfig, RetryConfig, TargetConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target_config(&config.target)?;
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_proxy_config(&config.proxy)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the crawl target
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url '{}': {}", config.base_url, e)))?;

    if !matches!(url.scheme(), "http" | "https" | "file") {
        return Err(ConfigError::Validation(format!(
            "base_url '{}' must use http, https or file scheme",
            config.base_url
        )));
    }

    if config.identity_field.trim().is_empty() {
        return Err(ConfigError::Validation(
            "identity_field cannot be empty".to_string(),
        ));
    }

    validate_field_names("required_fields", &config.required_fields)?;
    validate_field_names("optional_fields", &config.optional_fields)?;

    if config.no_results_markers.iter().any(|m| m.is_empty()) {
        return Err(ConfigError::Validation(
            "no_results_markers cannot contain empty phrases".to_string(),
        ));
    }

    Ok(())
}

/// Field names must be non-blank and unique within their list
fn validate_field_names(label: &str, fields: &[String]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for field in fields {
        if field.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} cannot contain blank field names",
                label
            )));
        }
        if !seen.insert(field.as_str()) {
            return Err(ConfigError::Validation(format!(
                "{} lists '{}' more than once",
                label, field
            )));
        }
    }
    Ok(())
}

/// Validates pagination settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.page_param.is_empty()
        || !config
            .page_param
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "page_param must be a non-empty query key, got '{}'",
            config.page_param
        )));
    }

    if config.fetch_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "fetch_timeout_ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry settings
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if !config.backoff_multiplier.is_finite() || config.backoff_multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff_multiplier must be a finite number >= 1.0, got {}",
            config.backoff_multiplier
        )));
    }
    Ok(())
}

/// Validates the rate limit quota
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.calls < 1 {
        return Err(ConfigError::Validation(format!(
            "rate limit calls must be >= 1, got {}",
            config.calls
        )));
    }

    if config.period_ms == 0 {
        return Err(ConfigError::Validation(
            "rate limit period_ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates proxy pool settings
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    for address in &config.addresses {
        Url::parse(address).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid proxy address '{}': {}", address, e))
        })?;
    }

    Url::parse(&config.test_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy test_url: {}", e)))?;

    if config.max_fail_count < 1 {
        return Err(ConfigError::Validation(format!(
            "proxy max_fail_count must be >= 1, got {}",
            config.max_fail_count
        )));
    }

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "proxy timeout_ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.file_prefix.is_empty() {
        return Err(ConfigError::Validation(
            "output file_prefix cannot be empty".to_string(),
        ));
    }

    Ok(())
}
