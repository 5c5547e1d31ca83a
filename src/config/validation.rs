use crate::config::types::{Config, DiscoveryConfig, HttpConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Smallest non-zero `rate_limit_rps`: one request every ~17 minutes
const MIN_RATE_LIMIT_RPS: f64 = 0.001;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site("site_a", config.site_a.as_deref())?;
    validate_site("site_b", config.site_b.as_deref())?;
    validate_discovery_config(&config.discovery)?;
    validate_http_config(&config.http)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates a site root URL: required, http(s), with a host
fn validate_site(name: &str, site: Option<&str>) -> Result<(), ConfigError> {
    let site = site.ok_or_else(|| ConfigError::Validation(format!("{} is required", name)))?;

    let url = Url::parse(site)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, site, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            name, site
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            name, site
        )));
    }

    Ok(())
}

/// Validates discovery configuration
fn validate_discovery_config(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    for sitemap in &config.sitemaps {
        Url::parse(sitemap).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid sitemap URL '{}': {}", sitemap, e))
        })?;
    }

    if let Some(ext) = config.exclude_extensions.iter().find(|e| e.is_empty()) {
        return Err(ConfigError::Validation(format!(
            "exclude_extensions cannot contain empty entries, got '{}'",
            ext
        )));
    }

    Ok(())
}

/// Validates HTTP configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if !config.rate_limit_rps.is_finite() || config.rate_limit_rps < 0.0 {
        return Err(ConfigError::Validation(format!(
            "rate_limit_rps must be a non-negative number, got {}",
            config.rate_limit_rps
        )));
    }

    if config.rate_limit_rps > 0.0 && config.rate_limit_rps < MIN_RATE_LIMIT_RPS {
        return Err(ConfigError::Validation(format!(
            "rate_limit_rps must be 0 or at least {}, got {}",
            MIN_RATE_LIMIT_RPS, config.rate_limit_rps
        )));
    }

    if config.rate_limit_burst < 1 {
        return Err(ConfigError::Validation(format!(
            "rate_limit_burst must be >= 1, got {}",
            config.rate_limit_burst
        )));
    }

    if config.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "timeout_ms must be >= 100ms, got {}ms",
            config.timeout_ms
        )));
    }

    if config.max_redirects > 50 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= 50, got {}",
            config.max_redirects
        )));
    }

    if config.retry > 10 {
        return Err(ConfigError::Validation(format!(
            "retry must be <= 10, got {}",
            config.retry
        )));
    }

    if config.retry_backoff_max_ms < config.retry_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "retry_backoff_max_ms ({}) must be >= retry_backoff_ms ({})",
            config.retry_backoff_max_ms, config.retry_backoff_ms
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.csv_path.is_empty() {
        return Err(ConfigError::Validation(
            "csv_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
