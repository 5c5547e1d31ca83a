//! url-compare: a two-site URL parity auditor
//!
//! This crate discovers the public URL set of two websites (sitemaps plus a
//! bounded crawl), probes every URL with rate-limited, retrying HTTP requests
//! and joins the results on a normalized path key to classify differences.

pub mod compare;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod output;
pub mod probe;
pub mod robots;
pub mod url;

use thiserror::Error;

/// Main error type for url-compare operations
///
/// Only configuration and setup failures end up here. Per-URL failures are
/// recorded as [`FetchError`] values inside discovery and probe results.
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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

/// URL-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Failure of a single fetch, recorded as data rather than propagated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("disallowed by robots.txt")]
    RobotsDisallowed,

    #[error("redirect loop at {0}")]
    RedirectLoop(String),
}

impl FetchError {
    /// Classifies a reqwest transport error
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout
        } else if error.is_connect() {
            FetchError::Connect(error.to_string())
        } else {
            FetchError::Network(error.to_string())
        }
    }

    /// Returns true for failures worth retrying: transport errors, 429 and 5xx
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connect(_) | FetchError::Network(_) => true,
            FetchError::Status(status) => is_transient_status(*status),
            _ => false,
        }
    }
}

/// Returns true for HTTP statuses treated as transient (429 and 5xx)
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Result type alias for url-compare operations
pub type Result<T> = std::result::Result<T, CompareError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use compare::{compare, ComparisonClass, ComparisonRecord};
pub use config::Config;
pub use coordinator::{run_comparison, ComparisonRun, Coordinator};
pub use discovery::{DiscoveredUrl, Discoverer, Discovery, DiscoveryMode, UrlSource};
pub use probe::{ProbeResult, ProbeResults, Prober};
pub use crate::url::{normalize, NormalizeOptions, NormalizedUrl};
