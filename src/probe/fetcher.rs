//! HTTP fetcher implementation
//!
//! This module handles the HTTP side of probing:
//! - Building HTTP clients with the configured user agent and timeout
//! - HEAD requests with a GET fallback
//! - Reading the headers a probe records

use crate::config::HttpConfig;
use crate::FetchError;
use reqwest::{redirect::Policy, Client, Method, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration (user agent, timeout)
/// * `redirect` - Redirect policy; probing uses `Policy::none()` and walks
///   chains itself, discovery lets the client follow them
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use reqwest::redirect::Policy;
/// use url_compare::config::HttpConfig;
/// use url_compare::probe::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default(), Policy::none()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig, redirect: Policy) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_millis(config.timeout_ms);

    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(redirect)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Returns true if a response with this status should fall back from HEAD to GET
pub fn needs_get_fallback(status: StatusCode) -> bool {
    status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED
}

/// Returns true for statuses whose `Location` is followed
pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Sends a single request without following redirects
pub async fn send(client: &Client, method: Method, url: &Url) -> Result<Response, FetchError> {
    client
        .request(method, url.clone())
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(&e))
}

/// Extracts the MIME type from a response's Content-Type header
///
/// Parameters such as `charset` are dropped.
pub fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
}

/// Returns the raw `Location` header value of a response
pub fn location(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
