//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! Disallowed URLs are kept out of the crawl frontier and are not probed unless
//! robots handling is turned off.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::{user_agent_token, ParsedRobots};

use reqwest::Client;

/// Fetches robots.txt for an origin
///
/// Never fails: a missing file (4xx) means everything is allowed, and a server
/// error or network failure is logged and also treated as allow-all.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `origin` - Scheme, host and port, e.g. `https://example.com`
/// * `user_agent` - The user agent string sent with the request
pub async fn fetch_robots(client: &Client, origin: &str, user_agent: &str) -> ParsedRobots {
    let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));
    tracing::debug!("Fetching robots.txt: {}", robots_url);

    let response = match client
        .get(&robots_url)
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Could not fetch {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::debug!("{} returned {}, allowing all", robots_url, status);
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::warn!("Could not read {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
