//! Per-run robots.txt cache
//!
//! Each Discoverer and Prober owns one cache. robots.txt is fetched once per
//! origin, before the first request to that host, and kept for the rest of the run.

use crate::robots::{fetch_robots, ParsedRobots};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use url::Url;

type Entry = Arc<OnceCell<Arc<ParsedRobots>>>;

/// Caches parsed robots.txt per origin
pub struct RobotsCache {
    client: Client,
    user_agent: String,
    /// One cell per origin; only callers for the same origin wait on a fetch
    entries: Mutex<HashMap<String, Entry>>,
}

impl RobotsCache {
    /// Creates an empty cache that fetches with the given client
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns robots.txt for the URL's origin, fetching it on first use
    pub async fn get(&self, url: &Url) -> Arc<ParsedRobots> {
        let origin = url.origin().ascii_serialization();
        let entry = {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(entries.entry(origin.clone()).or_default())
        };

        let robots = entry
            .get_or_init(|| async {
                Arc::new(fetch_robots(&self.client, &origin, &self.user_agent).await)
            })
            .await;
        Arc::clone(robots)
    }

    /// Checks whether the URL may be fetched by the configured user agent
    pub async fn is_allowed(&self, url: &Url) -> bool {
        self.get(url).await.is_allowed(url.as_str(), &self.user_agent)
    }
}
