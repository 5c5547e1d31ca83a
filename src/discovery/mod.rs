//! URL discovery module
//!
//! This module builds the candidate URL set of one site from two strategies:
//! - Sitemap traversal (`urlset` and `sitemapindex`, plain or gzip)
//! - Bounded breadth-first crawling of same-host links
//!
//! Results are deduplicated on the normalized URL. A URL found by both
//! strategies is reported once with [`UrlSource::Both`].

mod crawl;
mod frontier;
mod links;
mod sitemap;

pub use frontier::Frontier;
pub use links::{extract_links, has_excluded_extension, is_html, ExtractedLink};
pub use sitemap::{decode_body, parse_sitemap, SitemapDocument};

use crate::config::Config;
use crate::probe::build_http_client;
use crate::probe::HostRateLimiter;
use crate::robots::RobotsCache;
use crate::url::{host_key, normalize, NormalizeOptions, NormalizedUrl};
use crate::FetchError;
use reqwest::{redirect::Policy, Client};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Which discovery strategies to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    Sitemap,
    Crawl,
    #[default]
    Both,
}

impl DiscoveryMode {
    pub fn includes_sitemap(self) -> bool {
        matches!(self, DiscoveryMode::Sitemap | DiscoveryMode::Both)
    }

    pub fn includes_crawl(self) -> bool {
        matches!(self, DiscoveryMode::Crawl | DiscoveryMode::Both)
    }
}

impl FromStr for DiscoveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sitemap" => Ok(DiscoveryMode::Sitemap),
            "crawl" => Ok(DiscoveryMode::Crawl),
            "both" => Ok(DiscoveryMode::Both),
            other => Err(format!(
                "unknown discovery mode '{}' (expected sitemap, crawl or both)",
                other
            )),
        }
    }
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiscoveryMode::Sitemap => "sitemap",
            DiscoveryMode::Crawl => "crawl",
            DiscoveryMode::Both => "both",
        };
        write!(f, "{}", s)
    }
}

/// How a URL was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlSource {
    Sitemap,
    Crawl,
    Both,
}

impl UrlSource {
    /// Combines two sightings of the same URL
    pub fn merge(self, other: UrlSource) -> UrlSource {
        if self == other {
            self
        } else {
            UrlSource::Both
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UrlSource::Sitemap => "sitemap",
            UrlSource::Crawl => "crawl",
            UrlSource::Both => "both",
        }
    }
}

impl fmt::Display for UrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL in the candidate set of one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredUrl {
    /// First raw spelling seen
    pub url: String,
    pub normalized: NormalizedUrl,
    pub source: UrlSource,
}

/// A sitemap node or crawled page that could not be processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryIssue {
    pub url: String,
    pub error: FetchError,
}

impl fmt::Display for DiscoveryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.error)
    }
}

/// The discovery result for one site
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub urls: HashMap<NormalizedUrl, DiscoveredUrl>,
    pub issues: Vec<DiscoveryIssue>,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw URL, merging its source into an existing entry
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A new entry was created
    /// * `Ok(false)` - The URL was already known; only its source was merged
    /// * `Err(UrlError)` - The URL cannot be normalized
    pub fn insert(
        &mut self,
        raw: &str,
        source: UrlSource,
        options: &NormalizeOptions,
    ) -> crate::UrlResult<bool> {
        let normalized = normalize(raw, options)?;

        if let Some(existing) = self.urls.get_mut(&normalized) {
            existing.source = existing.source.merge(source);
            return Ok(false);
        }

        self.urls.insert(
            normalized.clone(),
            DiscoveredUrl {
                url: raw.to_string(),
                normalized,
                source,
            },
        );
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Discovered URLs ordered by normalized URL
    pub fn sorted(&self) -> Vec<&DiscoveredUrl> {
        let mut urls: Vec<_> = self.urls.values().collect();
        urls.sort_by(|a, b| a.normalized.cmp(&b.normalized));
        urls
    }

    /// Number of URLs found through each source
    pub fn source_counts(&self) -> HashMap<UrlSource, usize> {
        let mut counts = HashMap::new();
        for url in self.urls.values() {
            *counts.entry(url.source).or_insert(0) += 1;
        }
        counts
    }
}

/// Discovers the URL set of a site
///
/// One Discoverer can run against several sites. Its robots.txt cache and
/// rate limiter are keyed by host, so runs against different sites do not
/// interfere.
pub struct Discoverer {
    client: Client,
    robots: RobotsCache,
    limiter: HostRateLimiter,
    normalize: NormalizeOptions,
    follow_robots: bool,
    crawl_max_depth: u32,
    exclude_extensions: Vec<String>,
    sitemap_overrides: Vec<String>,
    concurrency: usize,
}

impl Discoverer {
    /// Creates a Discoverer from the run configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Discoverer)` - Ready to run
    /// * `Err(reqwest::Error)` - The HTTP client could not be built
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = &config.http;
        let client = build_http_client(http, Policy::limited(http.max_redirects as usize))?;

        Ok(Self {
            robots: RobotsCache::new(client.clone(), http.user_agent.clone()),
            client,
            limiter: HostRateLimiter::new(http.rate_limit_rps, http.rate_limit_burst),
            normalize: config.normalize.options(),
            follow_robots: http.follow_robots,
            crawl_max_depth: config.discovery.crawl_max_depth,
            exclude_extensions: config.discovery.exclude_extensions.clone(),
            sitemap_overrides: config.discovery.sitemaps.clone(),
            concurrency: http.concurrency.max(1) as usize,
        })
    }

    /// Discovers every candidate URL of a site
    ///
    /// Never fails: fetch and parse failures of individual sitemap nodes or
    /// pages are collected in [`Discovery::issues`].
    ///
    /// # Arguments
    ///
    /// * `site_root` - The site's root URL; also the crawl's starting page
    /// * `mode` - Which strategies to run
    pub async fn discover(&self, site_root: &Url, mode: DiscoveryMode) -> Discovery {
        let mut discovery = Discovery::new();

        if mode.includes_sitemap() {
            let seeds = self.sitemap_seeds(site_root).await;
            tracing::info!("Reading {} sitemap(s) for {}", seeds.len(), site_root);

            let (urls, issues) = self.crawl_sitemaps(site_root, seeds).await;
            self.record(&mut discovery, urls, UrlSource::Sitemap);
            discovery.issues.extend(issues);
        }

        if mode.includes_crawl() {
            tracing::info!(
                "Crawling {} to depth {}",
                site_root,
                self.crawl_max_depth
            );

            let (urls, issues) = self.crawl(site_root).await;
            self.record(&mut discovery, urls, UrlSource::Crawl);
            discovery.issues.extend(issues);
        }

        tracing::info!(
            "Discovered {} URLs on {} ({} issues)",
            discovery.len(),
            site_root,
            discovery.issues.len()
        );

        discovery
    }

    fn record(&self, discovery: &mut Discovery, urls: Vec<String>, source: UrlSource) {
        for url in urls {
            if let Err(e) = discovery.insert(&url, source, &self.normalize) {
                tracing::debug!("Ignoring discovered URL {}: {}", url, e);
            }
        }
    }

    /// Waits for a rate-limit token for the URL's host
    async fn throttle(&self, url: &Url) {
        if let Some(host) = host_key(url) {
            self.limiter.acquire(&host).await;
        }
    }
}
