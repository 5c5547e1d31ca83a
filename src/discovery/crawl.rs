//! Breadth-first crawl discovery
//!
//! Starts at the site root (depth 0) and follows same-host links up to the
//! configured depth. The frontier's visited-set is keyed by the normalized
//! URL, so every URL is fetched at most once.

use crate::discovery::links::{extract_links, has_excluded_extension, is_html};
use crate::discovery::{Discoverer, DiscoveryIssue, Frontier};
use crate::url::{normalize, same_host, NormalizedUrl};
use crate::FetchError;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use url::Url;

/// A page waiting in the crawl frontier
#[derive(Debug, Clone)]
struct CrawlItem {
    url: Url,
    depth: u32,
    /// False for links that were marked `rel="nofollow"`
    follow: bool,
}

/// Outcome of fetching one crawled page
enum PageFetch {
    Html { final_url: Url, body: String },
    Skipped,
}

/// State shared by the crawl workers of one site
struct CrawlRun {
    frontier: Frontier<NormalizedUrl, CrawlItem>,
    /// Keys so far reached only through `nofollow` links
    nofollow_only: Mutex<HashSet<NormalizedUrl>>,
    found: Mutex<Vec<String>>,
    issues: Mutex<Vec<DiscoveryIssue>>,
}

impl CrawlRun {
    fn new() -> Self {
        Self {
            frontier: Frontier::new(),
            nofollow_only: Mutex::new(HashSet::new()),
            found: Mutex::new(Vec::new()),
            issues: Mutex::new(Vec::new()),
        }
    }

    /// Queues a link found on a page
    ///
    /// A key first reached through `nofollow` is queued again, once, when a
    /// followed link to it turns up later.
    fn enqueue(&self, key: NormalizedUrl, item: CrawlItem) {
        let mut nofollow_only = lock(&self.nofollow_only);

        if !item.follow {
            if self.frontier.push_unique(key.clone(), item) {
                nofollow_only.insert(key);
            }
            return;
        }

        if !self.frontier.push_unique(key.clone(), item.clone()) && nofollow_only.remove(&key) {
            tracing::trace!("Following {} after an earlier nofollow link", item.url);
            self.frontier.push(item);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Discoverer {
    /// Crawls the site and returns every candidate URL found
    ///
    /// Candidates include pages at the depth limit and `nofollow` links, which
    /// are recorded but not fetched unless a followed link also reaches them.
    /// URLs disallowed by robots.txt are left out entirely when robots
    /// handling is on.
    pub async fn crawl(&self, site_root: &Url) -> (Vec<String>, Vec<DiscoveryIssue>) {
        let run = CrawlRun::new();

        match normalize(site_root.as_str(), &self.normalize) {
            Ok(key) => {
                run.frontier.push_unique(
                    key,
                    CrawlItem {
                        url: site_root.clone(),
                        depth: 0,
                        follow: true,
                    },
                );
            }
            Err(e) => {
                tracing::warn!("Cannot crawl {}: {}", site_root, e);
                return (Vec::new(), Vec::new());
            }
        }

        let workers = (0..self.concurrency).map(|_| self.crawl_worker(site_root, &run));
        futures::future::join_all(workers).await;

        tracing::debug!(
            "Crawl of {} saw {} distinct URLs",
            site_root,
            run.frontier.visited_len()
        );

        let found = run
            .found
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let issues = run
            .issues
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (found, issues)
    }

    async fn crawl_worker(&self, site_root: &Url, run: &CrawlRun) {
        while let Some(item) = run.frontier.next().await {
            self.crawl_page(site_root, item, run).await;
            run.frontier.done();
        }
    }

    async fn crawl_page(&self, site_root: &Url, item: CrawlItem, run: &CrawlRun) {
        if self.follow_robots && !self.robots.is_allowed(&item.url).await {
            tracing::debug!("Skipping {}: disallowed by robots.txt", item.url);
            return;
        }

        lock(&run.found).push(item.url.to_string());

        if item.depth >= self.crawl_max_depth || !item.follow {
            return;
        }

        let (final_url, body) = match self.fetch_page(&item.url).await {
            Ok(PageFetch::Html { final_url, body }) => (final_url, body),
            Ok(PageFetch::Skipped) => return,
            Err(error) => {
                tracing::warn!("Crawl fetch of {} failed: {}", item.url, error);
                lock(&run.issues).push(DiscoveryIssue {
                    url: item.url.to_string(),
                    error,
                });
                return;
            }
        };

        let links = extract_links(&body, &final_url);
        tracing::debug!(
            "Found {} links on {} (depth {})",
            links.len(),
            final_url,
            item.depth
        );

        for link in links {
            let Ok(url) = Url::parse(&link.url) else {
                continue;
            };
            if !same_host(&url, site_root) || has_excluded_extension(&url, &self.exclude_extensions)
            {
                continue;
            }
            let Ok(key) = normalize(url.as_str(), &self.normalize) else {
                continue;
            };

            run.enqueue(
                key,
                CrawlItem {
                    url,
                    depth: item.depth + 1,
                    follow: !link.nofollow,
                },
            );
        }
    }

    /// GETs a page and returns its body when it is a 200 HTML response
    async fn fetch_page(&self, url: &Url) -> Result<PageFetch, FetchError> {
        self.throttle(url).await;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if status != 200 || !is_html(&content_type) {
            tracing::debug!(
                "Not following links on {} (status {}, content type '{}')",
                url,
                status,
                content_type
            );
            return Ok(PageFetch::Skipped);
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        Ok(PageFetch::Html { final_url, body })
    }
}
