//! HTTP probing module
//!
//! This module probes every discovered URL of a site:
//! - robots.txt check before the first request
//! - HEAD with GET fallback on every hop
//! - Manual redirect following with loop and length limits
//! - Retries with exponential backoff for transient failures
//! - Title and canonical extraction for HTML pages
//!
//! All requests share one per-host token bucket.

mod fetcher;
mod limiter;
mod metadata;

pub use fetcher::{build_http_client, content_type, is_redirect, location, needs_get_fallback};
pub use limiter::HostRateLimiter;
pub use metadata::{title_hash, HtmlMetadataExtractor, MetadataExtractor, PageMetadata};

use crate::config::Config;
use crate::discovery::{DiscoveredUrl, Discovery};
use crate::discovery::is_html;
use crate::robots::RobotsCache;
use crate::url::{host_key, NormalizedUrl};
use crate::FetchError;
use reqwest::{redirect::Policy, Client, Method, Response};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

/// Probe results of one site, keyed by normalized URL
pub type ProbeResults = HashMap<NormalizedUrl, ProbeResult>;

/// One followed redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHop {
    /// The 3xx status that caused the hop
    pub status: u16,
    /// Absolute target URL
    pub target: String,
}

/// Warning attached to a probe result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeNote {
    RobotsDisallowed,
    RedirectLoop,
    MaxRedirectsExceeded,
    RedirectMissingLocation,
    Timeout,
    NetworkError,
    RateLimited,
    ServerError,
    InvalidUrl,
}

impl ProbeNote {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeNote::RobotsDisallowed => "robots_disallowed",
            ProbeNote::RedirectLoop => "redirect_loop",
            ProbeNote::MaxRedirectsExceeded => "max_redirects_exceeded",
            ProbeNote::RedirectMissingLocation => "redirect_missing_location",
            ProbeNote::Timeout => "timeout",
            ProbeNote::NetworkError => "network_error",
            ProbeNote::RateLimited => "rate_limited",
            ProbeNote::ServerError => "server_error",
            ProbeNote::InvalidUrl => "invalid_url",
        }
    }

    /// The note recorded for a failure that survived every retry
    fn for_terminal_error(error: &FetchError) -> Option<ProbeNote> {
        match error {
            FetchError::Timeout => Some(ProbeNote::Timeout),
            FetchError::Connect(_) | FetchError::Network(_) => Some(ProbeNote::NetworkError),
            FetchError::Status(429) => Some(ProbeNote::RateLimited),
            FetchError::Status(status) if *status >= 500 => Some(ProbeNote::ServerError),
            _ => None,
        }
    }
}

impl fmt::Display for ProbeNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing one URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    /// The URL that was probed
    pub url: String,
    /// Status of the first response
    pub initial_status: Option<u16>,
    /// Status of the last response observed
    pub final_status: Option<u16>,
    pub redirect_chain: Vec<RedirectHop>,
    /// Target of the first redirect, even when it was not followed
    pub first_redirect_target: Option<String>,
    pub final_url: Option<String>,
    /// Wall-clock time of the final attempt, redirects included
    pub response_time_ms: Option<u64>,
    /// MIME type of the final response
    pub content_type: Option<String>,
    pub canonical_url: Option<String>,
    pub title: Option<String>,
    pub title_hash: Option<String>,
    pub error: Option<FetchError>,
    pub notes: Vec<ProbeNote>,
}

impl ProbeResult {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }

    /// A result for a URL that was never requested
    fn not_requested(url: &str, error: FetchError, note: ProbeNote) -> Self {
        Self {
            error: Some(error),
            notes: vec![note],
            ..Self::new(url)
        }
    }

    pub fn redirect_hops(&self) -> usize {
        self.redirect_chain.len()
    }
}

/// What one attempt at walking a redirect chain produced
struct ChainOutcome {
    initial_status: Option<u16>,
    final_status: Option<u16>,
    chain: Vec<RedirectHop>,
    first_redirect_target: Option<String>,
    final_url: Url,
    /// The last response and the method that produced it
    last_response: Option<(Response, Method)>,
    error: Option<FetchError>,
    notes: Vec<ProbeNote>,
}

impl ChainOutcome {
    /// The failure this attempt ended with, counting transient statuses
    fn failure(&self) -> Option<FetchError> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        match self.final_status {
            Some(status) if crate::is_transient_status(status) => Some(FetchError::Status(status)),
            _ => None,
        }
    }
}

/// Computes the delay before retry number `attempt + 1`
///
/// `base * 2^attempt`, capped at `max`.
pub fn backoff_delay(base_ms: u64, max_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
}

/// Identity of a URL within one redirect chain
///
/// Only the fragment is dropped; it never reaches the server. Trailing
/// slashes, duplicate slashes and query parameters are significant.
fn chain_key(url: &Url) -> Url {
    let mut key = url.clone();
    key.set_fragment(None);
    key
}

/// Probes discovered URLs concurrently
pub struct Prober {
    client: Client,
    robots: RobotsCache,
    limiter: HostRateLimiter,
    extractor: Box<dyn MetadataExtractor>,
    follow_robots: bool,
    max_redirects: usize,
    retry: u32,
    retry_backoff_ms: u64,
    retry_backoff_max_ms: u64,
    concurrency: usize,
}

impl Prober {
    /// Creates a Prober from the run configuration
    ///
    /// The client never follows redirects; chains are walked hop by hop.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = &config.http;
        let client = build_http_client(http, Policy::none())?;

        Ok(Self {
            robots: RobotsCache::new(client.clone(), http.user_agent.clone()),
            client,
            limiter: HostRateLimiter::new(http.rate_limit_rps, http.rate_limit_burst),
            extractor: Box::new(HtmlMetadataExtractor),
            follow_robots: http.follow_robots,
            max_redirects: http.max_redirects as usize,
            retry: http.retry,
            retry_backoff_ms: http.retry_backoff_ms,
            retry_backoff_max_ms: http.retry_backoff_max_ms,
            concurrency: http.concurrency.max(1) as usize,
        })
    }

    /// Replaces the HTML metadata extractor
    pub fn with_extractor(mut self, extractor: Box<dyn MetadataExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Probes every URL of a discovery result
    ///
    /// `concurrency` workers pull from a shared queue and send results over a
    /// channel that is drained once every worker has finished.
    pub async fn probe(&self, discovery: &Discovery) -> ProbeResults {
        let queue: Mutex<VecDeque<&DiscoveredUrl>> = Mutex::new(discovery.sorted().into());
        let (tx, mut rx) = mpsc::unbounded_channel();

        tracing::info!(
            "Probing {} URLs with {} workers",
            discovery.len(),
            self.concurrency
        );

        let workers = (0..self.concurrency).map(|_| self.probe_worker(&queue, &tx));
        futures::future::join_all(workers).await;
        drop(tx);

        let mut results = ProbeResults::with_capacity(discovery.len());
        while let Some((key, result)) = rx.recv().await {
            results.insert(key, result);
        }

        tracing::info!("Probed {} URLs", results.len());
        results
    }

    async fn probe_worker(
        &self,
        queue: &Mutex<VecDeque<&DiscoveredUrl>>,
        tx: &mpsc::UnboundedSender<(NormalizedUrl, ProbeResult)>,
    ) {
        loop {
            let next = queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop_front();
            let Some(discovered) = next else {
                break;
            };

            let result = self.probe_url(&discovered.url).await;
            if tx.send((discovered.normalized.clone(), result)).is_err() {
                break;
            }
        }
    }

    /// Probes a single URL
    ///
    /// Never fails: every failure is recorded in the result's `error` and
    /// `notes`.
    pub async fn probe_url(&self, raw_url: &str) -> ProbeResult {
        let url = match Url::parse(raw_url.trim()) {
            Ok(url) => url,
            Err(e) => {
                return ProbeResult::not_requested(
                    raw_url,
                    FetchError::Parse(e.to_string()),
                    ProbeNote::InvalidUrl,
                )
            }
        };

        if self.follow_robots && !self.robots.is_allowed(&url).await {
            tracing::debug!("Not probing {}: disallowed by robots.txt", url);
            return ProbeResult::not_requested(
                raw_url,
                FetchError::RobotsDisallowed,
                ProbeNote::RobotsDisallowed,
            );
        }

        let mut attempt = 0;
        let (outcome, elapsed) = loop {
            let start = Instant::now();
            let outcome = self.follow_chain(&url).await;
            let elapsed = start.elapsed();

            match outcome.failure() {
                Some(failure) if failure.is_transient() && attempt < self.retry => {
                    let delay =
                        backoff_delay(self.retry_backoff_ms, self.retry_backoff_max_ms, attempt);
                    tracing::debug!(
                        "Retrying {} in {:?} after {} (attempt {}/{})",
                        url,
                        delay,
                        failure,
                        attempt + 1,
                        self.retry
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                _ => break (outcome, elapsed),
            }
        };

        let result = self.finish(raw_url, outcome, elapsed).await;
        tracing::debug!(
            "Probed {}: {:?} -> {:?} ({} hops)",
            raw_url,
            result.initial_status,
            result.final_status,
            result.redirect_hops()
        );
        result
    }

    /// Walks the redirect chain starting at `url` once
    async fn follow_chain(&self, url: &Url) -> ChainOutcome {
        let mut seen: HashSet<Url> = HashSet::new();
        seen.insert(chain_key(url));

        let mut outcome = ChainOutcome {
            initial_status: None,
            final_status: None,
            chain: Vec::new(),
            first_redirect_target: None,
            final_url: url.clone(),
            last_response: None,
            error: None,
            notes: Vec::new(),
        };

        loop {
            let current = outcome.final_url.clone();
            let (response, method) = match self.send_hop(&current).await {
                Ok(sent) => sent,
                Err(error) => {
                    outcome.error = Some(error);
                    return outcome;
                }
            };

            let status = response.status().as_u16();
            outcome.initial_status.get_or_insert(status);
            outcome.final_status = Some(status);

            if !is_redirect(status) {
                outcome.last_response = Some((response, method));
                return outcome;
            }

            let target = location(&response).and_then(|location| current.join(&location).ok());
            outcome.last_response = Some((response, method));

            let Some(target) = target else {
                outcome.notes.push(ProbeNote::RedirectMissingLocation);
                return outcome;
            };

            outcome
                .first_redirect_target
                .get_or_insert_with(|| target.to_string());

            if outcome.chain.len() >= self.max_redirects {
                outcome.notes.push(ProbeNote::MaxRedirectsExceeded);
                return outcome;
            }

            if !seen.insert(chain_key(&target)) {
                tracing::debug!("Redirect loop at {} (from {})", target, url);
                outcome.notes.push(ProbeNote::RedirectLoop);
                outcome.error = Some(FetchError::RedirectLoop(target.to_string()));
                return outcome;
            }

            outcome.chain.push(RedirectHop {
                status,
                target: target.to_string(),
            });
            outcome.final_url = target;
        }
    }

    /// Sends HEAD, falling back to GET on 405/501 or a transport failure
    async fn send_hop(&self, url: &Url) -> Result<(Response, Method), FetchError> {
        self.throttle(url).await;

        match fetcher::send(&self.client, Method::HEAD, url).await {
            Ok(response) if !needs_get_fallback(response.status()) => {
                return Ok((response, Method::HEAD))
            }
            Ok(response) => {
                tracing::debug!("HEAD {} returned {}, retrying with GET", url, response.status())
            }
            Err(e) => tracing::debug!("HEAD {} failed ({}), retrying with GET", url, e),
        }

        self.throttle(url).await;
        let response = fetcher::send(&self.client, Method::GET, url).await?;
        Ok((response, Method::GET))
    }

    /// Turns the last attempt into a result, extracting metadata when possible
    async fn finish(&self, raw_url: &str, outcome: ChainOutcome, elapsed: Duration) -> ProbeResult {
        let mut result = ProbeResult::new(raw_url);
        let failure = outcome.failure();

        result.initial_status = outcome.initial_status;
        result.final_status = outcome.final_status;
        result.redirect_chain = outcome.chain;
        result.first_redirect_target = outcome.first_redirect_target;
        result.final_url = Some(outcome.final_url.to_string());
        result.response_time_ms = Some(elapsed.as_millis() as u64);
        result.notes = outcome.notes;

        if let Some(note) = failure.as_ref().and_then(ProbeNote::for_terminal_error) {
            result.notes.push(note);
        }
        result.error = outcome.error.or(failure);

        let Some((response, method)) = outcome.last_response else {
            return result;
        };

        result.content_type = content_type(&response);

        let is_success = response.status().is_success();
        let is_html_page = result.content_type.as_deref().map(is_html).unwrap_or(false);
        if !is_success || !is_html_page {
            return result;
        }

        let body = if method == Method::GET {
            response.text().await.ok()
        } else {
            drop(response);
            self.fetch_body(&outcome.final_url).await
        };

        if let Some(body) = body {
            let metadata = self.extractor.extract(&body, &outcome.final_url);
            result.title_hash = metadata.title.as_deref().map(title_hash);
            result.title = metadata.title;
            result.canonical_url = metadata.canonical_url;
        }

        result
    }

    /// GETs the body of a page that was only reached with HEAD
    async fn fetch_body(&self, url: &Url) -> Option<String> {
        self.throttle(url).await;

        let response = match fetcher::send(&self.client, Method::GET, url).await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!("Metadata GET {} returned {}", url, response.status());
                return None;
            }
            Err(e) => {
                tracing::debug!("Metadata GET {} failed: {}", url, e);
                return None;
            }
        };

        response.text().await.ok()
    }

    async fn throttle(&self, url: &Url) {
        if let Some(host) = host_key(url) {
            self.limiter.acquire(&host).await;
        }
    }
}
