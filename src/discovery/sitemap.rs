//! Sitemap fetching and parsing
//!
//! Handles `urlset` and `sitemapindex` documents, plain or gzip-compressed.
//! Traversal of nested indexes is an iterative worklist over a [`Frontier`],
//! so cyclic or repeated index entries are fetched once.

use crate::discovery::{Discoverer, DiscoveryIssue, Frontier};
use crate::url::same_host;
use crate::FetchError;
use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;
use std::sync::Mutex;
use url::Url;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A parsed sitemap node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<urlset>`: page URLs from `<url><loc>`
    UrlSet(Vec<String>),

    /// `<sitemapindex>`: nested sitemap URLs from `<sitemap><loc>`
    Index(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootKind {
    UrlSet,
    Index,
}

impl RootKind {
    fn from_tag(tag: &[u8]) -> Result<Self, FetchError> {
        match tag {
            b"urlset" => Ok(RootKind::UrlSet),
            b"sitemapindex" => Ok(RootKind::Index),
            other => Err(FetchError::Parse(format!(
                "unknown sitemap root element <{}>",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    fn entry_tag(self) -> &'static [u8] {
        match self {
            RootKind::UrlSet => b"url",
            RootKind::Index => b"sitemap",
        }
    }
}

/// Decompresses a body when it starts with the gzip magic bytes
///
/// Servers often send `.xml.gz` files as `application/octet-stream` without a
/// `Content-Encoding`, so detection looks at the bytes, not the headers.
pub fn decode_body(body: Vec<u8>) -> Result<Vec<u8>, FetchError> {
    if !body.starts_with(&GZIP_MAGIC) {
        return Ok(body);
    }

    let mut decoded = Vec::new();
    GzDecoder::new(body.as_slice())
        .read_to_end(&mut decoded)
        .map_err(|e| FetchError::Parse(format!("gzip: {}", e)))?;
    Ok(decoded)
}

/// Parses a sitemap XML document
///
/// Namespace prefixes are ignored. Only `<loc>` elements directly inside an
/// entry (`<url>` or `<sitemap>`) count, so `<image:loc>` and similar
/// extensions never leak into the result.
///
/// # Returns
///
/// * `Ok(SitemapDocument)` - The entries of a well-formed document
/// * `Err(FetchError::Parse)` - Malformed XML, an unknown root element or an
///   empty document
pub fn parse_sitemap(xml: &[u8]) -> Result<SitemapDocument, FetchError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut root: Option<RootKind> = None;
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current_loc: Option<String> = None;
    let mut locs = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                match root {
                    None => root = Some(RootKind::from_tag(&name)?),
                    Some(kind) => {
                        if name == b"loc"
                            && stack.len() == 2
                            && stack[1].as_slice() == kind.entry_tag()
                        {
                            current_loc = Some(String::new());
                        }
                    }
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                if root.is_none() {
                    root = Some(RootKind::from_tag(e.local_name().as_ref())?);
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(loc) = current_loc.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|e| FetchError::Parse(e.to_string()))?;
                    loc.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(loc) = current_loc.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
                if let Some(loc) = current_loc.take() {
                    let loc = loc.trim();
                    if !loc.is_empty() {
                        locs.push(loc.to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FetchError::Parse(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(FetchError::Parse("unexpected end of document".to_string()));
    }

    match root {
        Some(RootKind::UrlSet) => Ok(SitemapDocument::UrlSet(locs)),
        Some(RootKind::Index) => Ok(SitemapDocument::Index(locs)),
        None => Err(FetchError::Parse("empty sitemap document".to_string())),
    }
}

impl Discoverer {
    /// Lists the sitemap URLs traversal starts from
    ///
    /// The configured override list wins; one list serves both sites, so only
    /// entries on the site's own host are used. Otherwise `/sitemap.xml` under
    /// the site root plus every `Sitemap:` line of the site's robots.txt.
    pub async fn sitemap_seeds(&self, site_root: &Url) -> Vec<String> {
        if !self.sitemap_overrides.is_empty() {
            return self
                .sitemap_overrides
                .iter()
                .filter(|seed| {
                    Url::parse(seed)
                        .map(|url| same_host(&url, site_root))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
        }

        let mut seeds = Vec::new();
        if let Ok(default) = site_root.join("/sitemap.xml") {
            seeds.push(default.to_string());
        }
        seeds.extend(self.robots.get(site_root).await.sitemaps());
        seeds
    }

    /// Walks every sitemap reachable from the seeds
    ///
    /// # Returns
    ///
    /// Page URLs on the site's host, plus one issue per sitemap node that
    /// could not be fetched or parsed.
    pub async fn crawl_sitemaps(
        &self,
        site_root: &Url,
        seeds: Vec<String>,
    ) -> (Vec<String>, Vec<DiscoveryIssue>) {
        let frontier: Frontier<String, Url> = Frontier::new();
        let found = Mutex::new(Vec::new());
        let issues = Mutex::new(Vec::new());

        for seed in seeds {
            match Url::parse(&seed) {
                Ok(url) => {
                    frontier.push_unique(url.to_string(), url);
                }
                Err(e) => lock(&issues).push(DiscoveryIssue {
                    url: seed,
                    error: FetchError::Parse(e.to_string()),
                }),
            }
        }

        let workers = (0..self.concurrency)
            .map(|_| self.sitemap_worker(site_root, &frontier, &found, &issues));
        futures::future::join_all(workers).await;

        (into_inner(found), into_inner(issues))
    }

    async fn sitemap_worker(
        &self,
        site_root: &Url,
        frontier: &Frontier<String, Url>,
        found: &Mutex<Vec<String>>,
        issues: &Mutex<Vec<DiscoveryIssue>>,
    ) {
        while let Some(sitemap_url) = frontier.next().await {
            match self.fetch_sitemap(&sitemap_url).await {
                Ok(SitemapDocument::Index(children)) => {
                    tracing::debug!(
                        "Sitemap index {} lists {} sitemaps",
                        sitemap_url,
                        children.len()
                    );
                    for child in children {
                        match sitemap_url.join(&child) {
                            Ok(child) => {
                                frontier.push_unique(child.to_string(), child);
                            }
                            Err(e) => tracing::debug!("Skipping sitemap entry {}: {}", child, e),
                        }
                    }
                }
                Ok(SitemapDocument::UrlSet(entries)) => {
                    tracing::debug!("Sitemap {} lists {} URLs", sitemap_url, entries.len());
                    let same_site = entries.into_iter().filter(|entry| {
                        Url::parse(entry)
                            .map(|url| same_host(&url, site_root))
                            .unwrap_or(false)
                    });
                    lock(found).extend(same_site);
                }
                Err(error) => {
                    tracing::warn!("Sitemap {} failed: {}", sitemap_url, error);
                    lock(issues).push(DiscoveryIssue {
                        url: sitemap_url.to_string(),
                        error,
                    });
                }
            }
            frontier.done();
        }
    }

    /// Fetches and parses a single sitemap node
    async fn fetch_sitemap(&self, url: &Url) -> Result<SitemapDocument, FetchError> {
        self.throttle(url).await;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::Status(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        parse_sitemap(&decode_body(body.to_vec())?)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn into_inner<T>(mutex: Mutex<T>) -> T {
    mutex
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
