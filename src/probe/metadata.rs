//! HTML metadata extraction
//!
//! Probes record a page's `<title>` and `<link rel="canonical">`. Extraction
//! goes through the [`MetadataExtractor`] trait so the Prober does not depend
//! on a particular HTML parser.

use scraper::{Html, Selector};
use sha1::{Digest, Sha1};
use url::Url;

/// Metadata read from an HTML document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    /// Text of the first `<title>`, trimmed
    pub title: Option<String>,

    /// href of the first canonical link, resolved to an absolute URL
    pub canonical_url: Option<String>,
}

/// Extracts metadata from an HTML body
///
/// Implementations must tolerate missing or malformed elements: absent
/// values are `None`, never an error.
pub trait MetadataExtractor: Send + Sync {
    /// # Arguments
    ///
    /// * `html` - The response body
    /// * `base_url` - The URL the body was served from
    fn extract(&self, html: &str, base_url: &Url) -> PageMetadata;
}

/// [`MetadataExtractor`] backed by a scraper DOM
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlMetadataExtractor;

impl MetadataExtractor for HtmlMetadataExtractor {
    fn extract(&self, html: &str, base_url: &Url) -> PageMetadata {
        let document = Html::parse_document(html);

        PageMetadata {
            title: extract_title(&document),
            canonical_url: extract_canonical(&document, base_url),
        }
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_canonical(document: &Html, base_url: &Url) -> Option<String> {
    let selector = Selector::parse("link[href]").ok()?;

    let href = document
        .select(&selector)
        .find(|element| {
            element
                .value()
                .attr("rel")
                .map(|rel| {
                    rel.split_ascii_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("canonical"))
                })
                .unwrap_or(false)
        })?
        .value()
        .attr("href")?
        .trim();

    if href.is_empty() {
        return None;
    }

    match base_url.join(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Some(href.to_string()),
    }
}

/// Short fingerprint of a title: the first 12 hex chars of its SHA-1
pub fn title_hash(title: &str) -> String {
    let digest = Sha1::digest(title.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(12);
    hash
}
