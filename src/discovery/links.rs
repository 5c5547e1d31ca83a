//! HTML link extraction for the crawl strategy
//!
//! This module handles parsing HTML content to extract crawl candidates:
//! - Links from `<a href>` tags
//! - The page's `<link rel="canonical">`

use scraper::{Html, Selector};
use url::Url;

/// A link found on a crawled page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// Absolute URL with the fragment removed
    pub url: String,

    /// True when the anchor carries `rel="nofollow"`
    ///
    /// Such links are still candidates but the crawl does not fetch them.
    pub nofollow: bool,
}

/// Extracts crawl candidates from an HTML page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The page URL, used to resolve relative links
///
/// # Returns
///
/// Links in document order: anchors first, then the canonical link.
pub fn extract_links(html: &str, base_url: &Url) -> Vec<ExtractedLink> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            let nofollow = element
                .value()
                .attr("rel")
                .map(|rel| {
                    rel.split_ascii_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("nofollow"))
                })
                .unwrap_or(false);

            if let Some(url) = element.value().attr("href").and_then(|href| resolve_link(href, base_url)) {
                links.push(ExtractedLink { url, nofollow });
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(url) = element.value().attr("href").and_then(|href| resolve_link(href, base_url)) {
                links.push(ExtractedLink {
                    url,
                    nofollow: false,
                });
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }

    absolute_url.set_fragment(None);
    Some(absolute_url.to_string())
}

/// Returns true if the URL path ends with one of the excluded extensions
///
/// Matching is case-insensitive; extensions may be given with or without the
/// leading dot.
pub fn has_excluded_extension(url: &Url, excluded: &[String]) -> bool {
    let path = url.path().to_ascii_lowercase();
    excluded.iter().any(|ext| {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        !ext.is_empty() && path.ends_with(&format!(".{}", ext))
    })
}

/// Returns true if a Content-Type header denotes an HTML document
pub fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}
