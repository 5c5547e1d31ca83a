use crate::UrlError;
use std::fmt;
use url::form_urlencoded;
use url::Url;

/// Tracking parameters removed by default in addition to `utm_*` and `fbclid`
pub const DEFAULT_TRACKING_PARAMS: &[&str] = &["gclid", "_ga", "mc_cid", "mc_eid"];

/// Flags controlling which URL parts survive normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Keep query parameters (tracking parameters are still removed)
    pub include_query: bool,

    /// Keep the fragment
    pub include_fragment: bool,

    /// Denylist of tracking parameters, on top of `utm_*` and `fbclid`
    pub tracking_params: Vec<String>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            include_query: false,
            include_fragment: false,
            tracking_params: DEFAULT_TRACKING_PARAMS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// A URL reduced to its canonical parts
///
/// Ordering is lexicographic over (scheme, host, port, path, query, fragment),
/// which gives the comparator a deterministic tie-break when several URLs share
/// a path key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedUrl {
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: Vec<(String, String)>,
    fragment: Option<String>,
}

impl NormalizedUrl {
    /// Host plus explicit port, e.g. `example.com` or `127.0.0.1:8080`
    pub fn host_key(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }

    /// Scheme, host and port, e.g. `https://example.com`
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.host_key())
    }

    /// The join key used to match pages across sites
    ///
    /// The path, followed by `?query` and `#fragment` when those parts were
    /// kept during normalization.
    pub fn path_key(&self) -> String {
        let mut key = self.path.clone();
        let query = self.query_string();
        if !query.is_empty() {
            key.push('?');
            key.push_str(&query);
        }
        if let Some(fragment) = &self.fragment {
            key.push('#');
            key.push_str(fragment);
        }
        key
    }

    fn query_string(&self) -> String {
        if self.query.is_empty() {
            return String::new();
        }
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish()
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.origin(), self.path_key())
    }
}

/// Normalizes a URL according to url-compare's normalization rules
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed, non-HTTP(S) or host-less
/// 2. Lowercase the scheme and host
/// 3. Drop the port when it is the scheme default (80/443)
/// 4. Normalize path:
///    - Remove dot segments (. and ..)
///    - Collapse runs of `/`
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 5. Drop the fragment unless `include_fragment`
/// 6. Drop the query unless `include_query`; otherwise remove tracking
///    parameters and sort the rest by key, then value
///
/// Normalization is idempotent: normalizing the rendered result yields the
/// same value.
///
/// # Examples
///
/// ```
/// use url_compare::url::{normalize, NormalizeOptions};
///
/// let url = normalize("http://EXAMPLE.com:80/a//b/", &NormalizeOptions::default()).unwrap();
/// assert_eq!(url.to_string(), "http://example.com/a/b");
/// assert_eq!(url.path_key(), "/a/b");
/// ```
pub fn normalize(url_str: &str, options: &NormalizeOptions) -> Result<NormalizedUrl, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    let scheme = url.scheme().to_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            scheme
        )));
    }

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return Err(UrlError::MissingDomain),
    };

    let port = url.port().filter(|port| Some(*port) != default_port(&scheme));

    let path = normalize_path(url.path());

    let query = if options.include_query && url.query().is_some() {
        filter_and_sort_query_params(&url, options)
    } else {
        Vec::new()
    };

    let fragment = if options.include_fragment {
        url.fragment()
            .filter(|fragment| !fragment.is_empty())
            .map(str::to_string)
    } else {
        None
    };

    Ok(NormalizedUrl {
        scheme,
        host,
        port,
        path,
        query,
        fragment,
    })
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Normalizes a URL path by removing dot segments, empty segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            // Empty segments come from repeated slashes
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url, options: &NormalizeOptions) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key, options))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str, options: &NormalizeOptions) -> bool {
    key.starts_with("utm_") || key == "fbclid" || options.tracking_params.iter().any(|p| p == key)
}
