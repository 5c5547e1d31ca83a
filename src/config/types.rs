use crate::discovery::DiscoveryMode;
use crate::url::{NormalizeOptions, DEFAULT_TRACKING_PARAMS};
use serde::Deserialize;

/// Default user agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "URLCompareBot/1.0 (+contact)";

/// Main configuration structure for url-compare
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Root URL of the first site (e.g. the legacy site)
    pub site_a: Option<String>,

    /// Root URL of the second site (e.g. the migrated site)
    pub site_b: Option<String>,

    pub discovery: DiscoveryConfig,
    pub http: HttpConfig,
    pub normalize: NormalizeConfig,
    pub output: OutputConfig,
}

/// URL discovery configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DiscoveryConfig {
    /// Which strategies to run
    pub mode: DiscoveryMode,

    /// Maximum number of link hops from the homepage
    pub crawl_max_depth: u32,

    /// Explicit sitemap URLs; replaces the default `/sitemap.xml` lookup
    pub sitemaps: Vec<String>,

    /// Path suffixes (e.g. ".pdf") never taken from crawled links
    pub exclude_extensions: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mode: DiscoveryMode::Both,
            crawl_max_depth: 2,
            sitemaps: Vec::new(),
            exclude_extensions: Vec::new(),
        }
    }
}

/// HTTP behavior shared by discovery and probing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HttpConfig {
    /// Number of concurrent worker tasks
    pub concurrency: u32,

    /// Sustained requests per second per host (0 disables limiting)
    pub rate_limit_rps: f64,

    /// Token bucket capacity per host
    pub rate_limit_burst: u32,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Maximum redirect hops followed per probe
    pub max_redirects: u32,

    /// Retries after the first attempt for transient failures
    pub retry: u32,

    /// Base delay for exponential backoff (milliseconds)
    pub retry_backoff_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds)
    pub retry_backoff_max_ms: u64,

    /// User agent header value
    pub user_agent: String,

    /// Respect robots.txt during crawl and probe
    pub follow_robots: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            rate_limit_rps: 2.0,
            rate_limit_burst: 1,
            timeout_ms: 10_000,
            max_redirects: 5,
            retry: 2,
            retry_backoff_ms: 1_000,
            retry_backoff_max_ms: 30_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            follow_robots: true,
        }
    }
}

/// Path key normalization flags
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NormalizeConfig {
    /// Keep (filtered, sorted) query strings in path keys
    pub include_query: bool,

    /// Keep fragments in path keys
    pub include_fragment: bool,

    /// Extra tracking parameters removed from queries (`utm_*` and `fbclid` are always removed)
    pub tracking_params: Vec<String>,
}

impl Default for NormalizeConfig {
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

impl NormalizeConfig {
    /// Builds the normalizer options for these flags
    pub fn options(&self) -> NormalizeOptions {
        NormalizeOptions {
            include_query: self.include_query,
            include_fragment: self.include_fragment,
            tracking_params: self.tracking_params.clone(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Path to the comparison CSV file
    pub csv_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: "urls-compare.csv".to_string(),
        }
    }
}
