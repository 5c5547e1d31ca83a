//! Comparison coordinator - main run orchestration logic
//!
//! This module runs the whole comparison:
//! - Discovery of both sites
//! - Probing of every discovered URL
//! - The cross-site join and classification
//!
//! Each site's discovery and probing run concurrently with the other site's.
//! The comparator starts only once both sites are fully probed.

use crate::compare::{compare, ComparisonRecord};
use crate::config::{validate, Config};
use crate::discovery::{Discoverer, Discovery, DiscoveryMode};
use crate::output::ComparisonSummary;
use crate::probe::{ProbeResults, Prober};
use crate::{CompareError, ConfigError};
use chrono::{DateTime, Utc};
use url::Url;

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct ComparisonRun {
    /// One record per path key, ordered by path key
    pub records: Vec<ComparisonRecord>,
    pub summary: ComparisonSummary,
    /// Number of URLs discovered on each site
    pub discovered_a: usize,
    pub discovered_b: usize,
    /// Non-fatal discovery failures on each site
    pub discovery_issues_a: usize,
    pub discovery_issues_b: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ComparisonRun {
    /// True when no record carries notes or a failing class
    pub fn is_clean(&self) -> bool {
        self.records.iter().all(ComparisonRecord::is_clean)
    }

    /// Wall-clock duration of the run in seconds
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// Main comparison coordinator structure
pub struct Coordinator {
    site_a: Url,
    site_b: Url,
    mode: DiscoveryMode,
    discoverer: Discoverer,
    prober: Prober,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration; validated here
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CompareError)` - Invalid configuration or HTTP client setup failure
    pub fn new(config: Config) -> Result<Self, CompareError> {
        validate(&config)?;

        let site_a = parse_site(config.site_a.as_deref(), "site-a")?;
        let site_b = parse_site(config.site_b.as_deref(), "site-b")?;

        Ok(Self {
            site_a,
            site_b,
            mode: config.discovery.mode,
            discoverer: Discoverer::new(&config)?,
            prober: Prober::new(&config)?,
        })
    }

    /// Runs discovery, probing and comparison for both sites
    pub async fn run(&self) -> Result<ComparisonRun, CompareError> {
        let started_at = Utc::now();
        tracing::info!(
            "Comparing {} with {} (discovery: {})",
            self.site_a,
            self.site_b,
            self.mode
        );

        let ((discovery_a, probes_a), (discovery_b, probes_b)) =
            tokio::join!(self.run_site(&self.site_a), self.run_site(&self.site_b));

        tracing::info!("Comparing results");
        let records = compare(&discovery_a, &probes_a, &discovery_b, &probes_b);
        let summary = ComparisonSummary::from_records(&records);
        let finished_at = Utc::now();

        tracing::info!(
            "Compared {} paths in {}s",
            records.len(),
            (finished_at - started_at).num_seconds()
        );

        Ok(ComparisonRun {
            records,
            summary,
            discovered_a: discovery_a.len(),
            discovered_b: discovery_b.len(),
            discovery_issues_a: discovery_a.issues.len(),
            discovery_issues_b: discovery_b.issues.len(),
            started_at,
            finished_at,
        })
    }

    async fn run_site(&self, site: &Url) -> (Discovery, ProbeResults) {
        let discovery = self.discoverer.discover(site, self.mode).await;
        for issue in &discovery.issues {
            tracing::debug!("Discovery issue on {}: {}", site, issue);
        }

        let probes = self.prober.probe(&discovery).await;
        (discovery, probes)
    }
}

fn parse_site(site: Option<&str>, name: &str) -> Result<Url, ConfigError> {
    let site = site.ok_or_else(|| ConfigError::Validation(format!("{} is required", name)))?;
    Url::parse(site).map_err(|e| ConfigError::InvalidUrl(format!("{} '{}': {}", name, site, e)))
}

/// Runs a full comparison with the given configuration
///
/// Convenience wrapper around [`Coordinator::new`] and [`Coordinator::run`].
pub async fn run_comparison(config: Config) -> Result<ComparisonRun, CompareError> {
    Coordinator::new(config)?.run().await
}
