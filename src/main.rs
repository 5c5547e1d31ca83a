//! url-compare main entry point
//!
//! This is the command-line interface for the url-compare site parity auditor.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use url_compare::config::{compute_config_hash, read_config, validate, Config};
use url_compare::output::{print_summary, write_csv};
use url_compare::{run_comparison, DiscoveryMode};

/// url-compare: compare the URL sets and HTTP behavior of two sites
///
/// url-compare discovers the URLs of both sites through sitemaps and a
/// bounded crawl, probes every URL (redirects, status, title, canonical)
/// and writes a per-path comparison CSV.
///
/// Exit status: 0 when every path is clean, 1 when any path has notes or
/// differs in status or errors, 2 on fatal errors.
#[derive(Parser, Debug)]
#[command(name = "url-compare")]
#[command(version = "1.0.0")]
#[command(about = "Compare the URL sets of two websites", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root URL of the first site
    #[arg(long, value_name = "URL")]
    site_a: Option<String>,

    /// Root URL of the second site
    #[arg(long, value_name = "URL")]
    site_b: Option<String>,

    /// Discovery strategy: sitemap, crawl or both
    #[arg(long, value_name = "MODE")]
    discovery: Option<DiscoveryMode>,

    /// Maximum crawl depth from the homepage
    #[arg(long, value_name = "N")]
    crawl_max_depth: Option<u32>,

    /// Sitemap URLs to read instead of /sitemap.xml and robots.txt entries
    #[arg(long, value_name = "URL", num_args = 1..)]
    sitemaps: Vec<String>,

    /// Number of concurrent workers
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// Requests per second per host (0 disables limiting)
    #[arg(long, value_name = "F")]
    rate_limit_rps: Option<f64>,

    /// Per-request timeout in milliseconds
    #[arg(long, value_name = "N")]
    timeout_ms: Option<u64>,

    /// Maximum redirect hops to follow
    #[arg(long, value_name = "N")]
    max_redirects: Option<u32>,

    /// Retries for transient failures
    #[arg(long, value_name = "N")]
    retry: Option<u32>,

    /// Keep query strings in path keys
    #[arg(long)]
    include_query: bool,

    /// Keep fragments in path keys
    #[arg(long)]
    include_fragment: bool,

    /// Respect robots.txt (true or false)
    #[arg(long, value_name = "BOOL")]
    follow_robots: Option<bool>,

    /// User agent header value
    #[arg(long, value_name = "S")]
    user_agent: Option<String>,

    /// Output CSV path
    #[arg(long, value_name = "FILE")]
    output: Option<String>,

    /// Validate config and show the effective settings without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration
    fn apply(&self, config: &mut Config) {
        if let Some(site) = &self.site_a {
            config.site_a = Some(site.clone());
        }
        if let Some(site) = &self.site_b {
            config.site_b = Some(site.clone());
        }
        if let Some(mode) = self.discovery {
            config.discovery.mode = mode;
        }
        if let Some(depth) = self.crawl_max_depth {
            config.discovery.crawl_max_depth = depth;
        }
        if !self.sitemaps.is_empty() {
            config.discovery.sitemaps = self.sitemaps.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.http.concurrency = concurrency;
        }
        if let Some(rps) = self.rate_limit_rps {
            config.http.rate_limit_rps = rps;
        }
        if let Some(timeout) = self.timeout_ms {
            config.http.timeout_ms = timeout;
        }
        if let Some(max_redirects) = self.max_redirects {
            config.http.max_redirects = max_redirects;
        }
        if let Some(retry) = self.retry {
            config.http.retry = retry;
        }
        if self.include_query {
            config.normalize.include_query = true;
        }
        if self.include_fragment {
            config.normalize.include_fragment = true;
        }
        if let Some(follow) = self.follow_robots {
            config.http.follow_robots = follow;
        }
        if let Some(user_agent) = &self.user_agent {
            config.http.user_agent = user_agent.clone();
        }
        if let Some(output) = &self.output {
            config.output.csv_path = output.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Runs the command; returns whether every record was clean
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let config = read_config(path)?;
            let hash = compute_config_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    cli.apply(&mut config);
    validate(&config).context("invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(true);
    }

    let csv_path = config.output.csv_path.clone();
    let run = run_comparison(config).await?;

    write_csv(&run.records, &csv_path)
        .with_context(|| format!("failed to write {}", csv_path))?;

    if !cli.quiet {
        print_summary(&run.summary);
        println!(
            "Discovered {} URLs on A ({} issues), {} on B ({} issues) in {}s",
            run.discovered_a,
            run.discovery_issues_a,
            run.discovered_b,
            run.discovery_issues_b,
            run.duration_seconds()
        );
        println!("Results written to: {}", csv_path);
    }

    Ok(run.is_clean())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("url_compare=info,warn"),
            1 => EnvFilter::new("url_compare=debug,info"),
            2 => EnvFilter::new("url_compare=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== url-compare Dry Run ===\n");

    println!("Sites:");
    println!("  A: {}", config.site_a.as_deref().unwrap_or("-"));
    println!("  B: {}", config.site_b.as_deref().unwrap_or("-"));

    println!("\nDiscovery:");
    println!("  Mode: {}", config.discovery.mode);
    println!("  Crawl max depth: {}", config.discovery.crawl_max_depth);
    if config.discovery.sitemaps.is_empty() {
        println!("  Sitemaps: /sitemap.xml + robots.txt");
    } else {
        println!("  Sitemaps ({}):", config.discovery.sitemaps.len());
        for sitemap in &config.discovery.sitemaps {
            println!("    * {}", sitemap);
        }
    }
    if !config.discovery.exclude_extensions.is_empty() {
        println!(
            "  Excluded extensions: {}",
            config.discovery.exclude_extensions.join(", ")
        );
    }

    println!("\nHTTP:");
    println!("  Concurrency: {}", config.http.concurrency);
    println!(
        "  Rate limit: {} req/s per host (burst {})",
        config.http.rate_limit_rps, config.http.rate_limit_burst
    );
    println!("  Timeout: {}ms", config.http.timeout_ms);
    println!("  Max redirects: {}", config.http.max_redirects);
    println!(
        "  Retry: {} (backoff {}ms, max {}ms)",
        config.http.retry, config.http.retry_backoff_ms, config.http.retry_backoff_max_ms
    );
    println!("  User agent: {}", config.http.user_agent);
    println!("  Follow robots.txt: {}", config.http.follow_robots);

    println!("\nNormalization:");
    println!("  Include query: {}", config.normalize.include_query);
    println!("  Include fragment: {}", config.normalize.include_fragment);
    println!(
        "  Tracking params: utm_*, fbclid, {}",
        config.normalize.tracking_params.join(", ")
    );

    println!("\nOutput:");
    println!("  CSV: {}", config.output.csv_path);

    println!("\n✓ Configuration is valid");
}
