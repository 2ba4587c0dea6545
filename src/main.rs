//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest listing harvester.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::crawler::{page_url, run_crawl, CrawlReport};
use sumi_harvest::output::{ProgressRenderer, SilentRenderer, TerminalRenderer};
use sumi_harvest::HarvestError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a paginated listing harvester
///
/// Sumi-Harvest walks a paginated listing page by page, extracts structured
/// records, drops incomplete and duplicate ones, and writes the rest to a
/// timestamped JSON file.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version)]
#[command(about = "A paginated listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress progress display and non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Override the output directory from the config file
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.display().to_string();
    }

    if cli.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    handle_crawl(&config, cli.quiet).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the pages and settings a crawl would use
fn print_dry_run(config: &Config) {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Target:");
    println!("  Base URL: {}", config.target.base_url);
    println!("  Identity field: {}", config.target.identity_field);
    println!("  Required fields: {}", config.target.required_fields.join(", "));
    if !config.target.optional_fields.is_empty() {
        println!("  Optional fields: {}", config.target.optional_fields.join(", "));
    }

    println!("\nCrawler:");
    println!("  Multi-page: {}", config.crawler.multi_page);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Page delay: {}ms", config.crawler.page_delay_ms);
    println!(
        "  Retries: {} (initial delay {}ms, x{})",
        config.retry.max_retries, config.retry.initial_delay_ms, config.retry.backoff_multiplier
    );
    println!(
        "  Rate limit: {} calls per {}ms",
        config.rate_limit.calls, config.rate_limit.period_ms
    );

    let proxies = config.proxy.addresses.len();
    match &config.proxy.file {
        Some(file) => println!("\nProxies: {} inline, file {}", proxies, file),
        None => println!("\nProxies: {} inline", proxies),
    }

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!("  Prefix: {}", config.output.file_prefix);

    let pages = if config.crawler.multi_page {
        config.crawler.max_pages
    } else {
        1
    };
    println!("\nFirst pages:");
    for page in 1..=pages.min(3) {
        println!(
            "  {}",
            page_url(&config.target.base_url, page, &config.crawler.page_param)
        );
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl up to {} page(s)", pages);
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, quiet: bool) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after cleanup");
            signal_token.cancel();
        }
    });

    let renderer: Box<dyn ProgressRenderer> = if quiet {
        Box::new(SilentRenderer)
    } else {
        Box::new(TerminalRenderer::default())
    };

    match run_crawl(config, renderer, &cancel).await {
        Ok(report) => {
            print_report(&report, quiet);
            Ok(())
        }
        Err(HarvestError::Cancelled) => {
            tracing::warn!("Crawl cancelled; collected items were flushed");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

fn print_report(report: &CrawlReport, quiet: bool) {
    if quiet {
        return;
    }

    println!();
    println!("Stopped: {}", report.termination);
    println!("Pages visited: {}", report.pages_visited);
    println!("Items collected: {}", report.items.len());
    for path in &report.written {
        println!("✓ Results saved to: {}", path.display());
    }
}
