//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the pagination loop that coordinates all aspects of
//! a crawl run, including:
//! - Health-checking the proxy pool before the first page
//! - Fetching each page through the rate-limited retry executor
//! - Stopping on no-results markers, failed pages and exhausted listings
//! - Validating and deduplicating extracted items
//! - Flushing accumulated items on every exit path, including cancellation

use crate::config::Config;
use crate::crawler::extractor::{ExtractionSpec, Extractor, JsonExtractor};
use crate::crawler::fetcher::{FetchResponse, Fetcher, HttpFetcher, TransportConfig};
use crate::output::{
    CrawlStats, JsonFileWriter, OutputWriter, ProgressRenderer, ProgressTracker,
    DEFAULT_UPDATE_INTERVAL,
};
use crate::proxy::{HttpProber, ProxyPool};
use crate::resilience::{RateLimiter, RetryExecutor, RetryPolicy};
use crate::state::{CrawlItem, CrawlState, PageCounts, RequiredSchema, Session};
use crate::{HarvestError, Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of a crawl that ended without an error
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Terminal state the loop stopped in
    pub termination: CrawlState,

    /// Highest page number the loop started on
    pub pages_visited: u32,

    /// Accumulated valid items, in acceptance order
    pub items: Vec<CrawlItem>,

    /// Locations the output writer reported
    pub written: Vec<PathBuf>,

    pub stats: CrawlStats,
}

/// Builds the URL of `page`
///
/// Page 1 is the base URL unchanged. Later pages append `param=page` as a
/// query parameter, keeping any fragment at the end.
pub fn page_url(base: &str, page: u32, param: &str) -> String {
    if page <= 1 {
        return base.to_string();
    }

    let (head, fragment) = match base.find('#') {
        Some(index) => base.split_at(index),
        None => (base, ""),
    };

    let separator = if head.ends_with('?') || head.ends_with('&') {
        ""
    } else if head.contains('?') {
        "&"
    } else {
        "?"
    };

    format!("{}{}{}={}{}", head, separator, param, page, fragment)
}

/// Returns true if `content` contains any marker, ignoring case
pub fn contains_no_results_marker(content: &str, markers: &[String]) -> bool {
    let content = content.to_lowercase();
    markers
        .iter()
        .any(|marker| content.contains(&marker.to_lowercase()))
}

/// Races `operation` against the cancellation token
async fn cancellable<T>(
    cancel: &CancellationToken,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HarvestError::Cancelled),
        result = operation => result,
    }
}

/// Fetch and extract collaborators behind the retry executor
struct PageSource {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    executor: RetryExecutor,
    proxies: Option<ProxyPool>,
    timeout: Duration,
    spec: ExtractionSpec,
}

/// Takes the next proxy from the pool, if there is one
fn next_proxy(proxies: &mut Option<ProxyPool>) -> Option<String> {
    proxies
        .as_mut()
        .and_then(|pool| pool.next())
        .map(|endpoint| endpoint.address.clone())
}

impl PageSource {
    /// Fetches `url`, rotating the proxy on every attempt
    async fn fetch(&mut self, url: &str) -> Result<FetchResponse> {
        let fetcher = self.fetcher.as_ref();
        let proxies = &mut self.proxies;
        let timeout = self.timeout;

        self.executor
            .run("fetch page", || {
                let transport = TransportConfig {
                    proxy: next_proxy(proxies),
                    timeout,
                };
                async move {
                    fetcher
                        .fetch(url, &transport)
                        .await
                        .and_then(FetchResponse::into_result)
                }
            })
            .await
    }

    /// Fetches `url` and extracts its items as one retried operation
    async fn fetch_and_extract(&mut self, url: &str) -> Result<Vec<CrawlItem>> {
        let fetcher = self.fetcher.as_ref();
        let extractor = self.extractor.as_ref();
        let spec = &self.spec;
        let proxies = &mut self.proxies;
        let timeout = self.timeout;

        self.executor
            .run("fetch and extract", || {
                let transport = TransportConfig {
                    proxy: next_proxy(proxies),
                    timeout,
                };
                async move {
                    let response = fetcher.fetch(url, &transport).await?.into_result()?;
                    extractor.extract(&response.content, spec).await
                }
            })
            .await
    }
}

/// Main crawler coordinator structure
///
/// A coordinator drives exactly one crawl run; `run` consumes it.
pub struct Coordinator {
    config: Config,
    source: PageSource,
    session: Session,
    progress: ProgressTracker,
    writer: Box<dyn OutputWriter>,
    state: CrawlState,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawl configuration
    /// * `fetcher` - Page transport
    /// * `extractor` - Turns page content into items
    /// * `writer` - Receives the accumulated items when the crawl ends
    /// * `renderer` - Progress display
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        writer: Box<dyn OutputWriter>,
        renderer: Box<dyn ProgressRenderer>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let executor =
            RetryExecutor::new(RetryPolicy::from_config(&config.retry)).with_rate_limiter(limiter);

        let total_pages = if config.crawler.multi_page {
            config.crawler.max_pages
        } else {
            1
        };

        let schema = RequiredSchema::new(config.target.required_fields.iter().cloned());

        Self {
            config: config.clone(),
            source: PageSource {
                fetcher,
                extractor,
                executor,
                proxies: None,
                timeout: Duration::from_millis(config.crawler.fetch_timeout_ms),
                spec: ExtractionSpec::from_target(&config.target),
            },
            session: Session::new(&config.target.identity_field, schema),
            progress: ProgressTracker::new(Some(total_pages), DEFAULT_UPDATE_INTERVAL, renderer),
            writer,
            state: CrawlState::Init,
        }
    }

    /// Routes every fetch attempt through `pool`
    pub fn with_proxy_pool(mut self, pool: ProxyPool) -> Self {
        self.source.proxies = Some(pool);
        self
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    /// Runs the crawl to completion
    ///
    /// Whatever ends the loop, the accumulated items are handed to the output
    /// writer exactly once and the progress tracker is finished exactly once
    /// before this returns.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The loop reached a terminal state
    /// * `Err(HarvestError::Cancelled)` - `cancel` fired; partial results were flushed
    /// * `Err(HarvestError::Fatal)` - Unrecoverable failure; partial results were flushed
    /// * `Err(HarvestError::Output)` - The writer failed
    pub async fn run(mut self, cancel: &CancellationToken) -> Result<CrawlReport> {
        let outcome = self.crawl(cancel).await;

        let written = self.flush();
        self.progress.finish();

        let termination = match outcome {
            Ok(state) => state,
            Err(e) => {
                if e.is_cancelled() {
                    tracing::warn!(
                        "Crawl cancelled on page {} after saving {} items",
                        self.session.page(),
                        self.session.items().len()
                    );
                } else {
                    tracing::error!("Crawl aborted: {}", e);
                }
                return Err(e);
            }
        };

        let written = written?;
        tracing::info!("Crawl finished: {}", termination);

        Ok(CrawlReport {
            termination,
            pages_visited: self.session.page(),
            stats: self.progress.stats().clone(),
            written,
            items: self.session.into_items(),
        })
    }

    /// The pagination loop
    async fn crawl(&mut self, cancel: &CancellationToken) -> Result<CrawlState> {
        let crawler = &self.config.crawler;
        let target = &self.config.target;
        tracing::info!("Starting crawl of {}", target.base_url);
        tracing::info!(
            "Mode: {}, max pages: {}",
            if crawler.multi_page { "multi-page" } else { "single page" },
            crawler.max_pages
        );
        tracing::info!("Required fields: {}", target.required_fields.join(", "));
        if !target.optional_fields.is_empty() {
            tracing::info!("Optional fields: {}", target.optional_fields.join(", "));
        }

        if let Some(pool) = self.source.proxies.as_mut() {
            if !pool.is_empty() {
                tracing::info!("Testing {} proxies", pool.len());
                let probe = async { Ok::<_, HarvestError>(pool.test_all().await) };
                let report = cancellable(cancel, probe).await?;
                tracing::info!(
                    "{} proxies passed, {} failed, {} evicted",
                    report.passed,
                    report.failed,
                    report.evicted.len()
                );
            }
        }

        let multi_page = self.config.crawler.multi_page;
        let max_pages = self.config.crawler.max_pages.max(1);
        let page_delay = Duration::from_millis(self.config.crawler.page_delay_ms);

        let mut page = 1;
        loop {
            self.transition(CrawlState::Fetching(page));
            let outcome = self.process_page(page, cancel).await?;
            self.transition(outcome.clone());

            if outcome.is_terminal() {
                return Ok(outcome);
            }

            if !multi_page || page >= max_pages {
                let done = CrawlState::Done(page);
                self.transition(done.clone());
                return Ok(done);
            }

            tracing::debug!("Waiting {:?} before page {}", page_delay, page + 1);
            cancellable(cancel, async {
                tokio::time::sleep(page_delay).await;
                Ok::<_, HarvestError>(())
            })
            .await?;

            page += 1;
        }
    }

    /// Processes a single page
    ///
    /// 1. Fetch the page and look for a no-results marker
    /// 2. Fetch and extract the items
    /// 3. Run every item through the session's validation pipeline
    /// 4. Report the page's counts
    async fn process_page(&mut self, page: u32, cancel: &CancellationToken) -> Result<CrawlState> {
        let url = page_url(
            &self.config.target.base_url,
            page,
            &self.config.crawler.page_param,
        );
        tracing::info!("Processing page {}: {}", page, url);
        self.session.set_page(page);

        let response = match cancellable(cancel, self.source.fetch(&url)).await {
            Ok(response) => response,
            Err(e) => return self.page_error(page, e),
        };

        if contains_no_results_marker(&response.content, &self.config.target.no_results_markers) {
            tracing::info!("No results found on page {}", page);
            self.progress.update(Some(page), &PageCounts::default());
            return Ok(CrawlState::NoResults(page));
        }

        let items = match cancellable(cancel, self.source.fetch_and_extract(&url)).await {
            Ok(items) => items,
            Err(e) => return self.page_error(page, e),
        };

        if items.is_empty() {
            tracing::warn!("No data found on page {}", page);
            self.progress.update(Some(page), &PageCounts::default());
            return Ok(CrawlState::PageFailed {
                page,
                reason: "no items extracted".to_string(),
            });
        }

        let counts = self.session.admit_page(items);
        self.progress.update(Some(page), &counts);
        tracing::info!(
            "Page {}: {} items ({} valid, {} failed, {} duplicates)",
            page,
            counts.new_items,
            counts.valid_items,
            counts.failed_items,
            counts.duplicate_items
        );

        if counts.valid_items == 0 {
            tracing::info!("No new valid items on page {}, ending crawl", page);
            return Ok(CrawlState::NoNewItems(page));
        }

        Ok(CrawlState::PageOk(page))
    }

    /// Maps a page-level error to a terminal state
    ///
    /// Cancellation and fatal errors abort the run; everything else ends it
    /// with `PageFailed`.
    fn page_error(&mut self, page: u32, error: HarvestError) -> Result<CrawlState> {
        match error {
            HarvestError::Cancelled | HarvestError::Fatal(_) => Err(error),
            other => {
                tracing::error!("Error processing page {}: {}", page, other);
                self.progress.update(Some(page), &PageCounts::default());
                Ok(CrawlState::PageFailed {
                    page,
                    reason: other.to_string(),
                })
            }
        }
    }

    /// Hands the accumulated items to the output writer
    fn flush(&mut self) -> Result<Vec<PathBuf>> {
        let items = self.session.items();
        tracing::info!("Saving {} items", items.len());

        match self.writer.save(items) {
            Ok(written) => {
                for location in &written {
                    tracing::info!("Wrote {}", location.display());
                }
                Ok(written)
            }
            Err(e) => {
                tracing::error!("Failed to save {} items: {}", items.len(), e);
                Err(e.into())
            }
        }
    }

    fn transition(&mut self, next: CrawlState) {
        tracing::debug!("Crawl state: {} -> {}", self.state, next);
        self.state = next;
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("base_url", &self.config.target.base_url)
            .field("state", &self.state)
            .field("page", &self.session.page())
            .finish_non_exhaustive()
    }
}

/// Runs a crawl with the bundled collaborators
///
/// Wires an `HttpFetcher`, a `JsonExtractor`, a `JsonFileWriter` for the
/// `[output]` section and, when proxies are configured, a probed
/// `ProxyPool`.
///
/// # Arguments
///
/// * `config` - The crawl configuration
/// * `renderer` - Progress display
/// * `cancel` - Token that stops the crawl at the next suspension point
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::load_config;
/// use sumi_harvest::crawler::run_crawl;
/// use sumi_harvest::output::SilentRenderer;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let report = run_crawl(&config, Box::new(SilentRenderer), &CancellationToken::new()).await?;
/// println!("{} items", report.items.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    renderer: Box<dyn ProgressRenderer>,
    cancel: &CancellationToken,
) -> Result<CrawlReport> {
    let fetcher = Arc::new(HttpFetcher::new(config.crawler.user_agent.clone()));
    let writer = Box::new(JsonFileWriter::from_config(&config.output));

    let mut coordinator = Coordinator::new(
        config,
        fetcher,
        Arc::new(JsonExtractor::new()),
        writer,
        renderer,
    );

    if !config.proxy.addresses.is_empty() || config.proxy.file.is_some() {
        let pool = ProxyPool::from_config(&config.proxy, Arc::new(HttpProber::new()))?;
        coordinator = coordinator.with_proxy_pool(pool);
    }

    coordinator.run(cancel).await
}
