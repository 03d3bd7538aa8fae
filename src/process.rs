use std::path::PathBuf;

use chrono::{Local, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::backoff::{BackoffPolicy, BackoffState};
use crate::browser::{ChromeSession, HeadlessBrowser};
use crate::capture::HighlightScreenshotCapturer;
use crate::config::{Fetcher, RunConfig, RunRequest, Timings};
use crate::crawler::PagedSearchCrawler;
use crate::filter::{ContentFilter, FilterHit};
use crate::manifest::RunManifest;
use crate::parse::{CcgpResultParser, ResultPageParser, SearchHit};
use crate::partition::{partition_backward, DateRange};
use crate::request::{HttpPageSource, PageSource};
use crate::{info_time, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: i64,
    /// `None` when nothing matched and the directory was removed.
    pub output_dir: Option<PathBuf>,
    pub hits_found: usize,
    pub matched: usize,
    pub screenshots: usize,
}

/// Runs partition, crawl, filter and capture in order, on one line of
/// control, against one browser tab.
pub struct RunOrchestrator<'a> {
    browser: &'a dyn HeadlessBrowser,
    listing: &'a dyn PageSource,
    parser: &'a dyn ResultPageParser,
    search_base: String,
    output_root: PathBuf,
    timings: Timings,
    policy: BackoffPolicy,
    cancel: CancellationToken,
}

impl<'a> RunOrchestrator<'a> {
    pub fn new(
        browser: &'a dyn HeadlessBrowser,
        listing: &'a dyn PageSource,
        parser: &'a dyn ResultPageParser,
        search_base: impl Into<String>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            browser,
            listing,
            parser,
            search_base: search_base.into(),
            output_root: output_root.into(),
            timings: Timings::default(),
            policy: BackoffPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs with the current epoch second as run id.
    pub async fn run(&self, request: &RunRequest) -> Result<RunSummary> {
        self.run_as(request, Utc::now().timestamp()).await
    }

    pub async fn run_as(&self, request: &RunRequest, run_id: i64) -> Result<RunSummary> {
        self.run_inner(request, run_id)
            .instrument(info_span!("run", run_id))
            .await
    }

    async fn run_inner(&self, request: &RunRequest, run_id: i64) -> Result<RunSummary> {
        let start_time = Local::now();
        let ranges = partition_backward(request.start, request.end)?;

        let hits = self.collect_hits(&ranges, &request.keyword).await?;
        info_time!(
            start_time,
            "collected {} hits from {} date ranges",
            hits.len(),
            ranges.len()
        );
        let hits_found = hits.len();

        let manifest = RunManifest::create(&self.output_root, run_id).await?;
        let manifest = self.filter_and_capture(hits, &request.filter_keyword, manifest).await?;

        let matched = manifest.len();
        let screenshots = manifest
            .hits()
            .iter()
            .filter(|h| h.screenshot.is_some())
            .count();
        let output_dir = manifest.finish().await?;
        match &output_dir {
            Some(dir) => info_time!(
                start_time,
                "done, {matched} records saved to {}",
                dir.display()
            ),
            None => info_time!(
                start_time,
                "no records contain '{}'",
                request.filter_keyword
            ),
        }

        Ok(RunSummary {
            run_id,
            output_dir,
            hits_found,
            matched,
            screenshots,
        })
    }

    async fn collect_hits(
        &self,
        ranges: &[DateRange],
        keyword: &str,
    ) -> Result<Vec<SearchHit>> {
        let crawler = PagedSearchCrawler::new(self.listing, self.parser, self.search_base.as_str())
            .with_settle(self.timings.settle)
            .with_policy(self.policy)
            .with_cancel(self.cancel.clone());

        let mut backoff = BackoffState::new(&self.policy);
        let mut hits = Vec::new();
        for range in ranges {
            hits.extend(crawler.crawl(range, keyword, &mut backoff).await?);
        }
        Ok(hits)
    }

    async fn filter_and_capture(
        &self,
        hits: Vec<SearchHit>,
        keyword: &str,
        mut manifest: RunManifest,
    ) -> Result<RunManifest> {
        let filter = ContentFilter::new(self.browser, self.timings.settle);
        let capturer = HighlightScreenshotCapturer::new(self.browser)
            .with_scroll_settle(self.timings.scroll_settle)
            .with_ready_timeout(self.timings.ready_timeout);

        info!("filtering {} records for '{keyword}'", hits.len());
        for hit in hits {
            if self.cancel.is_cancelled() {
                manifest.finish().await?;
                return Err(Error::Cancelled);
            }
            if !filter.check(&hit, keyword).await {
                continue;
            }

            info!("saving full-page screenshot of '{}'", hit.title);
            let screenshot = match capturer.capture(keyword, &hit.title, manifest.output_dir()).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("skipping screenshot of '{}': {e}", hit.title);
                    None
                }
            };
            manifest
                .record(FilterHit {
                    hit,
                    matched: true,
                    screenshot,
                })
                .await?;
        }
        Ok(manifest)
    }
}

/// Validates `config`, runs it on a fresh Chrome session and tears the
/// session down again, whatever the outcome of the run.
pub async fn process_site(config: &RunConfig, cancel: CancellationToken) -> Result<RunSummary> {
    let request = config.validate()?;
    let parser = CcgpResultParser::new()?;
    let http = HttpPageSource::default();

    let session = ChromeSession::launch(&config.browser_options()).await?;
    let listing: &dyn PageSource = match config.fetcher {
        Fetcher::Browser => &session,
        Fetcher::Http => &http,
    };

    let result = RunOrchestrator::new(
        &session,
        listing,
        &parser,
        config.search_url.as_str(),
        config.output_root.as_path(),
    )
    .with_timings(config.timings())
    .with_policy(config.backoff_policy())
    .with_cancel(cancel)
    .run(&request)
    .await;

    if let Err(e) = session.shutdown().await {
        warn!("browser didn't shut down cleanly: {e}");
    }
    result
}
