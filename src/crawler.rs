use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::{BackoffPolicy, BackoffState};
use crate::parse::{ResultPageParser, SearchHit};
use crate::partition::DateRange;
use crate::request::{search_url, PageSource};
use crate::{Error, Result, RESULTS_PER_PAGE};

/// Walks every listing page of one query window, one request at a time.
pub struct PagedSearchCrawler<'a> {
    source: &'a dyn PageSource,
    parser: &'a dyn ResultPageParser,
    search_base: String,
    settle: Duration,
    policy: BackoffPolicy,
    cancel: CancellationToken,
}

impl<'a> PagedSearchCrawler<'a> {
    pub fn new(
        source: &'a dyn PageSource,
        parser: &'a dyn ResultPageParser,
        search_base: impl Into<String>,
    ) -> Self {
        Self {
            source,
            parser,
            search_base: search_base.into(),
            settle: Duration::from_secs(1),
            policy: BackoffPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
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

    /// Returns the hits of every page of `range`, in page order.
    ///
    /// Only `Cancelled` is returned as an error. A window whose first page or
    /// result count can't be read counts as empty. Any later page that can't
    /// be fetched, including one that runs out of retries, is skipped and the
    /// crawl goes on with the next page.
    pub async fn crawl(
        &self,
        range: &DateRange,
        keyword: &str,
        backoff: &mut BackoffState,
    ) -> Result<Vec<SearchHit>> {
        info!("searching {range} for '{keyword}'");

        let mut hits = Vec::new();
        let mut total_pages = None;
        let mut page_index = 1;
        loop {
            let url = search_url(&self.search_base, range, keyword, page_index);
            let html = match self.fetch_page(&url, backoff).await {
                Ok(html) => html,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => match total_pages {
                    Some(pages) if page_index < pages => {
                        warn!("skipping page {page_index} of {range}: {e}");
                        page_index += 1;
                        continue;
                    }
                    Some(_) => {
                        warn!("skipping last page {page_index} of {range}: {e}");
                        break;
                    }
                    None => {
                        warn!("no result count for {range}, treating it as empty: {e}");
                        break;
                    }
                },
            };

            let pages = match total_pages {
                Some(pages) => pages,
                None => match self.parser.parse_total_count(&html) {
                    Ok(total) => {
                        info!("found {total} results");
                        let pages = total.div_ceil(RESULTS_PER_PAGE);
                        total_pages = Some(pages);
                        pages
                    }
                    Err(e) => {
                        warn!("{e}; treating {range} as empty");
                        return Ok(Vec::new());
                    }
                },
            };
            if pages == 0 {
                break;
            }
            if pages > 1 {
                info!("fetched page {page_index} of {pages}");
            }

            match self.parser.parse_hits(&html) {
                Ok(page_hits) => hits.extend(page_hits),
                Err(e) => warn!("skipping page {page_index} of {range}: {e}"),
            }

            if page_index >= pages {
                break;
            }
            page_index += 1;
        }

        debug!("{range} yielded {} hits", hits.len());
        Ok(hits)
    }

    /// Fetches `url`, waiting out rate-limit pages without moving on.
    async fn fetch_page(&self, url: &str, backoff: &mut BackoffState) -> Result<String> {
        let mut retries = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let html = self.source.fetch(url, self.settle).await?;
            if !self.parser.is_rate_limited(&html) {
                backoff.on_success();
                return Ok(html);
            }

            retries += 1;
            if self.policy.max_retries.is_some_and(|max| retries > max) {
                return Err(Error::RetriesExhausted {
                    url: url.to_string(),
                    attempts: retries,
                });
            }

            let wait = backoff.on_rate_limited();
            warn!("searching too fast, retrying in {} seconds", wait.as_secs());
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
