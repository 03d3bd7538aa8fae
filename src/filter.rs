use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::browser::HeadlessBrowser;
use crate::parse::{document_text, SearchHit};
use crate::Result;

/// A search hit after its page has been checked for the filter keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterHit {
    pub hit: SearchHit,
    pub matched: bool,
    pub screenshot: Option<PathBuf>,
}

impl FilterHit {
    pub fn title(&self) -> &str {
        &self.hit.title
    }

    pub fn link(&self) -> &str {
        &self.hit.link
    }
}

/// Keeps the hits whose page text contains a keyword.
pub struct ContentFilter<'a> {
    browser: &'a dyn HeadlessBrowser,
    settle: Duration,
}

impl<'a> ContentFilter<'a> {
    pub fn new(browser: &'a dyn HeadlessBrowser, settle: Duration) -> Self {
        Self { browser, settle }
    }

    /// Loads the hit's page and tests its text for `keyword`, case-sensitively.
    ///
    /// The page stays loaded afterwards, so a match can be captured without
    /// navigating again. A page that fails to load counts as not matching.
    pub async fn check(&self, hit: &SearchHit, keyword: &str) -> bool {
        match self.page_contains(&hit.link, keyword).await {
            Ok(true) => {
                info!("'{keyword}' found on: {}", hit.title);
                info!("link: {}", hit.link);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("couldn't check '{}': {e}", hit.title);
                false
            }
        }
    }

    pub async fn filter(&self, hits: &[SearchHit], keyword: &str) -> Vec<FilterHit> {
        info!("filtering {} records for '{keyword}'", hits.len());
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let matched = self.check(hit, keyword).await;
            out.push(FilterHit {
                hit: hit.clone(),
                matched,
                screenshot: None,
            });
        }
        out
    }

    async fn page_contains(&self, url: &str, keyword: &str) -> Result<bool> {
        self.browser.navigate(url).await?;
        tokio::time::sleep(self.settle).await;
        let html = self.browser.page_source().await?;
        Ok(document_text(&html).contains(keyword))
    }
}
