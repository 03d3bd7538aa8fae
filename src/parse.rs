use scraper::{Html, Selector};

use crate::{Error, Result, RATE_LIMIT_MARKER};

/// One entry of a result listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
}

/// Everything that knows about the listing markup lives behind this trait.
pub trait ResultPageParser: Send + Sync {
    /// Hits on the page, in page order.
    fn parse_hits(&self, html: &str) -> Result<Vec<SearchHit>>;

    /// Total number of results for the whole query window.
    fn parse_total_count(&self, html: &str) -> Result<usize>;

    /// Whether the backend answered with its "too many requests" page.
    fn is_rate_limited(&self, html: &str) -> bool {
        document_text(html).contains(RATE_LIMIT_MARKER)
    }
}

const HIT_ITEM_SELECTOR: &str = ".vT-srch-result-list .vT-srch-result-list-bid li";
const TOTAL_COUNT_SELECTOR: &str = ".vT_z div > p:nth-child(1) > span:nth-child(2)";

/// Parser for the procurement search listing.
#[derive(Debug, Clone)]
pub struct CcgpResultParser {
    item: Selector,
    anchor: Selector,
    total: Selector,
}

impl CcgpResultParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            item: create_selector(HIT_ITEM_SELECTOR)?,
            anchor: create_selector("a")?,
            total: create_selector(TOTAL_COUNT_SELECTOR)?,
        })
    }
}

impl ResultPageParser for CcgpResultParser {
    fn parse_hits(&self, html: &str) -> Result<Vec<SearchHit>> {
        let doc = Html::parse_document(html);

        // There shouldn't be more than 20 entries per page.
        let mut hits = Vec::with_capacity(crate::RESULTS_PER_PAGE);
        for item in doc.select(&self.item) {
            // Items without an anchor are separators or ads.
            let Some(anchor) = item.select(&self.anchor).next() else {
                continue;
            };
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let title = anchor.text().collect::<String>().trim().to_string();
            hits.push(SearchHit {
                title,
                link: href.trim().to_string(),
            });
        }
        Ok(hits)
    }

    fn parse_total_count(&self, html: &str) -> Result<usize> {
        let doc = Html::parse_document(html);
        let node = doc
            .select(&self.total)
            .next()
            .ok_or_else(|| Error::ParseFailure("total result count is missing".into()))?;
        let text = node.text().collect::<String>();
        let text = text.trim();
        text.parse::<usize>()
            .map_err(|_| Error::ParseFailure(format!("total result count '{text}' is not a number")))
    }
}

/// All text nodes of the document concatenated, markup stripped.
pub fn document_text(html: &str) -> String {
    Html::parse_document(html).root_element().text().collect()
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}
