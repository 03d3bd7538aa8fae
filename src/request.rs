use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::partition::DateRange;
use crate::{Error, Result};

/// Anything that can turn a listing URL into its HTML.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Loads `url`, waits `settle` for client-side rendering and returns the
    /// page source.
    async fn fetch(&self, url: &str, settle: Duration) -> Result<String>;
}

/// Builds the listing URL for one page of one query window.
///
/// The backend expects its full parameter set, in this order, even when most
/// of the values are empty.
pub fn search_url(base: &str, range: &DateRange, keyword: &str, page_index: usize) -> String {
    let start = urlencoding::encode(&range.start_param()).into_owned();
    let end = urlencoding::encode(&range.end_param()).into_owned();
    let kw = urlencoding::encode(keyword).into_owned();
    let page = page_index.to_string();

    let params: [(&str, &str); 16] = [
        ("searchtype", "1"),
        ("page_index", &page),
        ("bidSort", "0"),
        ("buyerName", ""),
        ("projectId", ""),
        ("pinMu", "0"),
        ("bidType", "0"),
        ("dbselect", "bidx"),
        ("kw", &kw),
        ("start_time", &start),
        ("end_time", &end),
        ("timeType", "6"),
        ("displayZone", ""),
        ("zoneId", ""),
        ("pppStatus", "0"),
        ("agentName", ""),
    ];

    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}

/// Plain HTTP listing source. Doesn't run scripts, so it only works while the
/// backend keeps rendering listings server-side.
#[derive(Debug, Clone, Default)]
pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str, _settle: Duration) -> Result<String> {
        request_page_html(&self.client, url).await
    }
}

/// Requests a page and returns a `Result<String>` containing the HTML.
async fn request_page_html(client: &Client, url: &str) -> Result<String> {
    debug!(url, "requesting listing page");
    let res = client.get(url).send().await?;
    let status = res.status();
    if !status.is_success() {
        return Err(Error::FetchFailure {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        });
    }
    let html = res.text().await?;
    Ok(html)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn url_carries_full_parameter_set() {
        let url = search_url("https://search.example/bxsearch", &range(), "设备", 3);
        assert_eq!(
            url,
            "https://search.example/bxsearch?searchtype=1&page_index=3&bidSort=0&buyerName=\
             &projectId=&pinMu=0&bidType=0&dbselect=bidx&kw=%E8%AE%BE%E5%A4%87\
             &start_time=2020%3A01%3A01&end_time=2020%3A12%3A31&timeType=6&displayZone=\
             &zoneId=&pppStatus=0&agentName="
        );
    }

    #[test]
    fn keyword_is_percent_encoded() {
        let url = search_url("http://h/s", &range(), "a b&c", 1);
        assert!(url.contains("kw=a%20b%26c&"));
    }

    #[tokio::test]
    async fn http_source_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/bxsearch")
            .match_query(mockito::Matcher::UrlEncoded("page_index".into(), "1".into()))
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html><body>listing</body></html>")
            .create_async()
            .await;

        let base = format!("{}/bxsearch", server.url());
        let url = search_url(&base, &range(), "kw", 1);
        let html = HttpPageSource::default()
            .fetch(&url, Duration::ZERO)
            .await
            .unwrap();

        assert!(html.contains("listing"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_source_reports_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/down")
            .with_status(503)
            .create_async()
            .await;

        let url = format!("{}/down", server.url());
        let err = HttpPageSource::default()
            .fetch(&url, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FetchFailure { .. }));
    }
}
