use std::time::Duration;

use ccgp_scrap::backoff::BackoffState;
use ccgp_scrap::crawler::PagedSearchCrawler;
use ccgp_scrap::parse::CcgpResultParser;
use ccgp_scrap::partition::{parse_date, DateRange};
use ccgp_scrap::request::HttpPageSource;
use mockito::Matcher;

fn listing(total: usize, titles: &[&str]) -> String {
    let items: String = titles
        .iter()
        .map(|t| format!(r#"<li><a href="http://notice.test/{t}.htm">{t}</a></li>"#))
        .collect();
    format!(
        r#"<html><body>
        <div class="vT_z"><div><p><span>共找到</span><span>{total}</span></p></div></div>
        <div class="vT-srch-result-list"><ul class="vT-srch-result-list-bid">{items}</ul></div>
        </body></html>"#
    )
}

#[tokio::test]
async fn crawls_listing_pages_over_http() {
    let mut server = mockito::Server::new_async().await;
    let mut mocks = Vec::new();
    for (page, titles) in [("1", vec!["a", "b"]), ("2", vec!["c"])] {
        let mock = server
            .mock("GET", "/bxsearch")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page_index".into(), page.into()),
                Matcher::UrlEncoded("kw".into(), "水泵".into()),
                Matcher::UrlEncoded("start_time".into(), "2020:01:01".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(listing(21, &titles))
            .expect(1)
            .create_async()
            .await;
        mocks.push(mock);
    }

    let source = HttpPageSource::default();
    let parser = CcgpResultParser::new().unwrap();
    let crawler = PagedSearchCrawler::new(&source, &parser, format!("{}/bxsearch", server.url()))
        .with_settle(Duration::ZERO);
    let range = DateRange::new(
        parse_date("2020:01:01").unwrap(),
        parse_date("2020:12:31").unwrap(),
    )
    .unwrap();

    let mut backoff = BackoffState::default();
    let hits = crawler.crawl(&range, "水泵", &mut backoff).await.unwrap();

    let titles: Vec<_> = hits.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(titles, vec!["a", "b", "c"]);
    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn unreachable_backend_yields_no_hits() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let source = HttpPageSource::default();
    let parser = CcgpResultParser::new().unwrap();
    let crawler = PagedSearchCrawler::new(&source, &parser, format!("{}/bxsearch", server.url()))
        .with_settle(Duration::ZERO);
    let range = DateRange::new(
        parse_date("2020:01:01").unwrap(),
        parse_date("2020:01:31").unwrap(),
    )
    .unwrap();

    let mut backoff = BackoffState::default();
    let hits = crawler.crawl(&range, "pump", &mut backoff).await.unwrap();
    assert!(hits.is_empty());
}
