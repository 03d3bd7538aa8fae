use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};

use crate::backoff::BackoffPolicy;
use crate::browser::BrowserOptions;
use crate::partition::parse_date;
use crate::{Error, Result, DEFAULT_OUTPUT_ROOT, SEARCH_URL};

/// Which page source reads the listing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Fetcher {
    Browser,
    Http,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "ccgp-scrap", version, about = "Search procurement notices and screenshot the ones mentioning a filter keyword")]
pub struct RunConfig {
    /// First day of the search window, YYYY:MM:DD.
    #[arg(long)]
    pub start: String,
    /// Last day of the search window, YYYY:MM:DD.
    #[arg(long)]
    pub end: String,
    /// Keyword sent to the search backend.
    #[arg(long)]
    pub keyword: String,
    /// Keyword a notice page must contain to be kept.
    #[arg(long)]
    pub filter_keyword: String,

    #[arg(long, default_value = DEFAULT_OUTPUT_ROOT)]
    pub output_root: PathBuf,
    #[arg(long, default_value = SEARCH_URL)]
    pub search_url: String,
    #[arg(long, value_enum, default_value_t = Fetcher::Browser)]
    pub fetcher: Fetcher,

    /// Chrome executable; detected when absent.
    #[arg(long)]
    pub chrome: Option<PathBuf>,
    #[arg(long)]
    pub headful: bool,

    /// Give up on a listing page after this many rate-limited retries.
    /// Retries forever when absent.
    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(long, default_value_t = 1000)]
    pub settle_ms: u64,
    #[arg(long, default_value_t = 500)]
    pub scroll_settle_ms: u64,
    #[arg(long, default_value_t = 10)]
    pub ready_timeout_secs: u64,

    /// -v for debug, -vv for trace. RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Fixed waits of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// After every navigation, before the page source is read.
    pub settle: Duration,
    /// After every scroll step of a capture.
    pub scroll_settle: Duration,
    /// Upper bound for the page root to appear before a capture.
    pub ready_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
            scroll_settle: Duration::from_millis(500),
            ready_timeout: Duration::from_secs(10),
        }
    }
}

impl Timings {
    pub fn zero() -> Self {
        Self {
            settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            ready_timeout: Duration::ZERO,
        }
    }
}

/// Inputs of one run after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub keyword: String,
    pub filter_keyword: String,
}

impl RunConfig {
    /// Checks that every required input is present and the dates parse.
    /// Date order is left to the partitioner.
    pub fn validate(&self) -> Result<RunRequest> {
        let start = required(&self.start, "start date")?;
        let end = required(&self.end, "end date")?;
        let keyword = required(&self.keyword, "keyword")?;
        let filter_keyword = required(&self.filter_keyword, "filter keyword")?;

        Ok(RunRequest {
            start: parse_date(start)?,
            end: parse_date(end)?,
            keyword: keyword.to_string(),
            filter_keyword: filter_keyword.to_string(),
        })
    }

    pub fn timings(&self) -> Timings {
        Timings {
            settle: Duration::from_millis(self.settle_ms),
            scroll_settle: Duration::from_millis(self.scroll_settle_ms),
            ready_timeout: Duration::from_secs(self.ready_timeout_secs),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_retries: self.max_retries,
            ..Default::default()
        }
    }

    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            executable: self.chrome.clone(),
            headless: !self.headful,
            ..Default::default()
        }
    }
}

fn required<'a>(value: &'a str, name: &'static str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::MissingInput(name));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RunConfig {
        let mut argv = vec!["ccgp-scrap"];
        argv.extend_from_slice(args);
        RunConfig::try_parse_from(argv).unwrap()
    }

    fn full() -> RunConfig {
        parse(&[
            "--start",
            "2019:01:01",
            "--end",
            "2021-06-15",
            "--keyword",
            "pump",
            "--filter-keyword",
            "Water",
        ])
    }

    #[test]
    fn defaults_are_applied() {
        let config = full();
        assert_eq!(config.output_root, PathBuf::from(DEFAULT_OUTPUT_ROOT));
        assert_eq!(config.search_url, SEARCH_URL);
        assert_eq!(config.fetcher, Fetcher::Browser);
        assert_eq!(config.timings(), Timings::default());
        assert_eq!(config.backoff_policy(), BackoffPolicy::default());
        assert!(config.browser_options().headless);
    }

    #[test]
    fn validates_into_request() {
        let request = full().validate().unwrap();
        assert_eq!(request.start, NaiveDate::from_ymd_opt(2019, 1, 1).unwrap());
        assert_eq!(request.end, NaiveDate::from_ymd_opt(2021, 6, 15).unwrap());
        assert_eq!(request.keyword, "pump");
        assert_eq!(request.filter_keyword, "Water");
    }

    #[test]
    fn blank_inputs_are_rejected() {
        let mut config = full();
        config.filter_keyword = "   ".into();
        assert!(matches!(
            config.validate(),
            Err(Error::MissingInput("filter keyword"))
        ));
    }

    #[test]
    fn bad_dates_are_rejected() {
        let mut config = full();
        config.end = "2021:13:01".into();
        assert!(matches!(config.validate(), Err(Error::InvalidDate(_))));
    }

    #[test]
    fn optional_flags_parse() {
        let config = parse(&[
            "--start",
            "2020:01:01",
            "--end",
            "2020:02:01",
            "--keyword",
            "k",
            "--filter-keyword",
            "f",
            "--fetcher",
            "http",
            "--max-retries",
            "5",
            "--settle-ms",
            "0",
            "--headful",
            "-vv",
        ]);
        assert_eq!(config.fetcher, Fetcher::Http);
        assert_eq!(config.backoff_policy().max_retries, Some(5));
        assert_eq!(config.timings().settle, Duration::ZERO);
        assert!(!config.browser_options().headless);
        assert_eq!(config.verbose, 2);
    }
}
