//! Procurement notice crawler.
//!
//! Searches the procurement backend for a keyword over an arbitrary date span,
//! keeps the notices whose page mentions a second keyword and saves a
//! highlighted full-page screenshot of each, plus a manifest of the matches.
//!
//! Everything runs serially on one browser tab: the backend blocks clients
//! that overlap requests.

pub mod backoff;
pub mod browser;
pub mod capture;
pub mod config;
pub mod crawler;
mod error;
pub mod filter;
pub mod logging;
mod macros;
pub mod manifest;
pub mod parse;
pub mod partition;
pub mod process;
pub mod request;

pub use error::{Error, Result};

pub const SEARCH_URL: &str = "https://search.ccgp.gov.cn/bxsearch";
/// Text of the page the backend serves when it thinks we're a bot.
pub const RATE_LIMIT_MARKER: &str = "您的访问过于频繁,请稍后再试";
pub const RESULTS_PER_PAGE: usize = 20;
/// Longest query window, in days, the backend returns complete results for.
pub const MAX_RANGE_DAYS: i64 = 365;
pub const DEFAULT_OUTPUT_ROOT: &str = "screenshots";
pub const MANIFEST_FILE: &str = "filter_results.txt";
