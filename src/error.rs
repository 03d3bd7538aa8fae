use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Start date {start} is after end date {end}.")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("Couldn't parse date '{0}', expected YYYY:MM:DD.")]
    InvalidDate(String),
    #[error("Required input is missing: {0}")]
    MissingInput(&'static str),

    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),
    #[error("Couldn't parse the result page: {0}")]
    ParseFailure(String),

    #[error("Element '{selector}' didn't appear within {waited:?}.")]
    PageNotReady { selector: String, waited: Duration },
    #[error("Couldn't load {url}: {reason}")]
    FetchFailure { url: String, reason: String },
    #[error("Gave up on {url} after {attempts} rate-limited attempts.")]
    RetriesExhausted { url: String, attempts: u32 },
    #[error("The run was cancelled.")]
    Cancelled,
    #[error("Couldn't configure the browser: {0}")]
    BrowserLaunch(String),
    #[error("The page produced no viewport captures.")]
    EmptyCapture,

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Browser Error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),
    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors that abort a whole run. Everything else is confined to the page
    /// or hit that produced it.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidRange { .. }
                | Error::InvalidDate(_)
                | Error::MissingInput(_)
                | Error::Cancelled
        )
    }
}
