//! The browser capabilities the crawl, filter and capture stages rely on, and
//! the chromiumoxide session that provides them.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::request::PageSource;
use crate::{Error, Result};

/// Narrow view of a single browser tab.
#[async_trait]
pub trait HeadlessBrowser: PageSource {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Current DOM serialized as HTML.
    async fn page_source(&self) -> Result<String>;

    /// Evaluates a JavaScript expression and returns its value, `Null` for
    /// `undefined`.
    async fn execute_script(&self, script: &str) -> Result<serde_json::Value>;

    async fn scroll_to(&self, y: u64) -> Result<()>;

    /// PNG of the visible viewport.
    async fn screenshot_viewport(&self) -> Result<Vec<u8>>;

    /// Polls until `selector` matches, failing with `PageNotReady` after
    /// `timeout`.
    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub request_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            viewport_width: 1366,
            viewport_height: 900,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One Chrome process with one tab, shared by every stage of a run.
///
/// `shutdown` consumes the session, so it can only be torn down once. If it is
/// dropped without `shutdown` the handler task is still aborted and
/// chromiumoxide kills the process.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        info!(headless = options.headless, "launching browser");

        let mut builder = BrowserConfig::builder()
            .request_timeout(options.request_timeout)
            .window_size(options.viewport_width, options.viewport_height)
            .viewport(Viewport {
                width: options.viewport_width,
                height: options.viewport_height,
                device_scale_factor: Some(1.0),
                ..Default::default()
            })
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-extensions")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(Error::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("browser handler error: {e:?}");
                }
            }
            debug!("browser event handler task completed");
        });

        let page = browser.new_page("about:blank").await?;
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Closes Chrome and waits for the process to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("shutting down browser");
        self.browser.close().await?;
        self.browser.wait().await?;
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl PageSource for ChromeSession {
    async fn fetch(&self, url: &str, settle: Duration) -> Result<String> {
        self.navigate(url).await?;
        tokio::time::sleep(settle).await;
        self.page_source().await
    }
}

#[async_trait]
impl HeadlessBrowser for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| Error::FetchFailure {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        let result = self.page.evaluate(script).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn scroll_to(&self, y: u64) -> Result<()> {
        self.page
            .evaluate(format!("window.scrollTo(0, {y})"))
            .await?;
        Ok(())
    }

    async fn screenshot_viewport(&self) -> Result<Vec<u8>> {
        let params = CaptureScreenshotParams {
            format: Some(CaptureScreenshotFormat::Png),
            ..Default::default()
        };
        Ok(self.page.screenshot(params).await?)
    }

    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(100);
        loop {
            match self.page.find_element(selector).await {
                Ok(_) => {
                    debug!("'{selector}' present after {:?}", start.elapsed());
                    return Ok(());
                }
                Err(_) if start.elapsed() >= timeout => {
                    warn!("timed out waiting for '{selector}'");
                    return Err(Error::PageNotReady {
                        selector: selector.to_string(),
                        waited: timeout,
                    });
                }
                Err(_) => tokio::time::sleep(poll_interval).await,
            }
        }
    }
}
