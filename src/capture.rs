//! Full-page screenshots assembled from viewport captures, with the filter
//! keyword highlighted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use image::{imageops, ImageFormat, RgbaImage};
use tracing::{debug, info};

use crate::browser::HeadlessBrowser;
use crate::{Error, Result};

pub const ROOT_SELECTOR: &str = "body";
pub const SCROLL_HEIGHT_SCRIPT: &str = "document.body.scrollHeight";
pub const VIEWPORT_HEIGHT_SCRIPT: &str = "window.innerHeight";

const NEEDLE: &str = "__NEEDLE__";

// Wraps every literal occurrence in a yellow span. Only text nodes are
// touched, so attributes, scripts and the location stay as they are.
const HIGHLIGHT_TEMPLATE: &str = r#"(() => {
    const needle = __NEEDLE__;
    if (!needle || !document.body) return 0;
    const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT);
    const nodes = [];
    while (walker.nextNode()) {
        const node = walker.currentNode;
        const tag = node.parentNode ? node.parentNode.nodeName : '';
        if (tag !== 'SCRIPT' && tag !== 'STYLE' && node.nodeValue.includes(needle)) {
            nodes.push(node);
        }
    }
    let count = 0;
    for (const node of nodes) {
        const frag = document.createDocumentFragment();
        node.nodeValue.split(needle).forEach((part, i) => {
            if (i > 0) {
                const mark = document.createElement('span');
                mark.style.backgroundColor = 'yellow';
                mark.textContent = needle;
                frag.appendChild(mark);
                count++;
            }
            if (part) frag.appendChild(document.createTextNode(part));
        });
        node.parentNode.replaceChild(frag, node);
    }
    return count;
})()"#;

/// Script that highlights `keyword` on the current page and returns the
/// number of occurrences wrapped.
pub fn highlight_script(keyword: &str) -> Result<String> {
    let literal = serde_json::to_string(keyword)?;
    Ok(HIGHLIGHT_TEMPLATE.replace(NEEDLE, &literal))
}

/// Scroll offsets `0, V, 2V, ...` below `total_height`.
pub fn slice_offsets(total_height: u32, viewport_height: u32) -> Result<Vec<u32>> {
    if total_height == 0 || viewport_height == 0 {
        return Err(Error::EmptyCapture);
    }
    Ok((0..total_height).step_by(viewport_height as usize).collect())
}

/// Pastes `slices` top to bottom onto a canvas `total_height` tall.
///
/// Each slice goes right below the previous one. When the page height isn't a
/// multiple of the viewport height the last slice runs past the canvas and is
/// clipped there; nothing is cropped to line it up.
pub fn stitch(slices: &[RgbaImage], total_height: u32) -> Result<RgbaImage> {
    let first = slices.first().ok_or(Error::EmptyCapture)?;
    let mut canvas = RgbaImage::new(first.width(), total_height);
    let mut offset: i64 = 0;
    for slice in slices {
        imageops::replace(&mut canvas, slice, 0, offset);
        offset += i64::from(slice.height());
    }
    Ok(canvas)
}

/// `<dir>/<title>.png`, or `<dir>/<title>_<timestamp>.png` when that name is
/// already taken.
pub fn unique_screenshot_path(dir: &Path, title: &str) -> PathBuf {
    let mut stem = sanitize_filename::sanitize(title.trim());
    if stem.is_empty() {
        stem = "untitled".to_string();
    }

    let path = dir.join(format!("{stem}.png"));
    if !path.exists() {
        return path;
    }

    let stamp = Utc::now().timestamp_millis();
    let mut path = dir.join(format!("{stem}_{stamp}.png"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem}_{stamp}_{n}.png"));
        n += 1;
    }
    path
}

pub struct HighlightScreenshotCapturer<'a> {
    browser: &'a dyn HeadlessBrowser,
    scroll_settle: Duration,
    ready_timeout: Duration,
}

impl<'a> HighlightScreenshotCapturer<'a> {
    pub fn new(browser: &'a dyn HeadlessBrowser) -> Self {
        Self {
            browser,
            scroll_settle: Duration::from_millis(500),
            ready_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_scroll_settle(mut self, scroll_settle: Duration) -> Self {
        self.scroll_settle = scroll_settle;
        self
    }

    pub fn with_ready_timeout(mut self, ready_timeout: Duration) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }

    /// Captures the page currently loaded in the browser into `out_dir`,
    /// named after `title`, and returns the written path.
    pub async fn capture(&self, keyword: &str, title: &str, out_dir: &Path) -> Result<PathBuf> {
        self.browser
            .wait_for_element(ROOT_SELECTOR, self.ready_timeout)
            .await?;

        let highlighted = self.browser.execute_script(&highlight_script(keyword)?).await?;
        debug!("highlighted {highlighted} occurrences of '{keyword}'");

        let total_height = self.script_u32(SCROLL_HEIGHT_SCRIPT).await?;
        let viewport_height = self.script_u32(VIEWPORT_HEIGHT_SCRIPT).await?;
        let offsets = slice_offsets(total_height, viewport_height)?;
        debug!(
            total_height,
            viewport_height,
            slices = offsets.len(),
            "capturing viewport slices"
        );

        let mut slices = Vec::with_capacity(offsets.len());
        for y in offsets {
            self.browser.scroll_to(u64::from(y)).await?;
            tokio::time::sleep(self.scroll_settle).await;
            let png = self.browser.screenshot_viewport().await?;
            slices.push(image::load_from_memory(&png)?.to_rgba8());
        }

        let path = unique_screenshot_path(out_dir, title);
        let canvas = stitch(&slices, total_height)?;
        let target = path.clone();
        tokio::task::spawn_blocking(move || canvas.save_with_format(&target, ImageFormat::Png))
            .await??;

        info!("saved screenshot: {}", path.display());
        Ok(path)
    }

    async fn script_u32(&self, script: &str) -> Result<u32> {
        let value = self.browser.execute_script(script).await?;
        value
            .as_u64()
            .or_else(|| value.as_f64().map(|v| v.ceil() as u64))
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| Error::ParseFailure(format!("'{script}' returned {value}")))
    }
}
