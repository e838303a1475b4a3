//! Headless Chrome session over the DevTools protocol.
//!
//! ## Why spawn_blocking?
//!
//! `headless_chrome` is a synchronous client: every call blocks the calling
//! thread until Chrome answers over its websocket. Each operation is moved
//! onto Tokio's blocking pool so the async workers (and the HTTP server
//! sharing them) never stall on a slow page.
//!
//! ## Capture targets
//!
//! The query script stamps every resolved target node with a
//! `data-harvest-target` index and hands back an attribute selector for it.
//! Two annotated children of the same container resolve to the same stamp,
//! and a node that is detached before capture simply stops matching.

use super::{CaptureTarget, DomCandidate, PageSession};
use crate::error::{BrowserError, HarvestError};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const QUERY_SCRIPT: &str = r#"(() => {
  const attr = __ATTR__;
  const containerSelector = __CONTAINER__;
  let next = document.querySelectorAll('[data-harvest-target]').length;
  const stamp = (node) => {
    if (!node.hasAttribute('data-harvest-target')) {
      node.setAttribute('data-harvest-target', String(next++));
    }
    return '[data-harvest-target="' + node.getAttribute('data-harvest-target') + '"]';
  };
  const found = [];
  document.querySelectorAll('[' + attr + ']').forEach((el) => {
    const container = el.closest(containerSelector);
    const target = container || el;
    const rect = target.getBoundingClientRect();
    found.push({
      id: el.id || '',
      raw_payload: el.getAttribute(attr) || '',
      container: container ? { raw_payload: container.getAttribute(attr) || '' } : null,
      target: { selector: stamp(target) },
      bounds: { width: rect.width, height: rect.height },
    });
  });
  return JSON.stringify(found);
})()"#;

/// A single Chrome tab reused for a whole batch.
pub struct ChromeSession {
    // Dropping the browser kills the Chrome process; keep it alive with the tab.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    /// Launch headless Chrome and open one tab.
    ///
    /// `navigation_timeout` becomes the tab's default wait for navigation
    /// and element lookups.
    pub async fn launch(navigation_timeout: Duration) -> Result<Self, HarvestError> {
        tokio::task::spawn_blocking(move || Self::launch_blocking(navigation_timeout))
            .await
            .map_err(|e| HarvestError::Internal(format!("Browser launch task panicked: {e}")))?
    }

    fn launch_blocking(navigation_timeout: Duration) -> Result<Self, HarvestError> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((1440, 900)))
            .build()
            .map_err(|e| HarvestError::BrowserLaunch(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| HarvestError::BrowserLaunch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| HarvestError::BrowserLaunch(e.to_string()))?;
        tab.set_default_timeout(navigation_timeout);

        info!("Headless Chrome ready");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, BrowserError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Tab>) -> Result<T, BrowserError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || op(tab))
            .await
            .map_err(|e| BrowserError::new(format!("browser task panicked: {e}")))?
    }
}

fn query_script(attribute: &str, container_selector: &str) -> Result<String, BrowserError> {
    let attr = serde_json::to_string(attribute).map_err(|e| BrowserError::new(e.to_string()))?;
    let container =
        serde_json::to_string(container_selector).map_err(|e| BrowserError::new(e.to_string()))?;
    Ok(QUERY_SCRIPT
        .replace("__ATTR__", &attr)
        .replace("__CONTAINER__", &container))
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let url = url.to_string();
        self.blocking(move |tab| {
            tab.navigate_to(&url)
                .and_then(|t| t.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| BrowserError::new(e.to_string()))
        })
        .await
    }

    async fn dismiss_overlay(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            let button = tab
                .wait_for_element_with_custom_timeout(&selector, timeout)
                .map_err(|e| BrowserError::new(e.to_string()))?;
            button.click().map_err(|e| BrowserError::new(e.to_string()))?;
            debug!("Dismissed overlay '{}'", selector);
            Ok(())
        })
        .await
    }

    async fn query_annotated(
        &mut self,
        attribute: &str,
        container_selector: &str,
    ) -> Result<Vec<DomCandidate>, BrowserError> {
        let script = query_script(attribute, container_selector)?;
        self.blocking(move |tab| {
            let result = tab
                .evaluate(&script, false)
                .map_err(|e| BrowserError::new(e.to_string()))?;
            let json = match result.value {
                Some(serde_json::Value::String(s)) => s,
                other => {
                    return Err(BrowserError::new(format!(
                        "query script returned {other:?} instead of a JSON string"
                    )))
                }
            };
            serde_json::from_str(&json).map_err(|e| BrowserError::new(e.to_string()))
        })
        .await
    }

    async fn screenshot(&mut self, target: &CaptureTarget) -> Result<Option<Vec<u8>>, BrowserError> {
        let selector = target.selector.clone();
        self.blocking(move |tab| {
            let element = match tab.find_element(&selector) {
                Ok(el) => el,
                Err(e) => {
                    debug!("Capture target '{}' not found: {}", selector, e);
                    return Ok(None);
                }
            };
            element
                .capture_screenshot(CaptureScreenshotFormatOption::Png)
                .map(Some)
                .map_err(|e| BrowserError::new(e.to_string()))
        })
        .await
    }
}
