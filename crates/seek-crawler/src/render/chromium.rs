//! Chrome DevTools backend using chromiumoxide.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{BrowsingContext, ElementState, LoadState, RenderSurface};
use crate::config::BrowserSettings;
use crate::error::RenderError;
use crate::session::{BackendFactory, SessionBackend};

/// Interval between DOM polls while waiting for an element or load state.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for the CDP event loop to finish after the browser closes.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const VISIBILITY_FN: &str = "function() { \
    const style = window.getComputedStyle(this); \
    const rect = this.getBoundingClientRect(); \
    return style.visibility !== 'hidden' && style.display !== 'none' \
        && rect.width > 0 && rect.height > 0; \
}";

/// Session backend driving a local Chrome/Chromium.
///
/// The runtime is the CDP event loop task, the browser is the Chrome
/// process, and the context is an isolated browser context that every tab
/// of one crawl is created in.
pub struct ChromiumBackend {
    settings: BrowserSettings,
    config: Option<BrowserConfig>,
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    context_id: Option<BrowserContextId>,
}

impl ChromiumBackend {
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            config: None,
            browser: None,
            handler: None,
            context_id: None,
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, RenderError> {
        let (width, height) = self.settings.viewport;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .arg(format!("--user-agent={}", self.settings.user_agent));
        if !self.settings.headless {
            builder = builder.with_head();
        }
        for arg in &self.settings.args {
            builder = builder.arg(arg.as_str());
        }
        builder
            .build()
            .map_err(|e| RenderError::Backend(format!("Failed to build browser config: {e}")))
    }
}

#[async_trait]
impl SessionBackend for ChromiumBackend {
    async fn start_runtime(&mut self) -> Result<(), RenderError> {
        // Resolves the Chrome executable; fails here if none is installed.
        self.config = Some(self.browser_config()?);
        Ok(())
    }

    async fn launch_browser(&mut self) -> Result<(), RenderError> {
        let config = self
            .config
            .take()
            .ok_or(RenderError::NotOpen("runtime not started"))?;

        tracing::info!(headless = self.settings.headless, "Launching browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(RenderError::backend)?;

        // Spawn handler task
        self.handler = Some(tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        }));
        self.browser = Some(browser);
        Ok(())
    }

    async fn open_context(&mut self) -> Result<(), RenderError> {
        let browser = self
            .browser
            .as_mut()
            .ok_or(RenderError::NotOpen("browser not launched"))?;
        let id = browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
            .map_err(RenderError::backend)?;
        tracing::debug!(context = ?id, "Created browser context");
        self.context_id = Some(id);
        Ok(())
    }

    async fn close_context(&mut self) -> Result<(), RenderError> {
        let (Some(browser), Some(id)) = (self.browser.as_ref(), self.context_id.take()) else {
            return Ok(());
        };
        browser
            .dispose_browser_context(id)
            .await
            .map_err(RenderError::backend)
    }

    async fn close_browser(&mut self) -> Result<(), RenderError> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        browser.close().await.map_err(RenderError::backend)?;
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "Browser process did not exit cleanly");
        }
        Ok(())
    }

    async fn stop_runtime(&mut self) -> Result<(), RenderError> {
        self.config = None;
        let Some(mut handle) = self.handler.take() else {
            return Ok(());
        };
        match tokio::time::timeout(RUNTIME_SHUTDOWN_GRACE, &mut handle).await {
            Ok(joined) => joined.map_err(RenderError::backend),
            Err(_) => {
                tracing::warn!("Browser event loop still running, aborting it");
                handle.abort();
                Ok(())
            }
        }
    }
}

#[async_trait]
impl BrowsingContext for ChromiumBackend {
    type Tab = ChromiumTab;

    async fn open_tab(&self) -> Result<ChromiumTab, RenderError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or(RenderError::NotOpen("browser not launched"))?;

        let mut params = CreateTargetParams::builder().url("about:blank");
        if let Some(id) = &self.context_id {
            params = params.browser_context_id(id.clone());
        }
        let params = params.build().map_err(RenderError::Backend)?;

        let page = browser.new_page(params).await.map_err(RenderError::backend)?;
        Ok(ChromiumTab { page })
    }

    async fn close_tab(&self, tab: ChromiumTab) -> Result<(), RenderError> {
        tab.page.close().await.map_err(RenderError::backend)
    }
}

/// Creates a [`ChromiumBackend`] per crawl.
#[derive(Debug, Clone)]
pub struct ChromiumFactory {
    settings: BrowserSettings,
}

impl ChromiumFactory {
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

impl BackendFactory for ChromiumFactory {
    type Backend = ChromiumBackend;

    fn create(&self) -> ChromiumBackend {
        ChromiumBackend::new(self.settings.clone())
    }
}

/// One Chrome tab.
pub struct ChromiumTab {
    page: Page,
}

impl ChromiumTab {
    async fn any_matching(&self, selector: &str, state: ElementState) -> bool {
        let Ok(elements) = self.page.find_elements(selector).await else {
            return false;
        };
        match state {
            ElementState::Attached => !elements.is_empty(),
            ElementState::Visible => {
                for element in &elements {
                    if self.is_visible(element).await.unwrap_or(false) {
                        return true;
                    }
                }
                false
            }
        }
    }
}

#[async_trait]
impl RenderSurface for ChromiumTab {
    type Element = Element;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(RenderError::Timeout {
                what: format!("navigation to {url}"),
                after: timeout,
            }),
        }
    }

    async fn wait_for_load(&self, state: LoadState, timeout: Duration) -> Result<(), RenderError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let ready = self
                .evaluate("document.readyState")
                .await
                .ok()
                .and_then(|v| v.as_str().map(ToString::to_string));
            let reached = match state {
                LoadState::DomContentLoaded => {
                    matches!(ready.as_deref(), Some("interactive" | "complete"))
                }
            };
            if reached {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(RenderError::Timeout {
                    what: format!("load state {state:?}"),
                    after: timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
        state: ElementState,
    ) -> Result<(), RenderError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.any_matching(selector, state).await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(RenderError::Timeout {
                    what: format!("selector {selector} ({state:?})"),
                    after: timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn locate_all(&self, selector: &str) -> Result<Vec<Element>, RenderError> {
        self.page
            .find_elements(selector)
            .await
            .map_err(RenderError::backend)
    }

    async fn locate_within(
        &self,
        parent: &Element,
        selector: &str,
    ) -> Result<Option<Element>, RenderError> {
        let mut children = parent
            .find_elements(selector)
            .await
            .map_err(RenderError::backend)?;
        if children.is_empty() {
            return Ok(None);
        }
        Ok(Some(children.swap_remove(0)))
    }

    async fn inner_text(&self, element: &Element) -> Result<String, RenderError> {
        let text = element.inner_text().await.map_err(RenderError::backend)?;
        Ok(text.unwrap_or_default())
    }

    async fn get_attribute(
        &self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, RenderError> {
        element.attribute(name).await.map_err(RenderError::backend)
    }

    async fn is_visible(&self, element: &Element) -> Result<bool, RenderError> {
        let returns = element
            .call_js_fn(VISIBILITY_FN, false)
            .await
            .map_err(|e| RenderError::Script(e.to_string()))?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, RenderError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| RenderError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }
}
