//! Render surface capability consumed by the crawl loop.
//!
//! The crawler never talks to a browser directly: it navigates, waits for
//! and reads elements through [`RenderSurface`], and opens per-listing tabs
//! through [`BrowsingContext`]. [`chromium`] provides the Chrome DevTools
//! implementation.

pub mod chromium;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RenderError;

/// Document readiness to wait for after navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// DOM parsed (`readyState` is `interactive` or `complete`).
    DomContentLoaded,
}

/// Element condition a selector wait must reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    /// Present in the DOM.
    Attached,
    /// Present and rendered with a non-empty box.
    Visible,
}

/// One rendered page (the primary page or a listing tab).
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Handle to an element on this page.
    type Element: Send + Sync;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), RenderError>;

    async fn wait_for_load(&self, state: LoadState, timeout: Duration) -> Result<(), RenderError>;

    /// Wait until at least one element matches `selector` in `state`.
    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
        state: ElementState,
    ) -> Result<(), RenderError>;

    /// All elements matching `selector`, in document order.
    async fn locate_all(&self, selector: &str) -> Result<Vec<Self::Element>, RenderError>;

    /// First descendant of `parent` matching `selector`.
    async fn locate_within(
        &self,
        parent: &Self::Element,
        selector: &str,
    ) -> Result<Option<Self::Element>, RenderError>;

    async fn inner_text(&self, element: &Self::Element) -> Result<String, RenderError>;

    async fn get_attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, RenderError>;

    async fn is_visible(&self, element: &Self::Element) -> Result<bool, RenderError>;

    /// Evaluate a script expression and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, RenderError>;
}

/// Shared browsing context that listing tabs are opened in.
///
/// Tabs share cookies and storage with the primary page.
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    type Tab: RenderSurface;

    async fn open_tab(&self) -> Result<Self::Tab, RenderError>;

    async fn close_tab(&self, tab: Self::Tab) -> Result<(), RenderError>;
}
