//! Browser session lifecycle.
//!
//! A session is opened in four steps (runtime, browser, context, primary
//! page) and torn down in reverse. Teardown runs on every exit path: after a
//! crawl, after a failed crawl, and after a partially completed acquisition.

use async_trait::async_trait;

use crate::error::{CrawlError, RenderError};
use crate::render::BrowsingContext;

/// Acquisition steps, in the order they are performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Runtime,
    Browser,
    Context,
    Page,
}

/// Backend that can open and close each layer of a browser session.
///
/// Once the context is open the backend itself is the [`BrowsingContext`]
/// listing tabs are opened in.
#[async_trait]
pub trait SessionBackend: BrowsingContext + Send {
    async fn start_runtime(&mut self) -> Result<(), RenderError>;

    async fn launch_browser(&mut self) -> Result<(), RenderError>;

    async fn open_context(&mut self) -> Result<(), RenderError>;

    async fn close_context(&mut self) -> Result<(), RenderError>;

    async fn close_browser(&mut self) -> Result<(), RenderError>;

    async fn stop_runtime(&mut self) -> Result<(), RenderError>;
}

/// Creates a fresh backend per session.
pub trait BackendFactory: Send + Sync + 'static {
    type Backend: SessionBackend + 'static;

    fn create(&self) -> Self::Backend;
}

/// An open browser session.
pub struct Session<B: SessionBackend> {
    backend: B,
    primary: B::Tab,
}

impl<B: SessionBackend> Session<B> {
    /// Open every layer of the session.
    ///
    /// If any step fails, the layers already opened are closed before the
    /// error is returned.
    pub async fn acquire(mut backend: B) -> Result<Self, CrawlError> {
        tracing::debug!("Acquiring browser session");

        if let Err(e) = backend.start_runtime().await {
            return Err(CrawlError::SessionAcquisition(e));
        }
        if let Err(e) = backend.launch_browser().await {
            teardown(&mut backend, Stage::Runtime).await;
            return Err(CrawlError::SessionAcquisition(e));
        }
        if let Err(e) = backend.open_context().await {
            teardown(&mut backend, Stage::Browser).await;
            return Err(CrawlError::SessionAcquisition(e));
        }
        let primary = match backend.open_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                teardown(&mut backend, Stage::Context).await;
                return Err(CrawlError::SessionAcquisition(e));
            }
        };

        tracing::info!("Browser session ready");
        Ok(Self { backend, primary })
    }

    /// Page used for search result navigation.
    pub fn primary(&self) -> &B::Tab {
        &self.primary
    }

    /// Context listing tabs are opened in.
    pub fn context(&self) -> &B {
        &self.backend
    }

    /// Close the primary page, then context, browser and runtime.
    ///
    /// Failures are logged; every layer is still attempted.
    pub async fn release(self) {
        let Self {
            mut backend,
            primary,
        } = self;

        if let Err(e) = backend.close_tab(primary).await {
            tracing::warn!(error = %e, "Failed to close primary page");
        }
        teardown(&mut backend, Stage::Context).await;
        tracing::info!("Browser session released");
    }
}

/// Close every layer up to and including `reached`, innermost first.
async fn teardown<B: SessionBackend>(backend: &mut B, reached: Stage) {
    if reached >= Stage::Context {
        if let Err(e) = backend.close_context().await {
            tracing::warn!(error = %e, "Failed to close browsing context");
        }
    }
    if reached >= Stage::Browser {
        if let Err(e) = backend.close_browser().await {
            tracing::warn!(error = %e, "Failed to close browser");
        }
    }
    if let Err(e) = backend.stop_runtime().await {
        tracing::warn!(error = %e, "Failed to stop browser runtime");
    }
}
