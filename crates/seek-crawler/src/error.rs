//! Error types for the crawler.

use std::time::Duration;

use thiserror::Error;

/// Failures reported by a render backend.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A wait or navigation exceeded its deadline.
    #[error("timed out after {}ms waiting for {what}", .after.as_millis())]
    Timeout { what: String, after: Duration },

    /// Navigation was rejected or the page failed to load.
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// Script evaluation failed or returned an unexpected value.
    #[error("script evaluation failed: {0}")]
    Script(String),

    /// The browser, context or tab needed for this call is not open.
    #[error("browser session is not open: {0}")]
    NotOpen(&'static str),

    /// Any other backend failure.
    #[error("browser error: {0}")]
    Backend(String),
}

impl RenderError {
    /// Wrap an arbitrary backend error.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Crawl-level failures surfaced to callers.
///
/// Everything not listed here is absorbed by the crawl loop and only shows
/// up as a shorter result list.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Opening the runtime, browser, context or primary page failed.
    #[error("failed to acquire browser session: {0}")]
    SessionAcquisition(#[source] RenderError),

    /// The first search page never loaded.
    #[error("search page {url} could not be loaded after {attempts} attempt(s): {error}")]
    InitialPageLoad {
        url: String,
        attempts: u32,
        #[source]
        error: RenderError,
    },

    /// The request failed validation before any browser work.
    #[error("invalid crawl request: {0}")]
    InvalidRequest(String),

    /// Writing results failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing results failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
