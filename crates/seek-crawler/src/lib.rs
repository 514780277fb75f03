//! Job-listing crawler for SEEK search results.
//!
//! This crate provides:
//! - A layered browser session (runtime, browser, context, primary page)
//! - Paginated traversal of search results with job, page and recency limits
//! - Per-listing detail extraction with placeholder text for missing fields
//! - JSON output and an HTTP service for submitting crawls

pub mod config;
pub mod error;
pub mod extractor;
pub mod output;
pub mod pagination;
pub mod recency;
pub mod render;
pub mod retry;
pub mod scroll;
pub mod server;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types
pub use config::CrawlerConfig;
pub use error::{CrawlError, RenderError};
pub use pagination::PaginationController;
pub use render::chromium::{ChromiumBackend, ChromiumFactory};
pub use session::{BackendFactory, Session, SessionBackend};
pub use types::{CrawlReport, CrawlRequest, JobListing, StopReason};

/// Run one crawl on a fresh session over `backend`.
///
/// The session is released on every path once it has been acquired.
///
/// # Errors
///
/// Returns an error if the request is invalid, the session cannot be opened,
/// or the first results page never loads.
pub async fn crawl<B: SessionBackend>(
    backend: B,
    request: &CrawlRequest,
    config: &CrawlerConfig,
) -> Result<CrawlReport, CrawlError> {
    request.validate()?;

    let session = Session::acquire(backend).await?;
    let outcome = PaginationController::new(session.context(), session.primary(), config)
        .run(request)
        .await;
    session.release().await;

    if let Err(e) = &outcome {
        tracing::error!(error = %e, "Crawl aborted");
    }
    outcome
}
