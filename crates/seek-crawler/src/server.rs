//! HTTP service for submitting crawls.
//!
//! Provides REST API endpoints for:
//! - Liveness (`GET /`, `GET /health`)
//! - Running a crawl (`POST /scrape`)

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::CrawlerConfig;
use crate::error::CrawlError;
use crate::session::BackendFactory;
use crate::types::{CrawlRequest, JobListing};

/// Server state shared across handlers.
pub struct ServerState<F: BackendFactory> {
    /// Creates one browser backend per request
    pub factory: F,
    /// Crawler configuration
    pub config: CrawlerConfig,
}

impl<F: BackendFactory> ServerState<F> {
    pub fn new(factory: F, config: CrawlerConfig) -> Self {
        Self { factory, config }
    }
}

/// Build the HTTP router.
pub fn build_router<F: BackendFactory>(state: Arc<ServerState<F>>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/scrape", post(scrape_handler::<F>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or stops unexpectedly.
pub async fn run_server<F: BackendFactory>(state: Arc<ServerState<F>>, addr: &str) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Seek crawler API listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Request/Response types
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Envelope returned by `POST /scrape`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScrapeResponse {
    /// Crawl finished; listings in discovery order.
    Success { data: Vec<JobListing> },
    /// Crawl rejected or failed.
    Error { message: String },
}

// ============================================================================
// Handlers
// ============================================================================

async fn root_handler() -> impl IntoResponse {
    Json(MessageResponse {
        message: "Seek crawler API is running",
    })
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn scrape_handler<F: BackendFactory>(
    State(state): State<Arc<ServerState<F>>>,
    Json(request): Json<CrawlRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, &e);
    }

    info!(search_url = %request.search_url, "Received crawl request");
    let backend = state.factory.create();

    match crate::crawl(backend, &request, &state.config).await {
        Ok(report) => {
            info!(
                jobs = report.jobs.len(),
                stop_reason = %report.stop_reason,
                "Crawl request complete"
            );
            (
                StatusCode::OK,
                Json(ScrapeResponse::Success { data: report.jobs }),
            )
                .into_response()
        }
        Err(e) => {
            error!(search_url = %request.search_url, error = %e, "Crawl request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e)
        }
    }
}

fn error_response(status: StatusCode, error: &CrawlError) -> Response {
    (
        status,
        Json(ScrapeResponse::Error {
            message: error.to_string(),
        }),
    )
        .into_response()
}
