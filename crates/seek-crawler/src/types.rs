//! Crawl request and result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CrawlError;

/// Placeholder stored when the listing title could not be read.
pub const TITLE_NOT_FOUND: &str = "Title not found";
/// Placeholder stored when the advertiser name could not be read.
pub const COMPANY_NOT_FOUND: &str = "Company not found";
/// Placeholder stored when the listing body could not be read.
pub const REQUIREMENTS_NOT_FOUND: &str = "Requirements not found";
/// Placeholder stored when no posting-age element qualified.
pub const POSTING_TIME_NOT_FOUND: &str = "Posting time not found";
/// Placeholder stored when the listing URL carries no `/job/` segment.
pub const JOB_ID_NOT_FOUND: &str = "Job ID not found";

/// One crawl invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    /// Search results URL to start from.
    pub search_url: String,
    /// Relative age ceiling such as "1d ago".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_time_limit: Option<String>,
    /// Maximum number of result pages to visit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
    /// Maximum number of listings to collect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_jobs: Option<u32>,
}

impl CrawlRequest {
    /// Create a request with no limits.
    #[must_use]
    pub fn new(search_url: impl Into<String>) -> Self {
        Self {
            search_url: search_url.into(),
            posted_time_limit: None,
            max_pages: None,
            num_jobs: None,
        }
    }

    #[must_use]
    pub fn with_posted_time_limit(mut self, limit: impl Into<String>) -> Self {
        self.posted_time_limit = Some(limit.into());
        self
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    #[must_use]
    pub fn with_num_jobs(mut self, num_jobs: u32) -> Self {
        self.num_jobs = Some(num_jobs);
        self
    }

    /// Check the constraints of the service boundary.
    ///
    /// The crawl loop itself never calls this: a zero limit there simply
    /// behaves as an already-satisfied limit.
    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.search_url.trim().is_empty() {
            return Err(CrawlError::InvalidRequest(
                "search_url must be a non-empty string".to_string(),
            ));
        }
        if self.max_pages == Some(0) {
            return Err(CrawlError::InvalidRequest(
                "max_pages must be a positive integer".to_string(),
            ));
        }
        if self.num_jobs == Some(0) {
            return Err(CrawlError::InvalidRequest(
                "num_jobs must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// A single extracted listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    pub url: String,
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub requirements: String,
    /// Posting age exactly as rendered, e.g. "Posted 3h ago".
    pub posting_time: String,
}

/// Why a crawl stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `num_jobs` listings were collected.
    ReachedJobLimit,
    /// `max_pages` pages were visited.
    ReachedPageLimit,
    /// A listing older than the recency limit was found.
    ExceededRecencyLimit,
    /// No visible control for the next page.
    NoMoreCards,
    /// Navigating to the next page failed.
    NavigationFailed,
    /// The current page could not be enumerated.
    Exhausted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReachedJobLimit => write!(f, "reached_job_limit"),
            Self::ReachedPageLimit => write!(f, "reached_page_limit"),
            Self::ExceededRecencyLimit => write!(f, "exceeded_recency_limit"),
            Self::NoMoreCards => write!(f, "no_more_cards"),
            Self::NavigationFailed => write!(f, "navigation_failed"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Outcome of a finished crawl.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    /// Listings in discovery order.
    pub jobs: Vec<JobListing>,
    pub stop_reason: StopReason,
    /// Last page that was loaded.
    pub pages_visited: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
