//! Listing detail extraction.
//!
//! Each listing is opened in its own tab. The four text fields are read
//! independently: a missing field becomes its placeholder string and never
//! fails the listing. Only failures around the fields (opening the tab,
//! navigation, load, scrolling) fail the extraction, which lets the caller
//! retry the whole listing.

use crate::config::CrawlerConfig;
use crate::error::RenderError;
use crate::render::{BrowsingContext, ElementState, LoadState, RenderSurface};
use crate::scroll::scroll_to_bottom;
use crate::types::{
    JobListing, COMPANY_NOT_FOUND, JOB_ID_NOT_FOUND, POSTING_TIME_NOT_FOUND,
    REQUIREMENTS_NOT_FOUND, TITLE_NOT_FOUND,
};

/// Tokens one of which a posting-age candidate must contain.
const RELATIVE_TIME_TOKENS: [&str; 4] = ["ago", "h", "d", "m"];

/// Result of reading a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Found(String),
    Missing,
}

impl FieldValue {
    /// The found text, or `sentinel` when missing.
    pub fn or_sentinel(self, sentinel: &str) -> String {
        match self {
            Self::Found(text) => text,
            Self::Missing => sentinel.to_string(),
        }
    }
}

/// Reads listing detail pages through a shared browsing context.
pub struct JobExtractor<'a, C: BrowsingContext> {
    context: &'a C,
    config: &'a CrawlerConfig,
}

impl<'a, C: BrowsingContext> JobExtractor<'a, C> {
    pub fn new(context: &'a C, config: &'a CrawlerConfig) -> Self {
        Self { context, config }
    }

    /// Extract one listing. The tab is closed on every path.
    pub async fn extract(&self, job_url: &str) -> Result<JobListing, RenderError> {
        let tab = self.context.open_tab().await?;
        let result = self.read_listing(&tab, job_url).await;
        if let Err(e) = self.context.close_tab(tab).await {
            tracing::warn!(url = job_url, error = %e, "Failed to close listing tab");
        }

        match &result {
            Ok(listing) => tracing::debug!(url = job_url, title = %listing.title, "Extracted listing"),
            Err(e) => tracing::warn!(url = job_url, error = %e, "Listing extraction failed"),
        }
        result
    }

    async fn read_listing(&self, tab: &C::Tab, job_url: &str) -> Result<JobListing, RenderError> {
        let timeouts = &self.config.timeouts;
        let selectors = &self.config.selectors;

        tab.navigate(job_url, timeouts.navigation).await?;
        tab.wait_for_load(LoadState::DomContentLoaded, timeouts.navigation)
            .await?;
        scroll_to_bottom(
            tab,
            self.config.timing.detail_scroll_delay,
            self.config.timing.max_scroll_rounds,
        )
        .await?;

        let title = read_field(tab, &selectors.title, timeouts.field).await;
        let company = read_field(tab, &selectors.company, timeouts.field).await;
        let requirements = read_field(tab, &selectors.requirements, timeouts.field).await;
        let posting_time = read_posting_time(
            tab,
            &selectors.posting_time,
            &selectors.posted_marker,
            timeouts.field,
        )
        .await;

        Ok(JobListing {
            url: job_url.to_string(),
            job_id: extract_job_id(job_url),
            title: title.or_sentinel(TITLE_NOT_FOUND),
            company: company.or_sentinel(COMPANY_NOT_FOUND),
            requirements: requirements.or_sentinel(REQUIREMENTS_NOT_FOUND),
            posting_time: posting_time.or_sentinel(POSTING_TIME_NOT_FOUND),
        })
    }
}

/// Wait for `selector` and read the text of its first match.
pub async fn read_field<S: RenderSurface>(
    surface: &S,
    selector: &str,
    timeout: std::time::Duration,
) -> FieldValue {
    if let Err(e) = surface
        .wait_for_selector(selector, timeout, ElementState::Attached)
        .await
    {
        tracing::debug!(selector, error = %e, "Field not present");
        return FieldValue::Missing;
    }

    let first = match surface.locate_all(selector).await {
        Ok(elements) => elements.into_iter().next(),
        Err(e) => {
            tracing::debug!(selector, error = %e, "Field lookup failed");
            None
        }
    };
    let Some(element) = first else {
        return FieldValue::Missing;
    };

    match surface.inner_text(&element).await {
        Ok(text) => FieldValue::Found(text),
        Err(e) => {
            tracing::debug!(selector, error = %e, "Field text unreadable");
            FieldValue::Missing
        }
    }
}

/// Pick the first candidate whose text contains `marker` and a relative
/// time token.
pub async fn read_posting_time<S: RenderSurface>(
    surface: &S,
    selector: &str,
    marker: &str,
    timeout: std::time::Duration,
) -> FieldValue {
    if let Err(e) = surface
        .wait_for_selector(selector, timeout, ElementState::Attached)
        .await
    {
        tracing::debug!(selector, error = %e, "Posting time not present");
        return FieldValue::Missing;
    }

    let Ok(candidates) = surface.locate_all(selector).await else {
        return FieldValue::Missing;
    };

    for candidate in &candidates {
        let Ok(text) = surface.inner_text(candidate).await else {
            continue;
        };
        if is_posting_age(&text, marker) {
            return FieldValue::Found(text);
        }
    }

    tracing::debug!(
        candidates = candidates.len(),
        "No candidate looked like a posting age"
    );
    FieldValue::Missing
}

fn is_posting_age(text: &str, marker: &str) -> bool {
    text.contains(marker)
        && RELATIVE_TIME_TOKENS
            .iter()
            .any(|token| text.contains(token))
}

/// Listing ID: the path segment after `/job/`, up to any query string.
///
/// URLs without a `/job/` segment, or with nothing after it, yield
/// [`JOB_ID_NOT_FOUND`].
pub fn extract_job_id(url: &str) -> String {
    let Some(start) = url.find("/job/") else {
        return JOB_ID_NOT_FOUND.to_string();
    };
    let rest = &url[start + "/job/".len()..];
    let id = rest.split('?').next().unwrap_or_default();
    if id.is_empty() {
        JOB_ID_NOT_FOUND.to_string()
    } else {
        id.to_string()
    }
}
