//! JSON persistence of crawl results.

use std::path::Path;

use crate::error::CrawlError;
use crate::types::JobListing;

/// Default output file for the CLI.
pub const DEFAULT_OUTPUT_FILE: &str = "seek_jobs.json";

/// Render listings as a pretty-printed JSON array (2-space indent, UTF-8
/// text left unescaped).
pub fn to_json(jobs: &[JobListing]) -> Result<String, CrawlError> {
    Ok(serde_json::to_string_pretty(jobs)?)
}

/// Write listings to `path`, creating parent directories as needed.
pub fn save_json(path: &Path, jobs: &[JobListing]) -> Result<(), CrawlError> {
    let content = to_json(jobs)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), count = jobs.len(), "Saved jobs");
    Ok(())
}
