//! Crawler configuration.
//!
//! Every value has a default matching the production site. Operational knobs
//! can be overridden through environment variables; the rest is fixed per
//! deployment.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default site root used to resolve relative links.
pub const DEFAULT_BASE_URL: &str = "https://www.seek.com.au";

/// Default navigation timeout.
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 15_000;

/// Default per-field wait on detail pages.
pub const DEFAULT_FIELD_TIMEOUT_MS: u64 = 20_000;

/// Default wait for a card's link attribute.
pub const DEFAULT_CARD_LINK_TIMEOUT_MS: u64 = 5_000;

/// Default cap on scroll rounds per page.
pub const DEFAULT_MAX_SCROLL_ROUNDS: u32 = 50;

/// Desktop Chrome user agent presented to the site.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Top-level crawler configuration.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Root URL that card and pagination hrefs are resolved against.
    pub base_url: String,
    pub browser: BrowserSettings,
    pub timeouts: Timeouts,
    pub timing: Timing,
    pub retry: RetryPolicies,
    pub selectors: Selectors,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            browser: BrowserSettings::default(),
            timeouts: Timeouts::default(),
            timing: Timing::default(),
            retry: RetryPolicies::default(),
            selectors: Selectors::default(),
        }
    }
}

impl CrawlerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Optional Environment Variables
    /// - `SEEK_BASE_URL`: Site root (default: https://www.seek.com.au)
    /// - `SEEK_HEADLESS`: Run Chrome without a window (default: true)
    /// - `SEEK_NAV_TIMEOUT_MS`: Navigation timeout (default: 15000)
    /// - `SEEK_FIELD_TIMEOUT_MS`: Per-field wait on detail pages (default: 20000)
    /// - `SEEK_CARD_LINK_TIMEOUT_MS`: Wait for a card's href (default: 5000)
    /// - `SEEK_MAX_SCROLL_ROUNDS`: Scroll loop cap (default: 50)
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("SEEK_BASE_URL").unwrap_or(defaults.base_url);

        let headless = std::env::var("SEEK_HEADLESS")
            .ok()
            .and_then(|v| parse_bool(&v))
            .unwrap_or(defaults.browser.headless);

        let timeouts = Timeouts {
            navigation: env_millis("SEEK_NAV_TIMEOUT_MS").unwrap_or(defaults.timeouts.navigation),
            field: env_millis("SEEK_FIELD_TIMEOUT_MS").unwrap_or(defaults.timeouts.field),
            card_link: env_millis("SEEK_CARD_LINK_TIMEOUT_MS")
                .unwrap_or(defaults.timeouts.card_link),
        };

        let max_scroll_rounds = std::env::var("SEEK_MAX_SCROLL_ROUNDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.timing.max_scroll_rounds);

        Self {
            base_url,
            browser: BrowserSettings {
                headless,
                ..defaults.browser
            },
            timeouts,
            timing: Timing {
                max_scroll_rounds,
                ..defaults.timing
            },
            retry: defaults.retry,
            selectors: defaults.selectors,
        }
    }

    /// Configuration with every delay set to zero.
    #[cfg(test)]
    #[must_use]
    pub fn instant() -> Self {
        Self {
            timing: Timing {
                search_scroll_delay: Duration::ZERO,
                detail_scroll_delay: Duration::ZERO,
                page_settle: Duration::ZERO,
                max_scroll_rounds: DEFAULT_MAX_SCROLL_ROUNDS,
            },
            retry: RetryPolicies {
                page_load: RetryPolicy::new(3, Duration::ZERO),
                job_extraction: RetryPolicy::new(3, Duration::ZERO),
                next_page: RetryPolicy::once(),
            },
            ..Self::default()
        }
    }
}

/// Chrome launch settings.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub viewport: (u32, u32),
    pub user_agent: String,
    /// Extra command line switches.
    pub args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        let args = [
            "--disable-dev-shm-usage", // Avoid /dev/shm size issues in containers
            "--no-sandbox",            // Required for containerized environments
            "--disable-setuid-sandbox",
            "--disable-gpu",
            "--disable-software-rasterizer",
            "--disable-extensions",
            "--disable-background-networking",
            "--disable-features=TranslateUI,BlinkGenPropertyTrees",
            "--disable-default-apps",
            "--disable-sync",
        ];
        Self {
            headless: true,
            viewport: (1280, 720),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Per-operation timeouts.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Page navigation and search-page readiness.
    pub navigation: Duration,
    /// Each field locator on a detail page.
    pub field: Duration,
    /// Reading a card's link.
    pub card_link: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_millis(DEFAULT_NAVIGATION_TIMEOUT_MS),
            field: Duration::from_millis(DEFAULT_FIELD_TIMEOUT_MS),
            card_link: Duration::from_millis(DEFAULT_CARD_LINK_TIMEOUT_MS),
        }
    }
}

/// Pauses between page interactions.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Scroll delay on search result pages.
    pub search_scroll_delay: Duration,
    /// Scroll delay on listing detail pages.
    pub detail_scroll_delay: Duration,
    /// Pause after moving to the next results page.
    pub page_settle: Duration,
    pub max_scroll_rounds: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            search_scroll_delay: Duration::from_millis(200),
            detail_scroll_delay: Duration::from_millis(500),
            page_settle: Duration::from_secs(2),
            max_scroll_rounds: DEFAULT_MAX_SCROLL_ROUNDS,
        }
    }
}

/// Retry policies for the three places the crawl retries (or does not).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicies {
    /// First search page; exhaustion is fatal.
    pub page_load: RetryPolicy,
    /// Whole detail-page extraction; exhaustion skips the listing.
    pub job_extraction: RetryPolicy,
    /// Moving to the next results page; failure ends the crawl gracefully.
    pub next_page: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            page_load: RetryPolicy::new(3, Duration::from_secs(5)),
            job_extraction: RetryPolicy::new(3, Duration::from_secs(2)),
            next_page: RetryPolicy::once(),
        }
    }
}

/// CSS locators for the target site.
///
/// These track the site's markup and are expected to need updating when it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    /// Listing summary cards on a results page.
    pub job_card: String,
    /// Anchor inside a card.
    pub card_link: String,
    pub title: String,
    pub company: String,
    pub requirements: String,
    /// Candidate elements for the posting age.
    pub posting_time: String,
    /// Text a posting-age candidate must contain.
    pub posted_marker: String,
    /// Pagination control; `{n}` is replaced by the page number.
    pub page_link_template: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            job_card: r#"article[data-automation="normalJob"], [data-automation="jobCard"]"#
                .to_string(),
            card_link: "a".to_string(),
            title: r#"[data-automation="job-detail-title"], .j1ww7nx7"#.to_string(),
            company: r#"[data-automation="advertiser-name"], .y735df0"#.to_string(),
            requirements: r#"[data-automation="jobAdDetails"], .YCeva_0"#.to_string(),
            posting_time: r#"[data-automation="jobDetailsPage"] span"#.to_string(),
            posted_marker: "Posted".to_string(),
            page_link_template: r#"[data-automation="page-{n}"]"#.to_string(),
        }
    }
}

impl Selectors {
    /// Locator for the pagination control of `page`.
    #[must_use]
    pub fn page_link(&self, page: u32) -> String {
        self.page_link_template.replace("{n}", &page.to_string())
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
