//! Search result pagination.
//!
//! The controller walks result pages on the session's primary page, hands
//! every card's listing URL to the [`JobExtractor`], and decides after each
//! card and each page whether the crawl should stop.
//!
//! Results are assumed to be sorted newest first: the first listing older
//! than the recency limit ends the whole crawl.

use chrono::Utc;
use url::Url;

use crate::config::CrawlerConfig;
use crate::error::{CrawlError, RenderError};
use crate::extractor::JobExtractor;
use crate::recency::is_within_limit;
use crate::render::{BrowsingContext, ElementState, RenderSurface};
use crate::scroll::scroll_to_bottom;
use crate::types::{CrawlReport, CrawlRequest, JobListing, StopReason};

/// Mutable crawl progress, owned by one controller run.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlState {
    pub current_page: u32,
    pub jobs_scraped: u32,
    pub results: Vec<JobListing>,
    pub stop_reason: Option<StopReason>,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self {
            current_page: 1,
            jobs_scraped: 0,
            results: Vec::new(),
            stop_reason: None,
        }
    }
}

impl CrawlState {
    fn record(&mut self, listing: JobListing) {
        self.results.push(listing);
        self.jobs_scraped += 1;
    }

    fn job_limit_reached(&self, request: &CrawlRequest) -> bool {
        request
            .num_jobs
            .is_some_and(|limit| self.jobs_scraped >= limit)
    }
}

/// Loop phases.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    /// Load results page `page` from `url`.
    LoadingPage { page: u32, url: String },
    EnumeratingCards,
    DecidingPageAdvance,
    Stopped(StopReason),
}

/// Drives one crawl over the primary page of a session.
pub struct PaginationController<'a, C: BrowsingContext> {
    primary: &'a C::Tab,
    extractor: JobExtractor<'a, C>,
    config: &'a CrawlerConfig,
}

impl<'a, C: BrowsingContext> PaginationController<'a, C> {
    pub fn new(context: &'a C, primary: &'a C::Tab, config: &'a CrawlerConfig) -> Self {
        Self {
            primary,
            extractor: JobExtractor::new(context, config),
            config,
        }
    }

    /// Run the crawl to completion.
    ///
    /// Only a first results page that cannot be loaded is an error; every
    /// other failure ends or shortens the crawl.
    pub async fn run(&self, request: &CrawlRequest) -> Result<CrawlReport, CrawlError> {
        let started_at = Utc::now();
        let mut state = CrawlState::default();
        let mut phase = Phase::LoadingPage {
            page: 1,
            url: request.search_url.clone(),
        };

        tracing::info!(
            search_url = %request.search_url,
            posted_time_limit = ?request.posted_time_limit,
            max_pages = ?request.max_pages,
            num_jobs = ?request.num_jobs,
            "Starting crawl"
        );

        let stop_reason = loop {
            phase = match phase {
                Phase::LoadingPage { page, url } => {
                    self.load_page(page, &url, &mut state).await?
                }
                Phase::EnumeratingCards => self.process_page(request, &mut state).await,
                Phase::DecidingPageAdvance => self.decide_advance(request, &state).await,
                Phase::Stopped(reason) => break reason,
            };
        };
        state.stop_reason = Some(stop_reason);

        tracing::info!(
            jobs = state.results.len(),
            pages = state.current_page,
            stop_reason = %stop_reason,
            "Crawl finished"
        );

        Ok(CrawlReport {
            jobs: state.results,
            stop_reason,
            pages_visited: state.current_page,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn load_page(
        &self,
        page: u32,
        url: &str,
        state: &mut CrawlState,
    ) -> Result<Phase, CrawlError> {
        if page == 1 {
            self.load_first_page(url).await?;
        } else {
            let navigation = self
                .config
                .retry
                .next_page
                .run("next page navigation", |_| {
                    self.primary.navigate(url, self.config.timeouts.navigation)
                })
                .await;
            if let Err(e) = navigation {
                tracing::warn!(page, url, error = %e, "Could not open next results page");
                return Ok(Phase::Stopped(StopReason::NavigationFailed));
            }
            tokio::time::sleep(self.config.timing.page_settle).await;
        }
        state.current_page = page;

        if let Err(e) = scroll_to_bottom(
            self.primary,
            self.config.timing.search_scroll_delay,
            self.config.timing.max_scroll_rounds,
        )
        .await
        {
            tracing::warn!(page, error = %e, "Scrolling results page failed, using what loaded");
        }

        Ok(Phase::EnumeratingCards)
    }

    async fn load_first_page(&self, url: &str) -> Result<(), CrawlError> {
        let timeout = self.config.timeouts.navigation;
        let card_selector = self.config.selectors.job_card.as_str();

        self.config
            .retry
            .page_load
            .run("search page load", |_| async move {
                self.primary.navigate(url, timeout).await?;
                self.primary
                    .wait_for_selector(card_selector, timeout, ElementState::Visible)
                    .await?;
                Ok::<(), RenderError>(())
            })
            .await
            .map_err(|e| {
                let attempts = e.attempts();
                CrawlError::InitialPageLoad {
                    url: url.to_string(),
                    attempts,
                    error: e.into_inner(),
                }
            })
    }

    /// Process every card on the current page in document order.
    async fn process_page(&self, request: &CrawlRequest, state: &mut CrawlState) -> Phase {
        let cards = match self.primary.locate_all(&self.config.selectors.job_card).await {
            Ok(cards) => cards,
            Err(e) => {
                tracing::warn!(page = state.current_page, error = %e, "Could not enumerate job cards");
                return Phase::Stopped(StopReason::Exhausted);
            }
        };
        tracing::info!(page = state.current_page, cards = cards.len(), "Found job cards");

        for card in &cards {
            if state.job_limit_reached(request) {
                return Phase::Stopped(StopReason::ReachedJobLimit);
            }

            let Some(job_url) = self.card_url(card).await else {
                continue;
            };
            tracing::info!(job = state.jobs_scraped + 1, url = %job_url, "Processing job");

            let extraction = self
                .config
                .retry
                .job_extraction
                .run("job extraction", |_| self.extractor.extract(&job_url))
                .await;
            let listing = match extraction {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::warn!(url = %job_url, error = %e, "Skipping job");
                    continue;
                }
            };

            if let Some(limit) = request.posted_time_limit.as_deref() {
                if !is_within_limit(&listing.posting_time, Some(limit)) {
                    tracing::info!(
                        url = %job_url,
                        posting_time = %listing.posting_time,
                        limit,
                        "Listing older than limit, stopping"
                    );
                    return Phase::Stopped(StopReason::ExceededRecencyLimit);
                }
            }

            state.record(listing);
            tracing::info!(jobs_scraped = state.jobs_scraped, "Scraped job");
        }

        Phase::DecidingPageAdvance
    }

    /// The job limit is only checked before each card, so a met limit still
    /// advances and stops on the first card of the next page.
    async fn decide_advance(&self, request: &CrawlRequest, state: &CrawlState) -> Phase {
        if request
            .max_pages
            .is_some_and(|max_pages| state.current_page >= max_pages)
        {
            return Phase::Stopped(StopReason::ReachedPageLimit);
        }

        let next = state.current_page + 1;
        match self.next_page_url(next).await {
            Some(url) => Phase::LoadingPage { page: next, url },
            None => {
                tracing::info!(page = next, "No control for next page");
                Phase::Stopped(StopReason::NoMoreCards)
            }
        }
    }

    /// Absolute listing URL of a card, if it links anywhere.
    async fn card_url(&self, card: &<C::Tab as RenderSurface>::Element) -> Option<String> {
        let link = match self
            .primary
            .locate_within(card, &self.config.selectors.card_link)
            .await
        {
            Ok(Some(link)) => link,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Error reading job card");
                return None;
            }
        };

        let href = tokio::time::timeout(
            self.config.timeouts.card_link,
            self.primary.get_attribute(&link, "href"),
        )
        .await;
        let href = match href {
            Ok(Ok(Some(href))) if !href.is_empty() => href,
            Ok(Ok(_)) => return None,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Error reading job card link");
                return None;
            }
            Err(_) => {
                tracing::warn!("Timed out reading job card link");
                return None;
            }
        };

        self.resolve(&href)
    }

    /// URL behind the visible control for `page`.
    async fn next_page_url(&self, page: u32) -> Option<String> {
        let selector = self.config.selectors.page_link(page);
        let control = match self.primary.locate_all(&selector).await {
            Ok(controls) => controls.into_iter().next()?,
            Err(e) => {
                tracing::debug!(page, error = %e, "Pagination lookup failed");
                return None;
            }
        };

        if !self.primary.is_visible(&control).await.unwrap_or(false) {
            return None;
        }
        let href = self
            .primary
            .get_attribute(&control, "href")
            .await
            .ok()
            .flatten()
            .filter(|href| !href.is_empty())?;
        self.resolve(&href)
    }

    fn resolve(&self, href: &str) -> Option<String> {
        match Url::parse(&self.config.base_url).and_then(|base| base.join(href)) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                tracing::warn!(href, error = %e, "Could not resolve link");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{card, job_url, search_url, DetailPage, ScriptedBackend, SearchPage, Site};
    use crate::types::{COMPANY_NOT_FOUND, POSTING_TIME_NOT_FOUND, REQUIREMENTS_NOT_FOUND};

    async fn run(site: &Site, request: &CrawlRequest) -> Result<CrawlReport, CrawlError> {
        let backend = ScriptedBackend::new(site.clone());
        let primary = site.tab();
        let config = CrawlerConfig::instant();
        PaginationController::new(&backend, &primary, &config)
            .run(request)
            .await
    }

    /// One results page per entry, each listing posted `age` ago.
    fn site_with_pages(pages: &[&[(&str, &str)]]) -> Site {
        let mut site = Site::new();
        for (index, jobs) in pages.iter().enumerate() {
            let number = index as u32 + 1;
            let mut page = SearchPage::default();
            for (id, age) in *jobs {
                page.cards.push(card(id));
                site = site.with_detail(
                    &job_url(id),
                    DetailPage::complete("Analyst", "Acme", "SQL", &format!("Posted {age}")),
                );
            }
            if index + 1 < pages.len() {
                page = page.with_control(number + 1, true);
            }
            site = site.with_search(&search_url(number), page);
        }
        site
    }

    fn ids(report: &CrawlReport) -> Vec<&str> {
        report.jobs.iter().map(|j| j.job_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_job_limit_stops_before_next_card() {
        let jobs: Vec<(String, &str)> = (1..=8).map(|i| (i.to_string(), "1h ago")).collect();
        let jobs: Vec<(&str, &str)> = jobs.iter().map(|(id, age)| (id.as_str(), *age)).collect();
        let site = site_with_pages(&[jobs.as_slice()]);

        let request = CrawlRequest::new(search_url(1)).with_num_jobs(5);
        let report = run(&site, &request).await.unwrap();

        assert_eq!(ids(&report), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(report.stop_reason, StopReason::ReachedJobLimit);
        assert!(!site.navigated_to(&job_url("6")));
        assert_eq!(site.count("open_tab"), 5);
    }

    #[tokio::test]
    async fn test_page_limit_never_visits_third_page() {
        let site = site_with_pages(&[
            &[("1", "1h ago")],
            &[("2", "2h ago")],
            &[("3", "3h ago")],
        ]);

        let request = CrawlRequest::new(search_url(1)).with_max_pages(2);
        let report = run(&site, &request).await.unwrap();

        assert_eq!(ids(&report), vec!["1", "2"]);
        assert_eq!(report.stop_reason, StopReason::ReachedPageLimit);
        assert_eq!(report.pages_visited, 2);
        assert!(site.navigated_to(&search_url(2)));
        assert!(!site.navigated_to(&search_url(3)));
    }

    #[tokio::test]
    async fn test_page_limit_wins_when_both_limits_met_on_last_page() {
        let site = site_with_pages(&[&[("1", "1h ago")], &[("2", "1h ago")]]);

        let request = CrawlRequest::new(search_url(1))
            .with_num_jobs(1)
            .with_max_pages(1);
        let report = run(&site, &request).await.unwrap();

        assert_eq!(ids(&report), vec!["1"]);
        assert_eq!(report.stop_reason, StopReason::ReachedPageLimit);
        assert!(!site.navigated_to(&search_url(2)));
    }

    #[tokio::test]
    async fn test_met_job_limit_still_advances_to_next_page() {
        let site = site_with_pages(&[&[("1", "1h ago")], &[("2", "1h ago")]]);

        let request = CrawlRequest::new(search_url(1)).with_num_jobs(1);
        let report = run(&site, &request).await.unwrap();

        assert_eq!(ids(&report), vec!["1"]);
        assert_eq!(report.stop_reason, StopReason::ReachedJobLimit);
        assert_eq!(report.pages_visited, 2);
        assert!(site.navigated_to(&search_url(2)));
        assert!(!site.navigated_to(&job_url("2")));
    }

    #[tokio::test]
    async fn test_partial_listing_is_retained() {
        let site = Site::new()
            .with_search(&search_url(1), SearchPage::with_cards(&["42"]))
            .with_detail(
                &job_url("42"),
                DetailPage {
                    title: Some("Senior Data Analyst".to_string()),
                    ..DetailPage::default()
                },
            );

        let report = run(&site, &CrawlRequest::new(search_url(1))).await.unwrap();

        assert_eq!(report.jobs.len(), 1);
        let job = &report.jobs[0];
        assert_eq!(job.title, "Senior Data Analyst");
        assert_eq!(job.company, COMPANY_NOT_FOUND);
        assert_eq!(job.requirements, REQUIREMENTS_NOT_FOUND);
        assert_eq!(job.posting_time, POSTING_TIME_NOT_FOUND);
        assert_eq!(report.stop_reason, StopReason::NoMoreCards);
    }

    #[tokio::test]
    async fn test_recency_miss_stops_whole_crawl() {
        let site = site_with_pages(&[
            &[("1", "1h ago"), ("2", "5h ago"), ("3", "3d ago"), ("4", "2h ago")],
            &[("5", "1h ago")],
        ]);

        let request = CrawlRequest::new(search_url(1)).with_posted_time_limit("1d ago");
        let report = run(&site, &request).await.unwrap();

        assert_eq!(ids(&report), vec!["1", "2"]);
        assert_eq!(report.stop_reason, StopReason::ExceededRecencyLimit);
        assert!(!site.navigated_to(&job_url("4")));
        assert!(!site.navigated_to(&search_url(2)));
    }

    #[tokio::test]
    async fn test_recency_boundary_is_inclusive() {
        let site = site_with_pages(&[&[("1", "24h ago"), ("2", "25h ago")]]);

        let request = CrawlRequest::new(search_url(1)).with_posted_time_limit("1d ago");
        let report = run(&site, &request).await.unwrap();

        assert_eq!(ids(&report), vec!["1"]);
        assert_eq!(report.stop_reason, StopReason::ExceededRecencyLimit);
    }

    #[tokio::test]
    async fn test_walks_all_pages_without_limits() {
        let site = site_with_pages(&[
            &[("1", "1h ago"), ("2", "1h ago")],
            &[("3", "1d ago")],
            &[("4", "9d ago")],
        ]);

        let report = run(&site, &CrawlRequest::new(search_url(1))).await.unwrap();

        assert_eq!(ids(&report), vec!["1", "2", "3", "4"]);
        assert_eq!(report.stop_reason, StopReason::NoMoreCards);
        assert_eq!(report.pages_visited, 3);
    }

    #[tokio::test]
    async fn test_card_without_link_is_skipped_and_not_counted() {
        let mut page = SearchPage::with_cards(&["1"]);
        page.cards.push(None);
        page.cards.push(card("2"));
        page.cards.push(card("3"));
        let site = Site::new()
            .with_search(&search_url(1), page)
            .with_detail(&job_url("1"), DetailPage::complete("A", "B", "C", "Posted 1h ago"))
            .with_detail(&job_url("2"), DetailPage::complete("A", "B", "C", "Posted 1h ago"))
            .with_detail(&job_url("3"), DetailPage::complete("A", "B", "C", "Posted 1h ago"));

        let request = CrawlRequest::new(search_url(1)).with_num_jobs(2);
        let report = run(&site, &request).await.unwrap();

        assert_eq!(ids(&report), vec!["1", "2"]);
        assert_eq!(report.stop_reason, StopReason::ReachedJobLimit);
    }

    #[tokio::test]
    async fn test_flaky_listing_is_retried() {
        let site = site_with_pages(&[&[("1", "1h ago"), ("2", "1h ago")]]);
        site.fail_navigation(&job_url("1"), 2);

        let report = run(&site, &CrawlRequest::new(search_url(1))).await.unwrap();

        assert_eq!(ids(&report), vec!["1", "2"]);
        assert_eq!(site.count(&format!("navigate {}", job_url("1"))), 3);
        assert_eq!(site.count("open_tab"), site.count("close_tab"));
    }

    #[tokio::test]
    async fn test_failing_listing_is_skipped_after_three_attempts() {
        let site = site_with_pages(&[&[("1", "1h ago"), ("2", "1h ago")]]);
        site.fail_navigation(&job_url("1"), 10);

        let report = run(&site, &CrawlRequest::new(search_url(1))).await.unwrap();

        assert_eq!(ids(&report), vec!["2"]);
        assert_eq!(site.count(&format!("navigate {}", job_url("1"))), 3);
    }

    #[tokio::test]
    async fn test_first_page_retried_then_fatal() {
        let site = site_with_pages(&[&[("1", "1h ago")]]);
        site.fail_navigation(&search_url(1), 3);

        let err = run(&site, &CrawlRequest::new(search_url(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, CrawlError::InitialPageLoad { attempts: 3, .. }));
        assert_eq!(site.count("open_tab"), 0);
    }

    #[tokio::test]
    async fn test_first_page_recovers_on_retry() {
        let site = site_with_pages(&[&[("1", "1h ago")]]);
        site.fail_navigation(&search_url(1), 2);

        let report = run(&site, &CrawlRequest::new(search_url(1))).await.unwrap();
        assert_eq!(ids(&report), vec!["1"]);
    }

    #[tokio::test]
    async fn test_next_page_failure_is_graceful() {
        let site = site_with_pages(&[&[("1", "1h ago")], &[("2", "1h ago")]]);
        site.fail_navigation(&search_url(2), 1);

        let report = run(&site, &CrawlRequest::new(search_url(1))).await.unwrap();

        assert_eq!(ids(&report), vec!["1"]);
        assert_eq!(report.stop_reason, StopReason::NavigationFailed);
        assert_eq!(report.pages_visited, 1);
        assert_eq!(site.count(&format!("navigate {}", search_url(2))), 1);
    }

    #[tokio::test]
    async fn test_hidden_next_control_ends_crawl() {
        let site = Site::new()
            .with_search(
                &search_url(1),
                SearchPage::with_cards(&["1"]).with_control(2, false),
            )
            .with_search(&search_url(2), SearchPage::with_cards(&["2"]))
            .with_detail(&job_url("1"), DetailPage::complete("A", "B", "C", "Posted 1h ago"))
            .with_detail(&job_url("2"), DetailPage::complete("A", "B", "C", "Posted 1h ago"));

        let report = run(&site, &CrawlRequest::new(search_url(1))).await.unwrap();

        assert_eq!(report.stop_reason, StopReason::NoMoreCards);
        assert!(!site.navigated_to(&search_url(2)));
    }

    #[tokio::test]
    async fn test_listings_open_one_at_a_time() {
        let site = site_with_pages(&[&[("1", "1h ago"), ("2", "1h ago"), ("3", "1h ago")]]);

        run(&site, &CrawlRequest::new(search_url(1))).await.unwrap();

        let tabs: Vec<String> = site
            .events()
            .into_iter()
            .filter(|e| e == "open_tab" || e == "close_tab")
            .collect();
        assert_eq!(
            tabs,
            vec!["open_tab", "close_tab", "open_tab", "close_tab", "open_tab", "close_tab"]
        );
    }
}
