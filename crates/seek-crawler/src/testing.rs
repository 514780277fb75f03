//! Scripted in-memory site and session backend for tests.
//!
//! A [`Site`] holds search result pages and listing detail pages keyed by
//! absolute URL and records every navigation, tab and lifecycle call so tests
//! can assert on ordering.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Selectors;
use crate::error::RenderError;
use crate::render::{BrowsingContext, ElementState, LoadState, RenderSurface};
use crate::scroll::SCROLL_HEIGHT_SCRIPT;
use crate::session::{BackendFactory, SessionBackend, Stage};

pub const BASE: &str = "https://www.seek.com.au";

const SEARCH_PATH: &str = "/data-analyst-jobs";

pub fn job_url(id: &str) -> String {
    format!("{BASE}/job/{id}")
}

pub fn search_url(page: u32) -> String {
    format!("{BASE}{SEARCH_PATH}?page={page}")
}

/// Card href for listing `id`.
pub fn card(id: &str) -> Option<String> {
    Some(format!("/job/{id}"))
}

#[derive(Debug, Clone)]
pub struct PageControl {
    pub page: u32,
    pub href: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Card hrefs; `None` is a card without a link.
    pub cards: Vec<Option<String>>,
    pub controls: Vec<PageControl>,
}

impl SearchPage {
    pub fn with_cards(ids: &[&str]) -> Self {
        Self {
            cards: ids.iter().map(|id| card(id)).collect(),
            controls: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_control(mut self, page: u32, visible: bool) -> Self {
        self.controls.push(PageControl {
            page,
            href: format!("{SEARCH_PATH}?page={page}"),
            visible,
        });
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct DetailPage {
    pub title: Option<String>,
    pub company: Option<String>,
    pub requirements: Option<String>,
    /// Texts of the posting-time candidates.
    pub posted: Vec<String>,
}

impl DetailPage {
    pub fn complete(title: &str, company: &str, requirements: &str, posted: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            company: Some(company.to_string()),
            requirements: Some(requirements.to_string()),
            posted: vec![posted.to_string()],
        }
    }
}

#[derive(Default)]
struct SiteInner {
    search: HashMap<String, SearchPage>,
    details: HashMap<String, DetailPage>,
    nav_failures: HashMap<String, u32>,
    events: Vec<String>,
}

/// Shared scripted site.
#[derive(Clone, Default)]
pub struct Site {
    inner: Arc<Mutex<SiteInner>>,
    selectors: Selectors,
}

impl Site {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_search(self, url: &str, page: SearchPage) -> Self {
        self.lock().search.insert(url.to_string(), page);
        self
    }

    #[must_use]
    pub fn with_detail(self, url: &str, page: DetailPage) -> Self {
        self.lock().details.insert(url.to_string(), page);
        self
    }

    /// Make the next `times` navigations to `url` fail.
    pub fn fail_navigation(&self, url: &str, times: u32) {
        self.lock().nav_failures.insert(url.to_string(), times);
    }

    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.lock().events.iter().filter(|e| *e == event).count()
    }

    pub fn navigated_to(&self, url: &str) -> bool {
        self.count(&format!("navigate {url}")) > 0
    }

    /// A tab that is not tracked as opened through a context.
    pub fn tab(&self) -> FakeTab {
        FakeTab {
            site: self.clone(),
            current: Mutex::new(None),
            heights: Mutex::new(VecDeque::new()),
        }
    }

    fn record(&self, event: impl Into<String>) {
        self.lock().events.push(event.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SiteInner> {
        self.inner.lock().unwrap()
    }
}

#[derive(Debug, Clone)]
pub enum FakeElement {
    Card(Option<String>),
    Anchor(String),
    Text(String),
    Control { href: String, visible: bool },
}

pub struct FakeTab {
    site: Site,
    current: Mutex<Option<String>>,
    heights: Mutex<VecDeque<u64>>,
}

impl FakeTab {
    /// Scroll heights reported by successive measurements; the last repeats.
    pub fn set_heights(&self, heights: &[u64]) {
        *self.heights.lock().unwrap() = heights.iter().copied().collect();
    }

    fn next_height(&self) -> u64 {
        let mut heights = self.heights.lock().unwrap();
        if heights.len() > 1 {
            heights.pop_front().unwrap_or(1000)
        } else {
            heights.front().copied().unwrap_or(1000)
        }
    }

    fn elements(&self, selector: &str) -> Vec<FakeElement> {
        let Some(url) = self.current.lock().unwrap().clone() else {
            return Vec::new();
        };
        let inner = self.site.lock();
        let selectors = &self.site.selectors;

        if let Some(page) = inner.search.get(&url) {
            if selector == selectors.job_card {
                return page.cards.iter().cloned().map(FakeElement::Card).collect();
            }
            return page
                .controls
                .iter()
                .filter(|c| selectors.page_link(c.page) == selector)
                .map(|c| FakeElement::Control {
                    href: c.href.clone(),
                    visible: c.visible,
                })
                .collect();
        }

        if let Some(page) = inner.details.get(&url) {
            let single = |field: &Option<String>| {
                field.iter().cloned().map(FakeElement::Text).collect::<Vec<_>>()
            };
            if selector == selectors.title {
                return single(&page.title);
            }
            if selector == selectors.company {
                return single(&page.company);
            }
            if selector == selectors.requirements {
                return single(&page.requirements);
            }
            if selector == selectors.posting_time {
                return page.posted.iter().cloned().map(FakeElement::Text).collect();
            }
        }

        Vec::new()
    }
}

#[async_trait]
impl RenderSurface for FakeTab {
    type Element = FakeElement;

    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), RenderError> {
        self.site.record(format!("navigate {url}"));
        {
            let mut inner = self.site.lock();
            if let Some(remaining) = inner.nav_failures.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(RenderError::Navigation {
                        url: url.to_string(),
                        message: "net::ERR_CONNECTION_RESET".to_string(),
                    });
                }
            }
            if !inner.search.contains_key(url) && !inner.details.contains_key(url) {
                return Err(RenderError::Navigation {
                    url: url.to_string(),
                    message: "404".to_string(),
                });
            }
        }
        *self.current.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_load(&self, state: LoadState, timeout: Duration) -> Result<(), RenderError> {
        if self.current.lock().unwrap().is_some() {
            Ok(())
        } else {
            Err(RenderError::Timeout {
                what: format!("load state {state:?}"),
                after: timeout,
            })
        }
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
        state: ElementState,
    ) -> Result<(), RenderError> {
        let matched = self.elements(selector).iter().any(|e| match state {
            ElementState::Attached => true,
            ElementState::Visible => !matches!(e, FakeElement::Control { visible: false, .. }),
        });
        if matched {
            Ok(())
        } else {
            Err(RenderError::Timeout {
                what: format!("selector {selector}"),
                after: timeout,
            })
        }
    }

    async fn locate_all(&self, selector: &str) -> Result<Vec<FakeElement>, RenderError> {
        Ok(self.elements(selector))
    }

    async fn locate_within(
        &self,
        parent: &FakeElement,
        _selector: &str,
    ) -> Result<Option<FakeElement>, RenderError> {
        Ok(match parent {
            FakeElement::Card(Some(href)) => Some(FakeElement::Anchor(href.clone())),
            _ => None,
        })
    }

    async fn inner_text(&self, element: &FakeElement) -> Result<String, RenderError> {
        match element {
            FakeElement::Text(text) => Ok(text.clone()),
            other => Err(RenderError::Backend(format!("no text on {other:?}"))),
        }
    }

    async fn get_attribute(
        &self,
        element: &FakeElement,
        name: &str,
    ) -> Result<Option<String>, RenderError> {
        Ok(match (element, name) {
            (FakeElement::Anchor(href) | FakeElement::Control { href, .. }, "href") => {
                Some(href.clone())
            }
            _ => None,
        })
    }

    async fn is_visible(&self, element: &FakeElement) -> Result<bool, RenderError> {
        Ok(!matches!(element, FakeElement::Control { visible: false, .. }))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, RenderError> {
        if script == SCROLL_HEIGHT_SCRIPT {
            return Ok(serde_json::Value::from(self.next_height()));
        }
        Ok(serde_json::Value::Null)
    }
}

/// Session backend over a [`Site`].
pub struct ScriptedBackend {
    site: Site,
    fail_at: Option<Stage>,
}

impl ScriptedBackend {
    pub fn new(site: Site) -> Self {
        Self {
            site,
            fail_at: None,
        }
    }

    #[must_use]
    pub fn failing_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    fn step(&self, event: &str, stage: Stage) -> Result<(), RenderError> {
        self.site.record(event);
        if self.fail_at == Some(stage) {
            Err(RenderError::Backend(format!("{event} failed")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BrowsingContext for ScriptedBackend {
    type Tab = FakeTab;

    async fn open_tab(&self) -> Result<FakeTab, RenderError> {
        self.step("open_tab", Stage::Page)?;
        Ok(self.site.tab())
    }

    async fn close_tab(&self, _tab: FakeTab) -> Result<(), RenderError> {
        self.site.record("close_tab");
        Ok(())
    }
}

#[async_trait]
impl SessionBackend for ScriptedBackend {
    async fn start_runtime(&mut self) -> Result<(), RenderError> {
        self.step("start_runtime", Stage::Runtime)
    }

    async fn launch_browser(&mut self) -> Result<(), RenderError> {
        self.step("launch_browser", Stage::Browser)
    }

    async fn open_context(&mut self) -> Result<(), RenderError> {
        self.step("open_context", Stage::Context)
    }

    async fn close_context(&mut self) -> Result<(), RenderError> {
        self.site.record("close_context");
        Ok(())
    }

    async fn close_browser(&mut self) -> Result<(), RenderError> {
        self.site.record("close_browser");
        Ok(())
    }

    async fn stop_runtime(&mut self) -> Result<(), RenderError> {
        self.site.record("stop_runtime");
        Ok(())
    }
}

/// Hands out [`ScriptedBackend`]s over one shared site.
#[derive(Clone)]
pub struct ScriptedFactory {
    pub site: Site,
}

impl BackendFactory for ScriptedFactory {
    type Backend = ScriptedBackend;

    fn create(&self) -> ScriptedBackend {
        ScriptedBackend::new(self.site.clone())
    }
}
