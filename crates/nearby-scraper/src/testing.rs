//! In-memory [`BrowserSession`] stub for exercising the pipeline without a
//! real browser.
//!
//! The stub answers `evaluate` calls by inspecting the script text: result
//! link sweeps pop from a queue of rounds, text and attribute queries are
//! looked up per configured page, everything else yields null. Navigation
//! just switches which configured page is "loaded" in the active tab.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::browser::{BrowserError, BrowserSession, TabHandle};

/// One navigable document the stub can serve.
#[derive(Debug, Default, Clone)]
pub(crate) struct StubPage {
    pub markup: String,
    pub flat_text: String,
    /// `querySelector` text per selector.
    pub selector_text: HashMap<String, String>,
    /// `getAttribute` value per selector.
    pub selector_attr: HashMap<String, String>,
    /// `querySelectorAll` texts per selector.
    pub selector_texts: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
struct StubState {
    pages: HashMap<String, StubPage>,
    default_page: StubPage,
    /// Successive answers to result-link sweeps; the last round repeats once
    /// the queue is drained.
    link_rounds: VecDeque<Vec<String>>,
    last_links: Vec<String>,
    /// Selectors that never appear; `wait_for_selector` times out on these.
    missing_selectors: HashSet<String>,
    /// Maps a navigated URL to the address-bar URL reported afterwards.
    url_overrides: HashMap<String, String>,
    tab_urls: HashMap<TabHandle, String>,
    active: TabHandle,
    next_tab: u32,
    pub navigations: Vec<String>,
    pub closed_tabs: Vec<TabHandle>,
    pub switches: Vec<TabHandle>,
}

pub(crate) struct StubBrowser {
    state: Mutex<StubState>,
}

impl StubBrowser {
    pub fn new() -> Self {
        let mut state = StubState::default();
        state.active = "tab-0".to_owned();
        state.next_tab = 1;
        state.tab_urls.insert("tab-0".to_owned(), String::new());
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_page(self, url: &str, page: StubPage) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(url.to_owned(), page);
        self
    }

    pub fn with_default_page(self, page: StubPage) -> Self {
        self.state.lock().unwrap().default_page = page;
        self
    }

    pub fn with_link_rounds<S: Into<String>>(self, rounds: Vec<Vec<S>>) -> Self {
        self.state.lock().unwrap().link_rounds = rounds
            .into_iter()
            .map(|round| round.into_iter().map(Into::into).collect())
            .collect();
        self
    }

    pub fn with_missing_selector(self, selector: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .missing_selectors
            .insert(selector.to_owned());
        self
    }

    pub fn with_url_override(self, navigated: &str, reported: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .url_overrides
            .insert(navigated.to_owned(), reported.to_owned());
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn closed_tabs(&self) -> Vec<TabHandle> {
        self.state.lock().unwrap().closed_tabs.clone()
    }

    pub fn switches(&self) -> Vec<TabHandle> {
        self.state.lock().unwrap().switches.clone()
    }

    fn page_for(state: &StubState, url: &str) -> StubPage {
        state
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| state.default_page.clone())
    }

    fn active_url(state: &StubState) -> String {
        state
            .tab_urls
            .get(&state.active)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl BrowserSession for StubBrowser {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_owned());
        let reported = state
            .url_overrides
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_owned());
        let active = state.active.clone();
        state.tab_urls.insert(active, reported);
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let mut state = self.state.lock().unwrap();

        if script.contains("/maps/place/") && script.contains("querySelectorAll") {
            if let Some(round) = state.link_rounds.pop_front() {
                state.last_links = round;
            }
            return Ok(Value::Array(
                state
                    .last_links
                    .iter()
                    .map(|l| Value::String(l.clone()))
                    .collect(),
            ));
        }

        let url = Self::active_url(&state);
        let page = Self::page_for(&state, &url);

        if script.contains("innerText") {
            return Ok(Value::String(page.flat_text));
        }

        if script.contains("querySelectorAll") {
            for (selector, texts) in &page.selector_texts {
                if script.contains(selector.as_str()) {
                    return Ok(Value::Array(
                        texts.iter().map(|t| Value::String(t.clone())).collect(),
                    ));
                }
            }
            return Ok(Value::Array(Vec::new()));
        }

        if script.contains("getAttribute") {
            for (selector, value) in &page.selector_attr {
                if script.contains(selector.as_str()) {
                    return Ok(Value::String(value.clone()));
                }
            }
            return Ok(Value::Null);
        }

        if script.contains("querySelector(") {
            for (selector, text) in &page.selector_text {
                if script.contains(selector.as_str()) {
                    return Ok(Value::String(text.clone()));
                }
            }
            return Ok(Value::Null);
        }

        Ok(Value::Null)
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<(), BrowserError> {
        let state = self.state.lock().unwrap();
        if state.missing_selectors.contains(selector) {
            return Err(BrowserError::WaitTimeout {
                condition: selector.to_owned(),
                timeout_ms,
            });
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let state = self.state.lock().unwrap();
        Ok(Self::active_url(&state))
    }

    async fn page_markup(&self) -> Result<String, BrowserError> {
        let state = self.state.lock().unwrap();
        let url = Self::active_url(&state);
        Ok(Self::page_for(&state, &url).markup)
    }

    async fn open_tab(&self) -> Result<TabHandle, BrowserError> {
        let mut state = self.state.lock().unwrap();
        let handle = format!("tab-{}", state.next_tab);
        state.next_tab += 1;
        state.tab_urls.insert(handle.clone(), String::new());
        Ok(handle)
    }

    async fn close_tab(&self, tab: &TabHandle) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        if state.tab_urls.remove(tab).is_none() {
            return Err(BrowserError::Tab(format!("unknown tab {tab}")));
        }
        state.closed_tabs.push(tab.clone());
        Ok(())
    }

    async fn switch_tab(&self, tab: &TabHandle) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        if !state.tab_urls.contains_key(tab) {
            return Err(BrowserError::Tab(format!("unknown tab {tab}")));
        }
        state.active = tab.clone();
        state.switches.push(tab.clone());
        Ok(())
    }

    async fn active_tab(&self) -> Result<TabHandle, BrowserError> {
        Ok(self.state.lock().unwrap().active.clone())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.state.lock().unwrap().tab_urls.clear();
        Ok(())
    }
}
