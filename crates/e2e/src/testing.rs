//! In-memory [`Page`] for exercising page objects without a browser
//!
//! A `ScriptedPage` records every interaction and answers queries from text
//! and URL state that tests set up front or attach to clicks as effects.
//! Clones share that state, so a test keeps a handle on a page it hands to
//! a [`ScriptedLauncher`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::page::{BrowserSession, Page, WaitState};
use crate::playwright::{Launcher, PlaywrightConfig};

/// An interaction performed against the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Goto(String),
    Click(String),
    Fill(String, String),
    WaitFor(String, WaitState),
    Screenshot(PathBuf),
    TracingStart,
    TracingStop(Option<PathBuf>),
    Close,
}

/// What clicking an element does to the page
#[derive(Debug, Clone)]
pub enum Effect {
    Navigate(String),
    SetText(Locator, String),
}

#[derive(Debug, Default)]
struct State {
    url: String,
    texts: HashMap<String, String>,
    missing: HashSet<String>,
    reactions: HashMap<String, Vec<(Option<usize>, Effect)>>,
    clicks: HashMap<String, usize>,
    calls: Vec<Call>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    state: Arc<Mutex<State>>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().url = url.to_string();
    }

    pub fn set_text(&self, locator: &Locator, text: &str) {
        self.state.lock().texts.insert(locator.to_string(), text.to_string());
    }

    /// Make the element absent: waits and interactions on it time out
    pub fn mark_missing(&self, locator: &Locator) {
        self.state.lock().missing.insert(locator.to_string());
    }

    /// Apply `effect` on every click of `locator`
    pub fn on_click(&self, locator: &Locator, effect: Effect) {
        self.react(locator, None, effect);
    }

    /// Apply `effect` only on the `nth` click (1-based) of `locator`
    pub fn on_nth_click(&self, locator: &Locator, nth: usize, effect: Effect) {
        self.react(locator, Some(nth), effect);
    }

    fn react(&self, locator: &Locator, nth: Option<usize>, effect: Effect) {
        self.state
            .lock()
            .reactions
            .entry(locator.to_string())
            .or_default()
            .push((nth, effect));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Value most recently filled into `locator`
    pub fn filled_value(&self, locator: &Locator) -> Option<String> {
        let key = locator.to_string();
        self.state.lock().calls.iter().rev().find_map(|c| match c {
            Call::Fill(l, v) if *l == key => Some(v.clone()),
            _ => None,
        })
    }

    pub fn was_clicked(&self, locator: &Locator) -> bool {
        let key = Call::Click(locator.to_string());
        self.state.lock().calls.contains(&key)
    }

    fn ensure_present(state: &State, key: &str) -> E2eResult<()> {
        if state.missing.contains(key) {
            return Err(E2eError::Timeout(key.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Page for ScriptedPage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Goto(url.to_string()));
        state.url = url.to_string();
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        let key = locator.to_string();
        let mut state = self.state.lock();
        Self::ensure_present(&state, &key)?;
        state.calls.push(Call::Click(key.clone()));

        let clicks = state.clicks.entry(key.clone()).or_insert(0);
        *clicks += 1;
        let nth = *clicks;

        let effects: Vec<Effect> = state
            .reactions
            .get(&key)
            .map(|rs| {
                rs.iter()
                    .filter(|(when, _)| when.map_or(true, |n| n == nth))
                    .map(|(_, e)| e.clone())
                    .collect()
            })
            .unwrap_or_default();
        for effect in effects {
            match effect {
                Effect::Navigate(url) => state.url = url,
                Effect::SetText(target, text) => {
                    state.texts.insert(target.to_string(), text);
                }
            }
        }
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        let key = locator.to_string();
        let mut state = self.state.lock();
        Self::ensure_present(&state, &key)?;
        state.calls.push(Call::Fill(key, value.to_string()));
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, state: WaitState, _timeout: Duration) -> E2eResult<()> {
        let key = locator.to_string();
        let mut guard = self.state.lock();
        guard.calls.push(Call::WaitFor(key.clone(), state));
        match state {
            WaitState::Visible => Self::ensure_present(&guard, &key),
            WaitState::Hidden => Ok(()),
        }
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>> {
        let key = locator.to_string();
        let state = self.state.lock();
        if state.missing.contains(&key) {
            return Ok(None);
        }
        Ok(state.texts.get(&key).cloned())
    }

    async fn url(&self) -> E2eResult<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        self.state.lock().calls.push(Call::Screenshot(path.to_path_buf()));
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ScriptedPage {
    async fn start_tracing(&self) -> E2eResult<()> {
        self.state.lock().calls.push(Call::TracingStart);
        Ok(())
    }

    async fn stop_tracing(&self, path: Option<&Path>) -> E2eResult<()> {
        self.state
            .lock()
            .calls
            .push(Call::TracingStop(path.map(Path::to_path_buf)));
        Ok(())
    }

    async fn close(self) -> E2eResult<()> {
        self.state.lock().calls.push(Call::Close);
        Ok(())
    }
}

/// Hands out prepared pages in order, one per launch
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    pages: Mutex<VecDeque<ScriptedPage>>,
    launched: Mutex<Vec<PlaywrightConfig>>,
}

impl ScriptedLauncher {
    pub fn new(pages: impl IntoIterator<Item = ScriptedPage>) -> Self {
        Self {
            pages: Mutex::new(pages.into_iter().collect()),
            launched: Mutex::new(Vec::new()),
        }
    }

    /// Browser settings of every launch so far, including failed ones
    pub fn launched(&self) -> Vec<PlaywrightConfig> {
        self.launched.lock().clone()
    }
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    type Session = ScriptedPage;

    async fn launch(&self, config: PlaywrightConfig) -> E2eResult<ScriptedPage> {
        self.launched.lock().push(config);
        self.pages
            .lock()
            .pop_front()
            .ok_or_else(|| E2eError::Driver("no scripted page left to launch".to_string()))
    }
}
