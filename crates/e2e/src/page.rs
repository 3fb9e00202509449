//! The browser page seam
//!
//! Page objects and assertions only talk to a [`Page`]; the runner owns each
//! page as a [`BrowserSession`]. The production implementation is
//! [`crate::playwright::PlaywrightHandle`]; [`crate::testing::ScriptedPage`]
//! stands in for it in browser-free tests.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;
use crate::locator::Locator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
}

#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to a path relative to the base URL (or an absolute URL)
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn click(&self, locator: &Locator) -> E2eResult<()>;

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()>;

    /// Wait until the element reaches `state`, failing with a timeout error
    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()>;

    /// Text of the first match, `None` when nothing matches right now
    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>>;

    async fn url(&self) -> E2eResult<String>;

    async fn screenshot(&self, path: &Path) -> E2eResult<()>;
}

/// A page backed by its own browser, which the runner records and shuts down
#[async_trait]
pub trait BrowserSession: Page {
    async fn start_tracing(&self) -> E2eResult<()>;

    /// Stop tracing, saving the trace to `path` or discarding it
    async fn stop_tracing(&self, path: Option<&Path>) -> E2eResult<()>;

    async fn close(self) -> E2eResult<()>;
}

/// Timeouts applied by page objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Upper bound for a single interaction
    pub action: Duration,
    /// Upper bound for page navigations
    pub navigation: Duration,
    /// Upper bound for polling assertions
    pub expect: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            action: Duration::from_secs(60),
            navigation: Duration::from_secs(60),
            expect: Duration::from_secs(10),
        }
    }
}
