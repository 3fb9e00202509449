//! Polling assertions
//!
//! Every assertion re-reads the page until its condition holds or the
//! timeout expires. Running out of time with nothing to observe is reported
//! as [`E2eError::Timeout`]; running out of time while observing the wrong
//! value is [`E2eError::AssertionFailed`] carrying the last value seen.

use std::time::Duration;

use regex::Regex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::page::{Page, WaitState};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Expect<'a, P: Page + ?Sized> {
    page: &'a P,
    timeout: Duration,
}

pub fn expect<P: Page + ?Sized>(page: &P, timeout: Duration) -> Expect<'_, P> {
    Expect { page, timeout }
}

impl<'a, P: Page + ?Sized> Expect<'a, P> {
    /// Wait for the current URL to match `pattern`, returning it
    pub async fn to_have_url(&self, pattern: &Regex) -> E2eResult<String> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let url = self.page.url().await?;
            if pattern.is_match(&url) {
                return Ok(url);
            }
            if Instant::now() >= deadline {
                return Err(E2eError::AssertionFailed(format!(
                    "expected URL matching /{}/, got {}",
                    pattern.as_str(),
                    url
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait for the element text to equal `expected` (whitespace-normalised)
    pub async fn to_have_text(&self, locator: &Locator, expected: &str) -> E2eResult<()> {
        let expected = normalize_whitespace(expected);
        self.text_matching(locator, &format!("text \"{}\"", expected), |t| t == expected)
            .await
            .map(|_| ())
    }

    /// Wait for the element text to contain `expected`
    pub async fn to_contain_text(&self, locator: &Locator, expected: &str) -> E2eResult<()> {
        let expected = normalize_whitespace(expected);
        self.text_matching(locator, &format!("text containing \"{}\"", expected), |t| {
            t.contains(&expected)
        })
        .await
        .map(|_| ())
    }

    pub async fn to_be_visible(&self, locator: &Locator) -> E2eResult<()> {
        self.page.wait_for(locator, WaitState::Visible, self.timeout).await
    }

    /// Wait for the element text to satisfy `pred`, returning the text seen
    pub async fn text_matching<F>(&self, locator: &Locator, description: &str, mut pred: F) -> E2eResult<String>
    where
        F: FnMut(&str) -> bool + Send,
    {
        let deadline = Instant::now() + self.timeout;
        let mut last: Option<String> = None;

        loop {
            if let Some(raw) = self.page.text_content(locator).await? {
                let text = normalize_whitespace(&raw);
                if pred(&text) {
                    return Ok(text);
                }
                if last.as_deref() != Some(text.as_str()) {
                    debug!(locator = %locator, text = %text, "waiting for {}", description);
                }
                last = Some(text);
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(POLL_INTERVAL).await;
        }

        match last {
            Some(actual) => Err(E2eError::AssertionFailed(format!(
                "{}: expected {}, got \"{}\"",
                locator, description, actual
            ))),
            None => Err(E2eError::Timeout(format!("{} ({})", locator, description))),
        }
    }
}

/// Collapse runs of whitespace and trim, the way Playwright compares text
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPage;

    // Tests run on a paused clock, so these timeouts cost no wall time
    const TIMEOUT: Duration = Duration::from_secs(5);

    fn label() -> Locator {
        Locator::css("span.count")
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  (1)\n  Record   Found "), "(1) Record Found");
        assert_eq!(normalize_whitespace(""), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_to_have_text_matches_normalised() {
        let page = ScriptedPage::new();
        page.set_text(&label(), "\n (1) Record  Found\n");
        let start = Instant::now();
        expect(&page, TIMEOUT).to_have_text(&label(), "(1) Record Found").await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_to_have_text_mismatch_reports_actual() {
        let page = ScriptedPage::new();
        page.set_text(&label(), "(2) Records Found");

        let start = Instant::now();
        let err = expect(&page, TIMEOUT).to_have_text(&label(), "(1) Record Found").await.unwrap_err();
        assert!(start.elapsed() >= TIMEOUT);
        match err {
            E2eError::AssertionFailed(msg) => assert!(msg.contains("(2) Records Found"), "{msg}"),
            other => panic!("expected assertion failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_element_is_timeout() {
        let page = ScriptedPage::new();
        let err = expect(&page, TIMEOUT).to_contain_text(&label(), "anything").await.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_contain_text() {
        let page = ScriptedPage::new();
        page.set_text(&label(), "Success Successfully Deleted ×");
        expect(&page, TIMEOUT).to_contain_text(&label(), "Successfully Deleted").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_to_have_url() {
        let page = ScriptedPage::new();
        page.set_url("https://example.test/web/index.php/admin/viewSystemUsers");
        let url = expect(&page, TIMEOUT).to_have_url(&Regex::new("admin").unwrap()).await.unwrap();
        assert!(url.ends_with("viewSystemUsers"));

        page.set_url("https://example.test/web/index.php/pim/viewEmployeeList");
        let err = expect(&page, TIMEOUT).to_have_url(&Regex::new("admin").unwrap()).await.unwrap_err();
        assert!(matches!(err, E2eError::AssertionFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_appearing_late() {
        let page = ScriptedPage::new();
        let writer = page.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(2)).await;
            writer.set_text(&label(), "ready");
        });

        let start = Instant::now();
        expect(&page, TIMEOUT).to_have_text(&label(), "ready").await.unwrap();
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(2), "{waited:?}");
        assert!(waited < Duration::from_secs(2) + POLL_INTERVAL * 2, "{waited:?}");
    }
}
