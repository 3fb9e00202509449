//! Login screen

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::error::E2eResult;
use crate::expect::expect;
use crate::page::{Page, Timeouts};

pub const LOGIN_PATH: &str = "/web/index.php/auth/login";

static DASHBOARD_URL: Lazy<Regex> = Lazy::new(|| Regex::new("dashboard").expect("static pattern"));

pub mod locators {
    use crate::locator::Locator;

    pub fn username_input() -> Locator {
        Locator::css("input[name=\"username\"]")
    }

    pub fn password_input() -> Locator {
        Locator::css("input[name=\"password\"]")
    }

    pub fn submit_button() -> Locator {
        Locator::css("button[type=\"submit\"]")
    }
}

pub struct LoginPage<'a, P: Page + ?Sized> {
    page: &'a P,
    timeouts: Timeouts,
}

impl<'a, P: Page + ?Sized> LoginPage<'a, P> {
    pub fn new(page: &'a P, timeouts: Timeouts) -> Self {
        Self { page, timeouts }
    }

    pub async fn goto(&self) -> E2eResult<()> {
        self.page.goto(LOGIN_PATH).await?;
        expect(self.page, self.timeouts.navigation)
            .to_be_visible(&locators::username_input())
            .await
    }

    /// Submit credentials and wait for the dashboard
    pub async fn login(&self, username: &str, password: &str) -> E2eResult<()> {
        self.page.fill(&locators::username_input(), username).await?;
        self.page.fill(&locators::password_input(), password).await?;
        self.page.click(&locators::submit_button()).await?;
        expect(self.page, self.timeouts.navigation)
            .to_have_url(&DASHBOARD_URL)
            .await?;

        info!(username, "logged in");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::E2eError;
    use crate::testing::{Call, Effect, ScriptedPage};
    use std::time::Duration;

    fn fast() -> Timeouts {
        Timeouts {
            action: Duration::from_millis(50),
            navigation: Duration::from_millis(50),
            expect: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_login_flow() {
        let page = ScriptedPage::new();
        page.on_click(
            &locators::submit_button(),
            Effect::Navigate("https://demo.test/web/index.php/dashboard/index".into()),
        );

        let login = LoginPage::new(&page, fast());
        login.goto().await.unwrap();
        login.login("Admin", "admin123").await.unwrap();

        let calls = page.calls();
        assert_eq!(calls[0], Call::Goto(LOGIN_PATH.into()));
        assert_eq!(page.filled_value(&locators::username_input()).as_deref(), Some("Admin"));
        assert_eq!(page.filled_value(&locators::password_input()).as_deref(), Some("admin123"));
        assert!(page.was_clicked(&locators::submit_button()));
    }

    #[tokio::test]
    async fn test_bad_credentials_stay_on_login() {
        let page = ScriptedPage::new();
        let login = LoginPage::new(&page, fast());
        login.goto().await.unwrap();

        let err = login.login("Admin", "wrong").await.unwrap_err();
        assert!(matches!(err, E2eError::AssertionFailed(_)), "{err:?}");
    }
}
