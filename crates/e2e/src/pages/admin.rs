//! Admin → User Management screen
//!
//! Every operation waits on a concrete page condition (an option becoming
//! visible, a toast appearing, a label settling) rather than sleeping, and
//! dropdown options are picked by their visible label.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::E2eResult;
use crate::expect::expect;
use crate::locator::Locator;
use crate::page::{Page, Timeouts, WaitState};
use crate::testdata::{TestData, LAST_CREATED_USERNAME};
use crate::username::UsernameGenerator;

pub const USERS_PATH: &str = "/web/index.php/admin/viewSystemUsers";

pub const ONE_RECORD_FOUND: &str = "(1) Record Found";
pub const NO_RECORDS_FOUND: &str = "No Records Found";
pub const SAVED_TOAST: &str = "Successfully Saved";
pub const UPDATED_TOAST: &str = "Successfully Updated";
pub const DELETED_TOAST: &str = "Successfully Deleted";

static ADMIN_URL: Lazy<Regex> = Lazy::new(|| Regex::new("admin").expect("static pattern"));

pub mod locators {
    use crate::locator::Locator;

    pub fn admin_link() -> Locator {
        Locator::role("link", "Admin")
    }

    pub fn add_button() -> Locator {
        Locator::role("button", "Add")
    }

    /// The `index`-th (1-based) custom select on the form
    pub fn select_input(index: usize) -> Locator {
        Locator::xpath(&format!("(//div[@class=\"oxd-select-text-input\"])[{}]", index))
    }

    pub fn select_option(label: &str) -> Locator {
        Locator::css("div[role=\"listbox\"] div[role=\"option\"]")
            .has_text(label)
            .first()
    }

    pub fn first_select_option() -> Locator {
        Locator::xpath("//div[@class=\"oxd-select-option\"]/span").first()
    }

    pub fn employee_hint_input() -> Locator {
        Locator::placeholder("Type for hints...")
    }

    pub fn employee_suggestion(hint: &str) -> Locator {
        Locator::css("div.oxd-autocomplete-option").has_text(hint).first()
    }

    pub fn username_input() -> Locator {
        Locator::xpath("(//input[@autocomplete=\"off\"])[1]")
    }

    pub fn password_input() -> Locator {
        Locator::css("input[type=\"password\"]").first()
    }

    pub fn confirm_password_input() -> Locator {
        Locator::css("input[type=\"password\"]").last()
    }

    pub fn submit_button() -> Locator {
        Locator::xpath("//button[@type=\"submit\"]")
    }

    pub fn toast() -> Locator {
        Locator::css("div.oxd-toast")
    }

    pub fn search_username_input() -> Locator {
        Locator::xpath("//div[@class=\"oxd-form-row\"]//input[@class=\"oxd-input oxd-input--active\"]")
    }

    pub fn record_count_label() -> Locator {
        Locator::xpath(
            "//div[@class=\"orangehrm-horizontal-padding orangehrm-vertical-padding\"]/span",
        )
    }

    pub fn edit_icon() -> Locator {
        Locator::xpath("//i[@class=\"oxd-icon bi-pencil-fill\"]")
    }

    /// Selection checkbox of the table row listing `username`
    pub fn row_checkbox(username: &str) -> Locator {
        Locator::xpath(&format!(
            "//div[contains(@class,\"oxd-table-card\")][.//div[normalize-space()=\"{}\"]]//*[contains(@class,\"oxd-checkbox-input\")]",
            username
        ))
    }

    pub fn delete_selected_button() -> Locator {
        Locator::css("button:has-text(\"Delete Selected\")")
    }

    pub fn confirm_delete_button() -> Locator {
        Locator::css("button:has-text(\"Yes, Delete\")")
    }
}

/// Details of a system user to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub employee_name: String,
    pub password: String,

    #[serde(default = "default_role")]
    pub role: String,

    #[serde(default = "default_status")]
    pub status: String,

    /// Text typed into the employee autocomplete
    #[serde(default)]
    pub employee_hint: Option<String>,
}

fn default_role() -> String {
    "Admin".to_string()
}

fn default_status() -> String {
    "Enabled".to_string()
}

impl NewUser {
    pub fn new(employee_name: &str, password: &str) -> Self {
        Self {
            employee_name: employee_name.to_string(),
            password: password.to_string(),
            role: default_role(),
            status: default_status(),
            employee_hint: None,
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn with_employee_hint(mut self, hint: &str) -> Self {
        self.employee_hint = Some(hint.to_string());
        self
    }

    /// Explicit hint, else the last word of the employee name
    pub fn hint(&self) -> &str {
        match &self.employee_hint {
            Some(hint) => hint.as_str(),
            None => self
                .employee_name
                .split_whitespace()
                .last()
                .unwrap_or(self.employee_name.as_str()),
        }
    }
}

/// Which role the edit form switches to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoleChoice {
    /// Whatever option the dropdown lists first
    #[default]
    FirstListed,
    Label(String),
}

impl From<Option<String>> for RoleChoice {
    fn from(label: Option<String>) -> Self {
        label.map_or(RoleChoice::FirstListed, RoleChoice::Label)
    }
}

pub struct AdminPage<'a, P: Page + ?Sized> {
    page: &'a P,
    data: &'a TestData,
    timeouts: Timeouts,
}

impl<'a, P: Page + ?Sized> AdminPage<'a, P> {
    pub fn new(page: &'a P, data: &'a TestData, timeouts: Timeouts) -> Self {
        Self {
            page,
            data,
            timeouts,
        }
    }

    pub async fn navigate_to_admin(&self) -> E2eResult<()> {
        self.page.click(&locators::admin_link()).await?;
        let url = expect(self.page, self.timeouts.navigation)
            .to_have_url(&ADMIN_URL)
            .await?;
        debug!(%url, "on admin screen");
        Ok(())
    }

    /// Create a system user, returning the generated username
    pub async fn add_user(&self, user: &NewUser) -> E2eResult<String> {
        self.page.click(&locators::add_button()).await?;
        self.visible(&locators::select_input(1)).await?;

        self.select_by_label(1, &user.role).await?;
        self.select_by_label(2, &user.status).await?;

        let hint = user.hint();
        self.page.fill(&locators::employee_hint_input(), hint).await?;
        let suggestion = locators::employee_suggestion(hint);
        self.visible(&suggestion).await?;
        self.page.click(&suggestion).await?;

        let username = UsernameGenerator::global().generate();
        self.data.set_value(LAST_CREATED_USERNAME, username.clone());

        self.page.fill(&locators::username_input(), &username).await?;
        self.page.fill(&locators::password_input(), &user.password).await?;
        self.page.fill(&locators::confirm_password_input(), &user.password).await?;
        self.page.click(&locators::submit_button()).await?;

        expect(self.page, self.timeouts.expect)
            .to_contain_text(&locators::toast(), SAVED_TOAST)
            .await?;

        info!(%username, employee = %user.employee_name, "created user");
        Ok(username)
    }

    /// Filter the user list by `username` and require exactly one match
    pub async fn search_user(&self, username: &str) -> E2eResult<()> {
        self.search(username).await?;
        expect(self.page, self.timeouts.expect)
            .to_have_text(&locators::record_count_label(), ONE_RECORD_FOUND)
            .await
    }

    /// Change the role of the single listed user
    pub async fn edit_user(&self, role: &RoleChoice) -> E2eResult<()> {
        let edit = locators::edit_icon();
        self.visible(&edit).await?;
        self.page.click(&edit).await?;

        let select = locators::select_input(1);
        self.visible(&select).await?;
        self.page.click(&select).await?;

        let option = match role {
            RoleChoice::FirstListed => locators::first_select_option(),
            RoleChoice::Label(label) => locators::select_option(label),
        };
        self.visible(&option).await?;
        self.page.click(&option).await?;

        self.page.click(&locators::submit_button()).await?;
        expect(self.page, self.timeouts.expect)
            .to_contain_text(&locators::toast(), UPDATED_TOAST)
            .await
    }

    /// Filter the list down to `username` and delete that one row.
    ///
    /// Nothing is ticked unless the search lists exactly one record.
    pub async fn delete_user(&self, username: &str) -> E2eResult<()> {
        self.search_user(username).await?;
        self.delete_listed(username).await
    }

    /// Delete `username` if it still exists. Returns whether a user was deleted.
    pub async fn delete_by_username(&self, username: &str) -> E2eResult<bool> {
        self.page.goto(USERS_PATH).await?;
        self.search(username).await?;

        let label = expect(self.page, self.timeouts.expect)
            .text_matching(
                &locators::record_count_label(),
                "a single record or none",
                |t| t == ONE_RECORD_FOUND || t == NO_RECORDS_FOUND,
            )
            .await?;

        if label == NO_RECORDS_FOUND {
            debug!(%username, "nothing to clean up");
            return Ok(false);
        }

        self.delete_listed(username).await?;
        info!(%username, "deleted leftover user");
        Ok(true)
    }

    async fn delete_listed(&self, username: &str) -> E2eResult<()> {
        self.page.click(&locators::row_checkbox(username)).await?;
        self.page.click(&locators::delete_selected_button()).await?;

        let confirm = locators::confirm_delete_button();
        self.page.click(&confirm).await?;
        self.page
            .wait_for(&confirm, WaitState::Hidden, self.timeouts.action)
            .await?;

        expect(self.page, self.timeouts.expect)
            .to_contain_text(&locators::toast(), DELETED_TOAST)
            .await
    }

    async fn search(&self, username: &str) -> E2eResult<()> {
        let input = locators::search_username_input();
        self.visible(&input).await?;
        self.page.fill(&input, username).await?;
        self.page.click(&locators::submit_button()).await
    }

    async fn select_by_label(&self, index: usize, label: &str) -> E2eResult<()> {
        self.page.click(&locators::select_input(index)).await?;
        let option = locators::select_option(label);
        self.visible(&option).await?;
        self.page.click(&option).await
    }

    async fn visible(&self, locator: &Locator) -> E2eResult<()> {
        expect(self.page, self.timeouts.action).to_be_visible(locator).await
    }
}
