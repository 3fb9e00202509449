//! OrangeHRM E2E Test Suite
//!
//! This crate drives the OrangeHRM web application through Playwright to
//! verify the Admin → User Management workflow:
//! - Controls a long-lived Playwright driver over a JSON-lines protocol
//! - Wraps the login and admin screens in page objects
//! - Waits on page conditions instead of fixed delays
//! - Generates collision-free usernames and shares them through test data
//! - Deletes any user a failed run leaves behind
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── wait_for_reachable(base_url)                         │
//! │    ├── Launcher::launch() -> impl BrowserSession            │
//! │    ├── execute_scenario(page, scenario) -> ScenarioRun      │
//! │    └── cleanup_created_user(page, data)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page objects                                               │
//! │    ├── LoginPage { goto, login }                            │
//! │    └── AdminPage { navigate_to_admin, add_user,             │
//! │                    search_user, edit_user, delete_user }    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── name, tags, only, timeout_ms                         │
//! │    └── steps: [login | navigate_to_admin | add_user |       │
//! │               search_user | edit_user | delete_user]        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod expect;
pub mod health;
pub mod locator;
pub mod page;
pub mod pages;
pub mod playwright;
pub mod runner;
pub mod scenario;
pub mod testdata;
pub mod testing;
pub mod username;

pub use config::SuiteConfig;
pub use error::{E2eError, E2eResult};
pub use page::{BrowserSession, Page, Timeouts};
pub use pages::{AdminPage, LoginPage, NewUser, RoleChoice};
pub use runner::{TestRunner, TestSuiteResult};
pub use scenario::{Scenario, ScenarioStep};
pub use testdata::TestData;
pub use username::UsernameGenerator;
