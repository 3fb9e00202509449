//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Target application unreachable: {0}")]
    Environment(String),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Scenario parse error: {0}")]
    SpecParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Scenario '{name}' exceeded its timeout of {timeout_ms} ms")]
    ScenarioTimeout { name: String, timeout_ms: u64 },

    #[error("No test data stored under '{0}'")]
    MissingTestData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Whether the failure came from the page not reaching an expected state
    /// in time, as opposed to reaching a wrong one.
    pub fn is_timeout(&self) -> bool {
        matches!(self, E2eError::Timeout(_) | E2eError::ScenarioTimeout { .. })
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
