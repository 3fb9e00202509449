//! Suite configuration
//!
//! Loaded from a TOML file (every field optional) and then adjusted from the
//! environment. The defaults match how the suite runs against the public
//! OrangeHRM demo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::page::Timeouts;
use crate::playwright::{Browser, PlaywrightConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reporter {
    /// One log line per scenario
    #[default]
    List,
    /// `test-results.json` in the output directory, plus the list output
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceMode {
    Off,
    On,
    #[default]
    OnFirstRetry,
    RetainOnFailure,
}

impl TraceMode {
    /// Whether attempt number `attempt` (0 = first run) records a trace
    pub fn records(self, attempt: u32) -> bool {
        match self {
            TraceMode::Off => false,
            TraceMode::On | TraceMode::RetainOnFailure => true,
            TraceMode::OnFirstRetry => attempt == 1,
        }
    }

    /// Whether a recorded trace is written out
    pub fn keeps(self, attempt: u32, failed: bool) -> bool {
        match self {
            TraceMode::RetainOnFailure => failed,
            other => other.records(attempt),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenshotMode {
    Off,
    On,
    #[default]
    OnlyOnFailure,
}

impl ScreenshotMode {
    pub fn captures(self, failed: bool) -> bool {
        match self {
            ScreenshotMode::Off => false,
            ScreenshotMode::On => true,
            ScreenshotMode::OnlyOnFailure => failed,
        }
    }
}

/// A named browser configuration every scenario runs against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub browser: Browser,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            name: "chromium".to_string(),
            browser: Browser::Chromium,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Directory searched for scenario YAML files
    pub test_dir: PathBuf,

    /// Reports, screenshots and traces
    pub output_dir: PathBuf,

    pub fully_parallel: bool,

    /// Refuse to run when any scenario is marked `only`
    pub forbid_only: bool,

    pub retries: u32,

    /// Retries used instead of `retries` when running under CI
    pub ci_retries: u32,

    pub workers: usize,

    pub reporter: Reporter,
    pub trace: TraceMode,
    pub screenshot: ScreenshotMode,

    pub action_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    pub expect_timeout_ms: u64,

    /// Per-scenario limit unless the scenario sets its own
    pub scenario_timeout_ms: u64,

    /// How long to wait for the target application before giving up
    pub health_timeout_ms: u64,

    pub base_url: String,
    pub headless: bool,

    /// `None` lets the browser window decide; written as `viewport = "managed"`
    #[serde(deserialize_with = "deserialize_viewport")]
    pub viewport: Option<Viewport>,

    pub slow_mo_ms: u64,
    pub launch_args: Vec<String>,
    pub projects: Vec<Project>,

    pub node_command: String,
    pub node_path: Option<PathBuf>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            test_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("test-results"),
            fully_parallel: false,
            forbid_only: false,
            retries: 0,
            ci_retries: 2,
            workers: 1,
            reporter: Reporter::List,
            trace: TraceMode::OnFirstRetry,
            screenshot: ScreenshotMode::OnlyOnFailure,
            action_timeout_ms: 60_000,
            navigation_timeout_ms: 60_000,
            expect_timeout_ms: 10_000,
            scenario_timeout_ms: 30_000,
            health_timeout_ms: 30_000,
            base_url: "https://opensource-demo.orangehrmlive.com".to_string(),
            headless: true,
            viewport: Some(Viewport { width: 1280, height: 720 }),
            slow_mo_ms: 0,
            launch_args: Vec::new(),
            projects: vec![Project::default()],
            node_command: "node".to_string(),
            node_path: None,
        }
    }
}

impl SuiteConfig {
    /// Parse a config from TOML
    pub fn from_toml(toml: &str) -> E2eResult<Self> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given and present, otherwise defaults
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        match path {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "loading suite config");
                Self::from_toml(&std::fs::read_to_string(path)?)
            }
            Some(path) => Err(E2eError::Config(format!("config file not found: {}", path.display()))),
            None => Ok(Self::default()),
        }
    }

    /// Apply `CI`, `ORANGEHRM_BASE_URL` and `E2E_HEADLESS` from the process environment
    pub fn apply_env(&mut self) -> E2eResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(&mut self, var: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if var("CI").is_some_and(|v| !v.is_empty() && v != "0" && v != "false") {
            self.retries = self.ci_retries;
            self.forbid_only = true;
        }
        if let Some(url) = var("ORANGEHRM_BASE_URL").filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(headless) = var("E2E_HEADLESS") {
            self.headless = parse_bool(&headless)
                .ok_or_else(|| E2eError::Config(format!("E2E_HEADLESS must be a boolean, got '{}'", headless)))?;
        }
        self.validate()
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.workers == 0 {
            return Err(E2eError::Config("workers must be at least 1".to_string()));
        }
        if self.projects.is_empty() {
            return Err(E2eError::Config("at least one project is required".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(E2eError::Config(format!("base_url must be http(s): {}", self.base_url)));
        }
        Ok(())
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            action: Duration::from_millis(self.action_timeout_ms),
            navigation: Duration::from_millis(self.navigation_timeout_ms),
            expect: Duration::from_millis(self.expect_timeout_ms),
        }
    }

    /// Browser settings for one project
    pub fn playwright_for(&self, project: &Project) -> PlaywrightConfig {
        PlaywrightConfig {
            base_url: self.base_url.clone(),
            browser: project.browser,
            headless: self.headless,
            viewport: self.viewport,
            slow_mo_ms: self.slow_mo_ms,
            launch_args: self.launch_args.clone(),
            action_timeout: Duration::from_millis(self.action_timeout_ms),
            navigation_timeout: Duration::from_millis(self.navigation_timeout_ms),
            node_command: self.node_command.clone(),
            node_path: self.node_path.clone(),
            ..PlaywrightConfig::default()
        }
    }

    /// How many scenarios may run at once
    pub fn concurrency(&self) -> usize {
        if self.fully_parallel {
            self.workers
        } else {
            1
        }
    }
}

fn deserialize_viewport<'de, D>(deserializer: D) -> Result<Option<Viewport>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Setting {
        Size(Viewport),
        Flag(bool),
        Keyword(String),
    }

    match Setting::deserialize(deserializer)? {
        Setting::Size(size) => Ok(Some(size)),
        Setting::Flag(false) => Ok(None),
        Setting::Keyword(k) if matches!(k.as_str(), "managed" | "none" | "null") => Ok(None),
        Setting::Flag(true) => Err(serde::de::Error::custom("viewport = true is ambiguous; give a size")),
        Setting::Keyword(k) => Err(serde::de::Error::custom(format!("unknown viewport setting '{}'", k))),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let config = SuiteConfig::default();
        assert!(!config.fully_parallel);
        assert_eq!(config.workers, 1);
        assert_eq!(config.retries, 0);
        assert_eq!(config.trace, TraceMode::OnFirstRetry);
        assert_eq!(config.screenshot, ScreenshotMode::OnlyOnFailure);
        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.concurrency(), 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
retries = 1
headless = false
slow_mo_ms = 1000
launch_args = ["--start-maximized", "--window-size=1920,1080"]
trace = "retain_on_failure"
screenshot = "on"
reporter = "json"

[[projects]]
name = "chromium"
browser = "chromium"

[[projects]]
name = "firefox"
browser = "firefox"
"#;
        let config = SuiteConfig::from_toml(toml).unwrap();
        assert_eq!(config.retries, 1);
        assert!(!config.headless);
        assert_eq!(config.launch_args.len(), 2);
        assert_eq!(config.trace, TraceMode::RetainOnFailure);
        assert_eq!(config.screenshot, ScreenshotMode::On);
        assert_eq!(config.reporter, Reporter::Json);
        assert_eq!(config.projects[1].browser, Browser::Firefox);
        // Unset fields keep their defaults
        assert_eq!(config.action_timeout_ms, 60_000);
        assert_eq!(config.viewport, Some(Viewport { width: 1280, height: 720 }));
    }

    #[test]
    fn test_viewport_settings() {
        let config = SuiteConfig::from_toml("viewport = \"managed\"").unwrap();
        assert_eq!(config.viewport, None);

        let config = SuiteConfig::from_toml("viewport = false").unwrap();
        assert_eq!(config.viewport, None);

        let config = SuiteConfig::from_toml("viewport = { width = 1920, height = 1080 }").unwrap();
        assert_eq!(config.viewport, Some(Viewport { width: 1920, height: 1080 }));

        assert!(SuiteConfig::from_toml("viewport = \"huge\"").is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(SuiteConfig::from_toml("workers = 0").is_err());
        assert!(SuiteConfig::from_toml("projects = []").is_err());
        assert!(SuiteConfig::from_toml("base_url = \"ftp://x\"").is_err());
        assert!(SuiteConfig::from_toml("retries = \"many\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CI", "true"),
            ("ORANGEHRM_BASE_URL", "http://localhost:8080"),
            ("E2E_HEADLESS", "0"),
        ]
        .into_iter()
        .collect();

        let mut config = SuiteConfig::default();
        config
            .apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.retries, 2);
        assert!(config.forbid_only);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert!(!config.headless);
    }

    #[test]
    fn test_env_without_ci() {
        let mut config = SuiteConfig::default();
        config.apply_env_from(|_| None).unwrap();
        assert_eq!(config.retries, 0);
        assert!(!config.forbid_only);

        let err = config
            .apply_env_from(|k| (k == "E2E_HEADLESS").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }

    #[test_case(TraceMode::Off, 0, false, false, false)]
    #[test_case(TraceMode::On, 0, false, true, true)]
    #[test_case(TraceMode::OnFirstRetry, 0, true, false, false)]
    #[test_case(TraceMode::OnFirstRetry, 1, false, true, true)]
    #[test_case(TraceMode::OnFirstRetry, 2, true, false, false)]
    #[test_case(TraceMode::RetainOnFailure, 0, false, true, false)]
    #[test_case(TraceMode::RetainOnFailure, 0, true, true, true)]
    fn test_trace_policy(mode: TraceMode, attempt: u32, failed: bool, records: bool, keeps: bool) {
        assert_eq!(mode.records(attempt), records);
        assert_eq!(mode.keeps(attempt, failed), keeps);
    }

    #[test_case(ScreenshotMode::Off, true, false)]
    #[test_case(ScreenshotMode::On, false, true)]
    #[test_case(ScreenshotMode::OnlyOnFailure, false, false)]
    #[test_case(ScreenshotMode::OnlyOnFailure, true, true)]
    fn test_screenshot_policy(mode: ScreenshotMode, failed: bool, captures: bool) {
        assert_eq!(mode.captures(failed), captures);
    }

    #[test]
    fn test_playwright_for_project() {
        let config = SuiteConfig {
            viewport: None,
            ..Default::default()
        };
        let project = Project {
            name: "webkit".to_string(),
            browser: Browser::Webkit,
        };
        let pw = config.playwright_for(&project);
        assert_eq!(pw.browser, Browser::Webkit);
        assert_eq!(pw.viewport, None);
        assert_eq!(pw.action_timeout, Duration::from_secs(60));
    }
}
