//! Suite runner: browser sessions, retries, cleanup and reports

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{Project, Reporter, SuiteConfig};
use crate::error::{E2eError, E2eResult};
use crate::health;
use crate::page::{BrowserSession, Page, Timeouts};
use crate::pages::{AdminPage, LoginPage, NewUser, RoleChoice};
use crate::playwright::{Launcher, PlaywrightLauncher};
use crate::scenario::{Scenario, ScenarioStep};
use crate::testdata::{TestData, LAST_CREATED_USERNAME};

/// Outcome of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// One run of a scenario in a fresh browser session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResult {
    /// 0 for the first run, 1 for the first retry
    pub attempt: u32,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
    pub trace_path: Option<PathBuf>,
    pub cleanup: Option<String>,
}

/// Result of running a single scenario on one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub project: String,
    pub success: bool,
    /// Passed, but only after a retry
    pub flaky: bool,
    pub duration_ms: u64,
    pub attempts: Vec<AttemptResult>,
    pub error: Option<String>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub flaky: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Steps and error of one scenario execution
#[derive(Debug)]
pub struct ScenarioRun {
    pub steps: Vec<StepResult>,
    pub error: Option<E2eError>,
}

impl ScenarioRun {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Execute `scenario` against `page`, stopping at the first failing step.
///
/// The whole run is bounded by `limit`; steps finished before the limit hit
/// are still reported.
pub async fn execute_scenario<P: Page + ?Sized>(
    page: &P,
    scenario: &Scenario,
    data: &TestData,
    timeouts: Timeouts,
    limit: Duration,
) -> ScenarioRun {
    let mut steps = Vec::with_capacity(scenario.steps.len());
    let outcome = tokio::time::timeout(limit, execute_steps(page, &scenario.steps, data, timeouts, &mut steps)).await;

    let error = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(_) => Some(E2eError::ScenarioTimeout {
            name: scenario.name.clone(),
            timeout_ms: limit.as_millis() as u64,
        }),
    };
    ScenarioRun { steps, error }
}

async fn execute_steps<P: Page + ?Sized>(
    page: &P,
    steps: &[ScenarioStep],
    data: &TestData,
    timeouts: Timeouts,
    results: &mut Vec<StepResult>,
) -> E2eResult<()> {
    for step in steps {
        let step_name = step.name();
        let start = Instant::now();
        debug!(step = %step_name, "running step");

        let outcome = run_step(page, step, data, timeouts).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => results.push(StepResult {
                success: true,
                step_name,
                duration_ms,
                error: None,
            }),
            Err(e) => {
                results.push(StepResult {
                    success: false,
                    step_name: step_name.clone(),
                    duration_ms,
                    error: Some(e.to_string()),
                });
                return Err(E2eError::StepFailed {
                    step: step_name,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(())
}

async fn run_step<P: Page + ?Sized>(
    page: &P,
    step: &ScenarioStep,
    data: &TestData,
    timeouts: Timeouts,
) -> E2eResult<()> {
    match step {
        ScenarioStep::Login { username, password } => {
            let login = LoginPage::new(page, timeouts);
            login.goto().await?;
            login
                .login(&data.interpolate(username)?, &data.interpolate(password)?)
                .await
        }
        ScenarioStep::NavigateToAdmin => AdminPage::new(page, data, timeouts).navigate_to_admin().await,
        ScenarioStep::AddUser { user } => {
            let user = NewUser {
                employee_name: data.interpolate(&user.employee_name)?,
                password: data.interpolate(&user.password)?,
                ..user.clone()
            };
            AdminPage::new(page, data, timeouts).add_user(&user).await.map(|_| ())
        }
        ScenarioStep::SearchUser { username } => {
            let username = data.interpolate(username)?;
            AdminPage::new(page, data, timeouts).search_user(&username).await
        }
        ScenarioStep::EditUser { role } => {
            let role = RoleChoice::from(role.clone());
            AdminPage::new(page, data, timeouts).edit_user(&role).await
        }
        ScenarioStep::DeleteUser { username } => {
            let username = data.interpolate(username)?;
            AdminPage::new(page, data, timeouts).delete_user(&username).await
        }
    }
}

/// Delete the user recorded in `data`, if any. Failures are logged, never raised.
///
/// Returns a short description of what happened for the report.
pub async fn cleanup_created_user<P: Page + ?Sized>(
    page: &P,
    data: &TestData,
    timeouts: Timeouts,
    limit: Duration,
) -> Option<String> {
    let username = data.get_str(LAST_CREATED_USERNAME)?;
    let admin = AdminPage::new(page, data, timeouts);

    let outcome = match tokio::time::timeout(limit, admin.delete_by_username(&username)).await {
        Ok(Ok(true)) => format!("deleted {}", username),
        Ok(Ok(false)) => format!("{} already gone", username),
        Ok(Err(e)) => {
            warn!(%username, error = %e, "cleanup failed");
            format!("failed to delete {}: {}", username, e)
        }
        Err(_) => {
            warn!(%username, ?limit, "cleanup timed out");
            format!("timed out deleting {}", username)
        }
    };
    Some(outcome)
}

/// Main E2E test runner
pub struct TestRunner<L: Launcher = PlaywrightLauncher> {
    config: SuiteConfig,
    launcher: L,
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> Self {
        Self::with_config(SuiteConfig::default())
    }

    /// Create a test runner with custom configuration
    pub fn with_config(config: SuiteConfig) -> Self {
        Self::with_launcher(config, PlaywrightLauncher)
    }
}

impl<L: Launcher> TestRunner<L> {
    /// Create a test runner that opens sessions through `launcher`
    pub fn with_launcher(config: SuiteConfig, launcher: L) -> Self {
        Self { config, launcher }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Scenarios from the test directory, or the built-in one when it has none
    pub fn load_scenarios(&self) -> E2eResult<Vec<Scenario>> {
        let dir = &self.config.test_dir;
        let scenarios = if dir.is_dir() {
            Scenario::load_all(dir)?
        } else {
            Vec::new()
        };

        if scenarios.is_empty() {
            debug!(dir = %dir.display(), "no scenario files, using built-in user management");
            return Ok(vec![Scenario::user_management()]);
        }
        Ok(scenarios)
    }

    /// Run all scenarios
    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        let scenarios = self.load_scenarios()?;
        self.run(&scenarios).await
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<TestSuiteResult> {
        let scenarios = self.load_scenarios()?;
        let filtered: Vec<Scenario> = Scenario::filter_by_tag(&scenarios, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run(&filtered).await
    }

    /// Run a specific scenario by name
    pub async fn run_named(&self, name: &str) -> E2eResult<TestSuiteResult> {
        let scenario = self
            .load_scenarios()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Scenario not found: {}", name)))?;
        self.run(std::slice::from_ref(&scenario)).await
    }

    /// Apply `only` markers, honoring `forbid_only`
    pub fn select<'a>(&self, scenarios: &'a [Scenario]) -> E2eResult<Vec<&'a Scenario>> {
        let focused: Vec<&Scenario> = scenarios.iter().filter(|s| s.only).collect();
        if focused.is_empty() {
            return Ok(scenarios.iter().collect());
        }
        if self.config.forbid_only {
            let names: Vec<&str> = focused.iter().map(|s| s.name.as_str()).collect();
            return Err(E2eError::Config(format!(
                "scenarios marked only while forbid_only is set: {}",
                names.join(", ")
            )));
        }
        Ok(focused)
    }

    /// Run scenarios against every configured project
    pub async fn run(&self, scenarios: &[Scenario]) -> E2eResult<TestSuiteResult> {
        let start = Instant::now();
        let selected = self.select(scenarios)?;
        let skipped = (scenarios.len() - selected.len()) * self.config.projects.len();

        health::wait_for_reachable(
            &self.config.base_url,
            Duration::from_millis(self.config.health_timeout_ms),
        )
        .await?;

        let jobs: Vec<(&Project, &Scenario)> = self
            .config
            .projects
            .iter()
            .flat_map(|p| selected.iter().map(move |s| (p, *s)))
            .collect();

        info!(
            "Running {} test(s) with {} worker(s)...",
            jobs.len(),
            self.config.concurrency()
        );

        let results: Vec<TestResult> = stream::iter(jobs)
            .map(|(project, scenario)| self.run_test(project, scenario))
            .buffered(self.config.concurrency())
            .collect()
            .await;

        let passed = results.iter().filter(|r| r.success).count();
        let flaky = results.iter().filter(|r| r.flaky).count();
        let failed = results.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Test Results: {} passed ({} flaky), {} failed, {} skipped ({} ms)",
            passed, flaky, failed, skipped, duration_ms
        );

        Ok(TestSuiteResult {
            total: results.len() + skipped,
            passed,
            failed,
            skipped,
            flaky,
            duration_ms,
            results,
        })
    }

    /// Run one scenario on one project, retrying failed attempts
    pub async fn run_test(&self, project: &Project, scenario: &Scenario) -> TestResult {
        let start = Instant::now();
        let mut attempts = Vec::new();

        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                warn!(scenario = %scenario.name, project = %project.name, attempt, "retrying");
            }
            let result = self.run_attempt(project, scenario, attempt).await;
            let success = result.success;
            attempts.push(result);
            if success {
                break;
            }
        }

        let last = attempts.last();
        let success = last.map_or(false, |a| a.success);
        let result = TestResult {
            name: scenario.name.clone(),
            project: project.name.clone(),
            success,
            flaky: success && attempts.len() > 1,
            duration_ms: start.elapsed().as_millis() as u64,
            error: last.and_then(|a| a.error.clone()),
            attempts,
        };

        if result.success {
            info!("✓ [{}] {} ({} ms)", result.project, result.name, result.duration_ms);
        } else {
            error!(
                "✗ [{}] {} - {}",
                result.project,
                result.name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        result
    }

    async fn run_attempt(&self, project: &Project, scenario: &Scenario, attempt: u32) -> AttemptResult {
        let start = Instant::now();
        let artifacts = self.artifact_dir(project, scenario, attempt);

        let page = match self.launcher.launch(self.config.playwright_for(project)).await {
            Ok(page) => page,
            Err(e) => {
                return AttemptResult {
                    attempt,
                    success: false,
                    duration_ms: start.elapsed().as_millis() as u64,
                    steps: Vec::new(),
                    error: Some(e.to_string()),
                    screenshot_path: None,
                    trace_path: None,
                    cleanup: None,
                }
            }
        };

        let tracing_on = self.config.trace.records(attempt)
            && match page.start_tracing().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "could not start tracing");
                    false
                }
            };

        let data = TestData::new();
        let timeouts = self.config.timeouts();
        let limit = scenario.timeout(Duration::from_millis(self.config.scenario_timeout_ms));
        let run = execute_scenario(&page, scenario, &data, timeouts, limit).await;
        let failed = !run.success();

        let screenshot_path = if self.config.screenshot.captures(failed) {
            let path = artifacts.join("screenshot.png");
            match self.capture(&page, &path).await {
                Ok(()) => Some(path),
                Err(e) => {
                    warn!(error = %e, "screenshot failed");
                    None
                }
            }
        } else {
            None
        };

        let trace_path = if tracing_on {
            let keep = self.config.trace.keeps(attempt, failed).then(|| artifacts.join("trace.zip"));
            match self.save_trace(&page, keep.as_deref()).await {
                Ok(()) => keep,
                Err(e) => {
                    warn!(error = %e, "could not save trace");
                    None
                }
            }
        } else {
            None
        };

        let cleanup = cleanup_created_user(&page, &data, timeouts, limit).await;
        data.clear_all();

        if let Err(e) = page.close().await {
            warn!(error = %e, "browser did not close cleanly");
        }

        AttemptResult {
            attempt,
            success: !failed,
            duration_ms: start.elapsed().as_millis() as u64,
            steps: run.steps,
            error: run.error.map(|e| e.to_string()),
            screenshot_path,
            trace_path,
            cleanup,
        }
    }

    async fn capture(&self, page: &L::Session, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        page.screenshot(path).await
    }

    async fn save_trace(&self, page: &L::Session, path: Option<&Path>) -> E2eResult<()> {
        if let Some(parent) = path.and_then(Path::parent) {
            std::fs::create_dir_all(parent)?;
        }
        page.stop_tracing(path).await
    }

    fn artifact_dir(&self, project: &Project, scenario: &Scenario, attempt: u32) -> PathBuf {
        self.config
            .output_dir
            .join(slug(&project.name))
            .join(slug(&scenario.name))
            .join(format!("attempt-{}", attempt))
    }

    /// Write the configured report, returning the file written if any
    pub fn report(&self, results: &TestSuiteResult) -> E2eResult<Option<PathBuf>> {
        match self.config.reporter {
            Reporter::List => Ok(None),
            Reporter::Json => self.write_results(results).map(Some),
        }
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPage;

    fn scenario(name: &str, only: bool) -> Scenario {
        Scenario {
            only,
            name: name.to_string(),
            ..Scenario::user_management()
        }
    }

    #[test]
    fn test_select_without_only_keeps_all() {
        let runner = TestRunner::new();
        let scenarios = vec![scenario("a", false), scenario("b", false)];
        assert_eq!(runner.select(&scenarios).unwrap().len(), 2);
    }

    #[test]
    fn test_select_only_focuses() {
        let runner = TestRunner::new();
        let scenarios = vec![scenario("a", false), scenario("b", true)];
        let selected = runner.select(&scenarios).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "b");
    }

    #[test]
    fn test_forbid_only_rejects_focused() {
        let runner = TestRunner::with_config(SuiteConfig {
            forbid_only: true,
            ..SuiteConfig::default()
        });
        let scenarios = vec![scenario("a", false), scenario("b", true)];
        let err = runner.select(&scenarios).unwrap_err();
        assert!(err.to_string().contains("b"));
    }

    #[test]
    fn test_load_scenarios_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TestRunner::with_config(SuiteConfig {
            test_dir: dir.path().join("missing"),
            ..SuiteConfig::default()
        });
        let scenarios = runner.load_scenarios().unwrap();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].name, "user-management");
    }

    #[test]
    fn test_artifact_dir_layout() {
        let runner = TestRunner::with_config(SuiteConfig {
            output_dir: PathBuf::from("out"),
            ..SuiteConfig::default()
        });
        let dir = runner.artifact_dir(&Project::default(), &Scenario::user_management(), 1);
        assert_eq!(dir, PathBuf::from("out/chromium/user-management/attempt-1"));
        assert_eq!(slug("Add User: ESS"), "add-user--ess");
    }

    #[test]
    fn test_write_results_json() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TestRunner::with_config(SuiteConfig {
            output_dir: dir.path().to_path_buf(),
            reporter: Reporter::Json,
            ..SuiteConfig::default()
        });
        let results = TestSuiteResult {
            total: 1,
            passed: 1,
            failed: 0,
            skipped: 0,
            flaky: 0,
            duration_ms: 5,
            results: vec![],
        };
        let path = runner.report(&results).unwrap().unwrap();
        let written: TestSuiteResult =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written.passed, 1);
        assert!(written.success());
    }

    #[tokio::test]
    async fn test_scenario_timeout_reports_finished_steps() {
        // Login never reaches the dashboard, so the URL expectation outlives the limit
        let page = ScriptedPage::new();
        let data = TestData::new();
        let scenario = Scenario {
            steps: vec![
                ScenarioStep::Login {
                    username: "Admin".into(),
                    password: "admin123".into(),
                },
                ScenarioStep::NavigateToAdmin,
            ],
            ..Scenario::user_management()
        };

        let run = execute_scenario(&page, &scenario, &data, Timeouts::default(), Duration::from_millis(50)).await;
        assert!(run.steps.is_empty());
        let err = run.error.unwrap();
        assert!(matches!(err, E2eError::ScenarioTimeout { timeout_ms: 50, .. }));
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_cleanup_without_user_does_nothing() {
        let page = ScriptedPage::new();
        let data = TestData::new();
        let outcome = cleanup_created_user(&page, &data, Timeouts::default(), Duration::from_secs(1)).await;
        assert!(outcome.is_none());
        assert!(page.calls().is_empty());
    }
}
