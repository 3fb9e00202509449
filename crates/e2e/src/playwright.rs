//! Playwright browser automation
//!
//! A [`PlaywrightHandle`] owns one Node.js driver process holding one browser
//! page. Requests and replies are JSON objects, one per line, over the
//! child's stdin and stdout; the driver's stderr is forwarded into the log.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Viewport;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::page::{BrowserSession, Page, WaitState};

const DRIVER_SCRIPT: &str = include_str!("../driver/driver.js");

/// Slack on top of a request's own timeout before the driver is presumed stuck
const DRIVER_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for one browser session
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    /// `None` leaves the viewport to the browser window
    pub viewport: Option<Viewport>,
    pub slow_mo_ms: u64,
    pub launch_args: Vec<String>,
    pub action_timeout: Duration,
    pub navigation_timeout: Duration,
    pub launch_timeout: Duration,
    pub node_command: String,
    /// Directory holding the `playwright` package, exported as `NODE_PATH`
    pub node_path: Option<PathBuf>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "https://opensource-demo.orangehrmlive.com".to_string(),
            browser: Browser::Chromium,
            headless: true,
            viewport: Some(Viewport { width: 1280, height: 720 }),
            slow_mo_ms: 0,
            launch_args: Vec::new(),
            action_timeout: Duration::from_secs(60),
            navigation_timeout: Duration::from_secs(60),
            launch_timeout: Duration::from_secs(60),
            node_command: "node".to_string(),
            node_path: None,
        }
    }
}

/// Settings handed to the driver process at startup
#[derive(Debug, Serialize)]
struct LaunchOptions<'a> {
    browser: &'a str,
    headless: bool,
    slow_mo_ms: u64,
    launch_args: &'a [String],
    base_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    viewport: Option<Viewport>,
    action_timeout_ms: u64,
    navigation_timeout_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Goto { url: &'a str },
    Click { locator: &'a Locator, timeout_ms: u64 },
    Fill { locator: &'a Locator, value: &'a str, timeout_ms: u64 },
    WaitFor { locator: &'a Locator, state: WaitState, timeout_ms: u64 },
    TextContent { locator: &'a Locator, timeout_ms: u64 },
    Url,
    Screenshot { path: String, full_page: bool },
    TracingStart,
    TracingStop { path: Option<String> },
    Close,
}

impl DriverCommand<'_> {
    fn describe(&self) -> String {
        match self {
            DriverCommand::Goto { url } => format!("goto:{}", url),
            DriverCommand::Click { locator, .. } => format!("click:{}", locator),
            DriverCommand::Fill { locator, .. } => format!("fill:{}", locator),
            DriverCommand::WaitFor { locator, state, .. } => format!("wait:{}:{:?}", locator, state),
            DriverCommand::TextContent { locator, .. } => format!("text:{}", locator),
            DriverCommand::Url => "url".to_string(),
            DriverCommand::Screenshot { path, .. } => format!("screenshot:{}", path),
            DriverCommand::TracingStart => "tracing:start".to_string(),
            DriverCommand::TracingStop { .. } => "tracing:stop".to_string(),
            DriverCommand::Close => "close".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a DriverCommand<'a>,
}

#[derive(Debug, Default, Deserialize)]
struct Reply {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl Reply {
    fn into_result(self, what: &str) -> E2eResult<Value> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_else(|| "unknown driver error".to_string());
        match self.kind.as_deref() {
            Some("timeout") => Err(E2eError::Timeout(format!("{} - {}", what, message))),
            _ => Err(E2eError::Playwright(format!("{} - {}", what, message))),
        }
    }
}

struct DriverIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

/// Playwright browser handle
pub struct PlaywrightHandle {
    child: Child,
    io: Mutex<DriverIo>,
    config: PlaywrightConfig,
    _script_dir: TempDir,
}

impl PlaywrightHandle {
    /// Start a driver process and wait until its page is ready
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, DRIVER_SCRIPT)?;

        let options = LaunchOptions {
            browser: config.browser.as_str(),
            headless: config.headless,
            slow_mo_ms: config.slow_mo_ms,
            launch_args: &config.launch_args,
            base_url: &config.base_url,
            viewport: config.viewport,
            action_timeout_ms: config.action_timeout.as_millis() as u64,
            navigation_timeout_ms: config.navigation_timeout.as_millis() as u64,
        };

        let mut cmd = TokioCommand::new(&config.node_command);
        cmd.arg(&script_path)
            .env("E2E_DRIVER_CONFIG", serde_json::to_string(&options)?)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let node_path = config
            .node_path
            .clone()
            .or_else(|| std::env::current_dir().ok().map(|d| d.join("node_modules")));
        if let Some(path) = node_path {
            cmd.env("NODE_PATH", path);
        }

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::Driver(format!("failed to spawn {}: {}", config.node_command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Driver("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Driver("driver stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright::driver", "{}", line);
                }
            });
        }

        let mut stdout = BufReader::new(stdout).lines();
        Self::wait_ready(&mut stdout, config.launch_timeout).await?;

        info!(
            browser = config.browser.as_str(),
            headless = config.headless,
            "browser ready"
        );

        Ok(Self {
            child,
            io: Mutex::new(DriverIo { stdin, stdout, next_id: 0 }),
            config,
            _script_dir: script_dir,
        })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    async fn wait_ready(stdout: &mut Lines<BufReader<ChildStdout>>, limit: Duration) -> E2eResult<()> {
        timeout(limit, Self::read_ready(stdout))
            .await
            .map_err(|_| E2eError::Driver(format!("browser not ready after {:?}", limit)))?
    }

    async fn read_ready(stdout: &mut Lines<BufReader<ChildStdout>>) -> E2eResult<()> {
        loop {
            let line = stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Driver("driver exited before it was ready".to_string()))?;
            match serde_json::from_str::<Reply>(&line) {
                Ok(reply) if reply.ready => return Ok(()),
                _ => debug!(target: "playwright::driver", "{}", line),
            }
        }
    }

    async fn request(&self, command: DriverCommand<'_>, budget: Duration) -> E2eResult<Value> {
        let what = command.describe();
        let mut io = self.io.lock().await;
        io.next_id += 1;
        let id = io.next_id;

        let line = serde_json::to_string(&Request { id, command: &command })?;
        debug!(id, request = %what, "driver request");
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.write_all(b"\n").await?;
        io.stdin.flush().await?;

        let limit = budget + DRIVER_GRACE;
        loop {
            let next = timeout(limit, io.stdout.next_line())
                .await
                .map_err(|_| E2eError::Driver(format!("no reply to {} within {:?}", what, limit)))??;
            let line = next.ok_or_else(|| E2eError::Driver(format!("driver exited during {}", what)))?;

            let reply: Reply = match serde_json::from_str(&line) {
                Ok(reply) => reply,
                Err(_) => {
                    debug!(target: "playwright::driver", "{}", line);
                    continue;
                }
            };
            if reply.id != id {
                // Late reply to a request that already timed out on our side
                warn!(expected = id, got = reply.id, "discarding stale driver reply");
                continue;
            }
            return reply.into_result(&what);
        }
    }

    fn action_ms(&self) -> u64 {
        self.config.action_timeout.as_millis() as u64
    }

    fn terminate(&mut self) {
        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }

        let _ = self.child.start_kill();
    }
}

impl Drop for PlaywrightHandle {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            self.terminate();
        }
    }
}

#[async_trait]
impl Page for PlaywrightHandle {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.request(DriverCommand::Goto { url }, self.config.navigation_timeout)
            .await
            .map(|_| ())
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        let timeout_ms = self.action_ms();
        self.request(DriverCommand::Click { locator, timeout_ms }, self.config.action_timeout)
            .await
            .map(|_| ())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        let timeout_ms = self.action_ms();
        self.request(
            DriverCommand::Fill { locator, value, timeout_ms },
            self.config.action_timeout,
        )
        .await
        .map(|_| ())
    }

    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()> {
        let timeout_ms = timeout.as_millis() as u64;
        self.request(DriverCommand::WaitFor { locator, state, timeout_ms }, timeout)
            .await
            .map(|_| ())
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>> {
        let timeout_ms = self.action_ms();
        let value = self
            .request(DriverCommand::TextContent { locator, timeout_ms }, self.config.action_timeout)
            .await?;
        Ok(value.as_str().map(String::from))
    }

    async fn url(&self) -> E2eResult<String> {
        let value = self.request(DriverCommand::Url, self.config.action_timeout).await?;
        value
            .as_str()
            .map(String::from)
            .ok_or_else(|| E2eError::Driver(format!("unexpected url reply: {}", value)))
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let path = path.to_string_lossy().into_owned();
        self.request(
            DriverCommand::Screenshot { path, full_page: true },
            self.config.action_timeout,
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl BrowserSession for PlaywrightHandle {
    async fn start_tracing(&self) -> E2eResult<()> {
        self.request(DriverCommand::TracingStart, self.config.action_timeout)
            .await
            .map(|_| ())
    }

    async fn stop_tracing(&self, path: Option<&Path>) -> E2eResult<()> {
        let path = path.map(|p| p.to_string_lossy().into_owned());
        self.request(DriverCommand::TracingStop { path }, self.config.action_timeout)
            .await
            .map(|_| ())
    }

    /// Close the browser and wait for the driver to exit
    async fn close(mut self) -> E2eResult<()> {
        let result = self
            .request(DriverCommand::Close, self.config.action_timeout)
            .await
            .map(|_| ());

        match timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                if !status.success() {
                    warn!(%status, "driver exited uncleanly");
                }
            }
            Err(_) => self.terminate(),
        }
        result
    }
}

/// Starts browser sessions for the runner
#[async_trait]
pub trait Launcher: Send + Sync {
    type Session: BrowserSession;

    async fn launch(&self, config: PlaywrightConfig) -> E2eResult<Self::Session>;
}

/// Launches a real browser through the Node driver
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaywrightLauncher;

#[async_trait]
impl Launcher for PlaywrightLauncher {
    type Session = PlaywrightHandle;

    async fn launch(&self, config: PlaywrightConfig) -> E2eResult<PlaywrightHandle> {
        PlaywrightHandle::launch(config).await
    }
}
