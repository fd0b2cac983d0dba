//! Browser executor - wraps agent-browser CLI
//!
//! Provides async interface to agent-browser commands. One executor drives
//! one named browser session.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::browser::snapshot::Snapshot;
use crate::core::config::BrowserConfig;
use crate::core::{PilotError, Result};

/// Executor for browser automation via agent-browser CLI
#[derive(Debug, Clone)]
pub struct BrowserExecutor {
    /// agent-browser binary to invoke
    program: String,
    /// Session name for isolation
    session_name: String,
    /// Whether to run in headed mode
    headed: bool,
    /// Upper bound for a single command
    timeout: Duration,
}

impl BrowserExecutor {
    /// Create a new browser executor
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            program: "agent-browser".to_string(),
            session_name: session_name.into(),
            headed: false,
            timeout: Duration::from_millis(30_000),
        }
    }

    /// Create an executor from configuration
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            program: "agent-browser".to_string(),
            session_name: config.session_name.clone(),
            headed: config.headed,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Use a different agent-browser binary
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Check if agent-browser is installed
    pub async fn is_available() -> bool {
        Command::new("agent-browser")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run an agent-browser command
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--session", &self.session_name]);

        if self.headed {
            cmd.arg("--headed");
        }

        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(session = %self.session_name, ?args, "agent-browser");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                PilotError::browser(format!(
                    "agent-browser {} timed out after {:?}",
                    args.first().copied().unwrap_or_default(),
                    self.timeout
                ))
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PilotError::AgentBrowserNotFound
                } else {
                    PilotError::browser(format!("Failed to run agent-browser: {}", e))
                }
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(PilotError::browser(format!(
                "agent-browser command failed: {}",
                stderr.trim()
            )))
        }
    }

    /// Navigate to a URL
    pub async fn open(&self, url: &str) -> Result<()> {
        self.run_command(&["open", url]).await?;
        // Best effort; some pages never reach network idle.
        let _ = self.run_command(&["wait", "--load", "networkidle"]).await;
        Ok(())
    }

    /// Go back in history
    pub async fn back(&self) -> Result<()> {
        self.run_command(&["back"]).await.map(|_| ())
    }

    /// Click an element by ref
    pub async fn click(&self, ref_id: &str) -> Result<()> {
        self.run_command(&["click", &normalize_ref(ref_id)])
            .await
            .map(|_| ())
    }

    /// Fill an input field
    pub async fn fill(&self, ref_id: &str, text: &str) -> Result<()> {
        self.run_command(&["fill", &normalize_ref(ref_id), text])
            .await
            .map(|_| ())
    }

    /// Get text from an element
    pub async fn get_text(&self, ref_id: &str) -> Result<String> {
        let output = self
            .run_command(&["get", "text", &normalize_ref(ref_id)])
            .await?;
        Ok(output.trim().to_string())
    }

    /// Press a key
    pub async fn press(&self, key: &str) -> Result<()> {
        self.run_command(&["press", key]).await.map(|_| ())
    }

    /// Scroll the page
    pub async fn scroll(&self, direction: &str, pixels: Option<u32>) -> Result<()> {
        let px_str = pixels.map(|px| px.to_string());
        let mut args = vec!["scroll", direction];
        if let Some(px) = px_str.as_deref() {
            args.push(px);
        }
        self.run_command(&args).await.map(|_| ())
    }

    /// Wait for text to appear
    pub async fn wait_for_text(&self, text: &str) -> Result<()> {
        self.run_command(&["wait", "--text", text]).await.map(|_| ())
    }

    /// Get the interactive accessibility snapshot
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let output = self.run_command(&["snapshot", "-i", "--json"]).await?;
        Ok(serde_json::from_str(&output)?)
    }

    /// Capture the viewport as base64 PNG
    pub async fn screenshot_base64(&self) -> Result<String> {
        let output = self.run_command(&["screenshot"]).await?;
        Ok(output.trim().to_string())
    }

    /// Get current URL
    pub async fn get_url(&self) -> Result<String> {
        self.run_command(&["get", "url"])
            .await
            .map(|s| s.trim().to_string())
    }

    /// Get page title
    pub async fn get_title(&self) -> Result<String> {
        self.run_command(&["get", "title"])
            .await
            .map(|s| s.trim().to_string())
    }
}

/// agent-browser addresses snapshot refs as `@eN`
fn normalize_ref(ref_id: &str) -> String {
    let trimmed = ref_id.trim();
    let bare = trimmed
        .strip_prefix("[ref=")
        .and_then(|r| r.strip_suffix(']'))
        .unwrap_or(trimmed);
    if bare.starts_with('@') {
        bare.to_string()
    } else {
        format!("@{}", bare)
    }
}
