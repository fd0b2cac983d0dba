//! Configuration management for Taskpilot
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/taskpilot/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{PilotError, Result};

/// Main configuration for Taskpilot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ollama configuration
    pub ollama: OllamaConfig,
    /// Model configuration
    pub models: ModelConfig,
    /// Browser configuration
    pub browser: BrowserConfig,
    /// Agent configuration
    pub agent: AgentConfig,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 11434)
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model that decides the next actions.
    /// Default: qwen3-vl:8b (tool calling + vision)
    pub reasoner: String,
    /// Sampling temperature for decisions
    pub temperature: f32,
}

/// Browser automation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Whether the built-in browser actions are registered
    pub enabled: bool,
    /// Session name for agent-browser
    pub session_name: String,
    /// Whether to run in headed mode (visible browser)
    pub headed: bool,
    /// Default timeout for browser operations in ms
    pub timeout_ms: u64,
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum number of steps per run
    /// Default: 5
    pub max_steps: usize,
    /// Maximum number of actions executed per step
    /// Default: 1
    pub max_actions_per_step: usize,
    /// Attach a screenshot to every observation
    pub use_vision: bool,
    /// Number of recent steps shown to the reasoner
    /// Default: 10
    pub history_window: usize,
    /// Stop the run after this many steps in a row where every action failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_failures: Option<usize>,
    /// Treat decisions naming unregistered actions as malformed
    pub strict_actions: bool,
    /// Whether to show debug output
    pub debug: bool,
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434),
            timeout_secs: 120,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            reasoner: env::var("TASKPILOT_MODEL").unwrap_or_else(|_| "qwen3-vl:8b".to_string()),
            temperature: 0.1,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session_name: env::var("TASKPILOT_BROWSER_SESSION")
                .unwrap_or_else(|_| "taskpilot".to_string()),
            headed: env_flag("TASKPILOT_BROWSER_HEADED", false),
            timeout_ms: 30000,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            max_actions_per_step: 1,
            use_vision: env_flag("TASKPILOT_USE_VISION", true),
            history_window: 10,
            max_consecutive_failures: None,
            strict_actions: true,
            debug: env_flag("TASKPILOT_DEBUG", false),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskpilot")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        if let Ok(config) = Self::load_from_file() {
            return config;
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(PilotError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| PilotError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PilotError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| PilotError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PilotError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| PilotError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Reject settings the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_budgets(self.agent.max_steps, self.agent.max_actions_per_step)?;

        if self.models.reasoner.trim().is_empty() {
            return Err(PilotError::config("No reasoner model configured"));
        }

        if self.agent.max_consecutive_failures == Some(0) {
            return Err(PilotError::config(
                "max_consecutive_failures must be at least 1 when set",
            ));
        }

        Ok(())
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

/// Both run budgets must be at least one
pub fn validate_budgets(max_steps: usize, max_actions_per_step: usize) -> Result<()> {
    if max_steps == 0 {
        return Err(PilotError::config("max_steps must be at least 1"));
    }
    if max_actions_per_step == 0 {
        return Err(PilotError::config("max_actions_per_step must be at least 1"));
    }
    Ok(())
}
