//! Custom error types for Taskpilot
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

use crate::core::types::FieldViolation;

/// Main error type for Taskpilot operations
#[derive(Error, Debug)]
pub enum PilotError {
    /// Invalid budgets, missing collaborators or credentials
    #[error("Configuration error: {0}")]
    Config(String),

    /// An action was registered twice while the registry rejects overrides
    #[error("Action '{0}' is already registered")]
    DuplicateAction(String),

    /// The requested action is not in the registry
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Arguments did not match the action's parameter schema
    #[error("Invalid arguments for '{action}': {}", format_violations(.violations))]
    Validation {
        action: String,
        violations: Vec<FieldViolation>,
    },

    /// A handler failed while running with validated arguments
    #[error("Action '{action}' failed: {reason}")]
    ActionExecution { action: String, reason: String },

    /// More invocations than the per-step budget allows
    #[error("Action '{action}' dropped: step allows at most {limit} action(s)")]
    BudgetExceeded { action: String, limit: usize },

    /// The reasoning client produced an unusable decision
    #[error("Decision format error: {0}")]
    DecisionFormat(String),

    /// The reasoning client could not be reached
    #[error("Reasoning client unavailable: {0}")]
    ReasoningUnavailable(String),

    /// The environment observer failed to produce an observation
    #[error("Observation error: {0}")]
    Observation(String),

    /// Ollama connection or API errors
    #[error("Ollama error: {0}")]
    Ollama(String),

    /// Browser automation errors
    #[error("Browser error: {0}")]
    Browser(String),

    /// Agent-browser not installed
    #[error("agent-browser not found. Install with: npm install -g agent-browser && agent-browser install")]
    AgentBrowserNotFound,

    /// Model not available
    #[error("Model '{0}' not available in Ollama. Run: ollama pull {0}")]
    ModelNotFound(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for Taskpilot operations
pub type Result<T> = std::result::Result<T, PilotError>;

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl PilotError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an action execution error
    pub fn action(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ActionExecution {
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// Create a decision format error
    pub fn decision_format(msg: impl Into<String>) -> Self {
        Self::DecisionFormat(msg.into())
    }

    /// Create a reasoning-unavailable error
    pub fn reasoning_unavailable(msg: impl Into<String>) -> Self {
        Self::ReasoningUnavailable(msg.into())
    }

    /// Create an observation error
    pub fn observation(msg: impl Into<String>) -> Self {
        Self::Observation(msg.into())
    }

    /// Create an Ollama error
    pub fn ollama(msg: impl Into<String>) -> Self {
        Self::Ollama(msg.into())
    }

    /// Create a browser error
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }
}
