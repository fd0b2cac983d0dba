//! Run history
//!
//! Append-only record of every step of one agent run, with read-only queries
//! for the final result, executed actions and errors. Histories serialize to
//! JSON so a run can be inspected or replayed later.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::reasoning::Decision;
use crate::core::{
    ActionInvocation, ActionResult, FieldViolation, Observation, PilotError, Result, Task,
};

/// Terminal (or current) state of an agent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Running,
    /// The reasoner signalled completion
    Done,
    /// A collaborator failed or the failure cap was hit
    Failed,
    /// `max_steps` reached without completion
    StepsExhausted,
    /// Cancelled between steps by the caller
    Cancelled,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Running => write!(f, "running"),
            AgentStatus::Done => write!(f, "done"),
            AgentStatus::Failed => write!(f, "failed"),
            AgentStatus::StepsExhausted => write!(f, "steps exhausted"),
            AgentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a single invocation produced no result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionFailure {
    UnknownAction { name: String },
    Validation { violations: Vec<FieldViolation> },
    Execution { reason: String },
    BudgetExceeded { limit: usize },
}

impl From<PilotError> for ActionFailure {
    fn from(error: PilotError) -> Self {
        match error {
            PilotError::UnknownAction(name) => Self::UnknownAction { name },
            PilotError::Validation { violations, .. } => Self::Validation { violations },
            PilotError::BudgetExceeded { limit, .. } => Self::BudgetExceeded { limit },
            PilotError::ActionExecution { reason, .. } => Self::Execution { reason },
            other => Self::Execution {
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionFailure::UnknownAction { name } => write!(f, "unknown action '{}'", name),
            ActionFailure::Validation { violations } => {
                write!(f, "invalid arguments: ")?;
                for (i, v) in violations.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
            ActionFailure::Execution { reason } => write!(f, "execution failed: {}", reason),
            ActionFailure::BudgetExceeded { limit } => {
                write!(f, "not executed, step allows at most {} action(s)", limit)
            }
        }
    }
}

/// Outcome of one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Completed(ActionResult),
    Failed(ActionFailure),
}

/// An invocation together with what came of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub invocation: ActionInvocation,
    pub outcome: ActionOutcome,
}

impl ActionRecord {
    pub fn result(&self) -> Option<&ActionResult> {
        match &self.outcome {
            ActionOutcome::Completed(result) => Some(result),
            ActionOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ActionFailure> {
        match &self.outcome {
            ActionOutcome::Completed(_) => None,
            ActionOutcome::Failed(failure) => Some(failure),
        }
    }
}

/// One observe-reason-act cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position in the run
    pub number: usize,
    /// Environment state the decision was made on
    pub observation: Observation,
    pub decision: Decision,
    /// One record per proposed invocation, in proposal order
    pub actions: Vec<ActionRecord>,
}

impl Step {
    /// Failures recorded in this step
    pub fn errors(&self) -> impl Iterator<Item = &ActionFailure> + '_ {
        self.actions.iter().filter_map(ActionRecord::failure)
    }

    /// True when at least one action was proposed and none succeeded
    pub fn all_actions_failed(&self) -> bool {
        !self.actions.is_empty() && self.actions.iter().all(|a| a.failure().is_some())
    }
}

/// Ordered record of all steps of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    task: Task,
    steps: Vec<Step>,
    status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

impl History {
    pub(crate) fn new(task: Task) -> Self {
        Self {
            task,
            steps: Vec::new(),
            status: AgentStatus::Running,
            failure: None,
        }
    }

    pub(crate) fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub(crate) fn finish(&mut self, status: AgentStatus, failure: Option<String>) {
        self.status = status;
        self.failure = failure;
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    /// Why the run failed, when it did
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Whether the last step signalled completion
    pub fn is_done(&self) -> bool {
        self.steps.last().is_some_and(|s| s.decision.done)
    }

    /// Payload of the most recent completed step that carried one.
    ///
    /// A pure read over stored steps; `None` after budget exhaustion or a
    /// failure without payload.
    pub fn final_result(&self) -> Option<&Value> {
        self.steps
            .iter()
            .rev()
            .filter(|s| s.decision.done)
            .find_map(|s| s.decision.result.as_ref().filter(|v| !is_empty_payload(v)))
    }

    /// Every proposed invocation with its outcome, in execution order
    pub fn actions(&self) -> impl Iterator<Item = &ActionRecord> + '_ {
        self.steps.iter().flat_map(|s| s.actions.iter())
    }

    /// Names of all proposed actions, in order
    pub fn action_names(&self) -> Vec<&str> {
        self.actions().map(|a| a.invocation.name.as_str()).collect()
    }

    /// Results of all actions that completed
    pub fn action_results(&self) -> Vec<&ActionResult> {
        self.actions().filter_map(ActionRecord::result).collect()
    }

    /// Every recorded action failure, paired with its step number
    pub fn errors(&self) -> Vec<(usize, &ActionFailure)> {
        self.steps
            .iter()
            .flat_map(|s| s.errors().map(move |e| (s.number, e)))
            .collect()
    }

    /// URLs seen in observations, in order
    pub fn urls(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| s.observation.url.as_deref())
            .collect()
    }

    /// Text summary of the last `window` steps for the reasoner
    pub fn summarize(&self, window: usize) -> String {
        if self.steps.is_empty() || window == 0 {
            return String::new();
        }

        let start = self.steps.len().saturating_sub(window);
        let mut output = String::new();

        if start > 0 {
            output.push_str(&format!("({} earlier step(s) omitted)\n", start));
        }

        for step in &self.steps[start..] {
            output.push_str(&format!("\n### Step {}\n", step.number));
            if !step.decision.rationale.is_empty() {
                output.push_str(&format!("Thought: {}\n", step.decision.rationale));
            }
            for record in &step.actions {
                let args = serde_json::to_string(&record.invocation.arguments)
                    .unwrap_or_else(|_| "{}".to_string());
                match &record.outcome {
                    ActionOutcome::Completed(result) => output.push_str(&format!(
                        "- {} {} -> {}\n",
                        record.invocation.name, args, result.output
                    )),
                    ActionOutcome::Failed(failure) => output.push_str(&format!(
                        "- {} {} -> ERROR: {}\n",
                        record.invocation.name, args, failure
                    )),
                }
            }
            if step.actions.is_empty() {
                output.push_str("- (no actions)\n");
            }
        }

        output
    }

    /// Write the history as pretty JSON
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Read a history written by `save_to_file`
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// `null`, blank strings and empty objects or arrays carry no result
fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
