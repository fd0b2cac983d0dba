//! Reasoning client contract
//!
//! The agent asks a reasoning client for the next move. The client sees the
//! task, the recent history, the current observation and the actions it may
//! choose from, and answers with a [`Decision`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::ActionSpec;
use crate::agent::history::History;
use crate::core::{ActionInvocation, Observation, PilotError, Result, Task, ToolDefinition};

/// Structured output of one reasoning turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Free-form explanation of the chosen move
    #[serde(default)]
    pub rationale: String,
    /// Actions to run, in order
    #[serde(default)]
    pub invocations: Vec<ActionInvocation>,
    /// Whether the task is complete after these actions
    #[serde(default)]
    pub done: bool,
    /// Final payload, meaningful only when `done`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Decision {
    /// Keep going with the given actions
    pub fn act(rationale: impl Into<String>, invocations: Vec<ActionInvocation>) -> Self {
        Self {
            rationale: rationale.into(),
            invocations,
            done: false,
            result: None,
        }
    }

    /// Finish the task with a payload
    pub fn complete(rationale: impl Into<String>, result: Value) -> Self {
        Self {
            rationale: rationale.into(),
            invocations: Vec::new(),
            done: true,
            result: Some(result),
        }
    }

    /// Add an action to run before the decision takes effect
    pub fn with_invocation(mut self, invocation: ActionInvocation) -> Self {
        self.invocations.push(invocation);
        self
    }
}

/// Everything a reasoning client gets for one turn
#[derive(Debug)]
pub struct DecisionRequest<'a> {
    pub task: &'a Task,
    pub history: &'a History,
    /// How many recent steps to show
    pub history_window: usize,
    pub observation: &'a Observation,
    /// The only actions the client may choose from
    pub actions: Vec<&'a ActionSpec>,
    /// Most actions that will be executed this turn
    pub max_actions: usize,
    /// 1-based number of the step being decided
    pub step: usize,
    pub max_steps: usize,
}

impl DecisionRequest<'_> {
    /// Recent history rendered as text
    pub fn history_summary(&self) -> String {
        self.history.summarize(self.history_window)
    }

    /// Whether `name` is one of the offered actions
    pub fn offers(&self, name: &str) -> bool {
        self.actions.iter().any(|a| a.name() == name)
    }

    /// Offered actions as function-calling definitions
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.actions.iter().map(|a| a.tool_definition()).collect()
    }

    /// Reject decisions that name actions outside the offered set
    pub fn check(&self, decision: &Decision) -> Result<()> {
        match decision.invocations.iter().find(|i| !self.offers(&i.name)) {
            Some(invocation) => Err(PilotError::decision_format(format!(
                "action '{}' is not available",
                invocation.name
            ))),
            None => Ok(()),
        }
    }
}

/// Source of decisions, usually backed by a language model
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Decide the next move.
    ///
    /// Errors end the run: return `ReasoningUnavailable` when the backend
    /// cannot be reached and `DecisionFormat` when its answer is unusable.
    async fn decide(&self, request: &DecisionRequest<'_>) -> Result<Decision>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionRegistry, ParamSchema};
    use crate::core::ActionResult;
    use serde_json::json;

    #[test]
    fn test_check_rejects_unoffered_action() {
        let registry = ActionRegistry::new()
            .with_action(ActionSpec::from_fn(
                "go_to_webpage",
                "Go to the webpage",
                ParamSchema::new(),
                |_| Ok(ActionResult::text("https://robinhood.com")),
            ))
            .unwrap();
        let task = Task::new("t");
        let history = History::new(task.clone());
        let observation = Observation::text("blank");
        let request = DecisionRequest {
            task: &task,
            history: &history,
            history_window: 5,
            observation: &observation,
            actions: registry.list_specs().collect(),
            max_actions: 1,
            step: 1,
            max_steps: 5,
        };

        let ok = Decision::act("go", vec![ActionInvocation::new("go_to_webpage", json!({}))]);
        assert!(request.check(&ok).is_ok());

        let bad = Decision::act("fly", vec![ActionInvocation::new("fly", json!({}))]);
        assert!(matches!(
            request.check(&bad),
            Err(PilotError::DecisionFormat(_))
        ));
        assert_eq!(request.tool_definitions().len(), 1);
    }

    #[test]
    fn test_decision_deserializes_with_defaults() {
        let decision: Decision = serde_json::from_str(r#"{"done": true, "result": {"stocks": []}}"#).unwrap();
        assert!(decision.done);
        assert!(decision.invocations.is_empty());
        assert_eq!(decision.result, Some(json!({"stocks": []})));
    }
}
