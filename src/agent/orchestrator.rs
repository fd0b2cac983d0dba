//! Agent orchestrator
//!
//! Runs the observe → reason → act loop for one task under step and
//! per-step action budgets.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actions::ActionRegistry;
use crate::agent::history::{ActionOutcome, ActionRecord, History, Step};
use crate::agent::loop_state::AgentState;
use crate::agent::reasoning::{DecisionRequest, ReasoningClient};
use crate::core::config::{validate_budgets, AgentConfig};
use crate::core::{ActionInvocation, PilotError, Result, Task};
use crate::observe::EnvironmentObserver;

/// Goal-directed agent over a registry of actions
pub struct Agent {
    task: Task,
    registry: Arc<ActionRegistry>,
    reasoner: Arc<dyn ReasoningClient>,
    observer: Arc<dyn EnvironmentObserver>,
    use_vision: bool,
    history_window: usize,
    max_consecutive_failures: Option<usize>,
    cancel: CancellationToken,
}

/// Builder for creating Agents
pub struct AgentBuilder {
    task: Task,
    registry: Option<Arc<ActionRegistry>>,
    reasoner: Option<Arc<dyn ReasoningClient>>,
    observer: Option<Arc<dyn EnvironmentObserver>>,
    use_vision: bool,
    history_window: usize,
    max_consecutive_failures: Option<usize>,
    cancel: Option<CancellationToken>,
}

impl AgentBuilder {
    /// Create a new builder for the given task
    pub fn new(task: Task) -> Self {
        Self {
            task,
            registry: None,
            reasoner: None,
            observer: None,
            use_vision: true,
            history_window: 10,
            max_consecutive_failures: None,
            cancel: None,
        }
    }

    /// Set the action registry (defaults to an empty one)
    pub fn registry(mut self, registry: Arc<ActionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the reasoning client
    pub fn reasoner(mut self, reasoner: Arc<dyn ReasoningClient>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    /// Set the environment observer
    pub fn observer(mut self, observer: Arc<dyn EnvironmentObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Ask the observer for screenshots
    pub fn use_vision(mut self, enabled: bool) -> Self {
        self.use_vision = enabled;
        self
    }

    /// Number of recent steps shown to the reasoner
    pub fn history_window(mut self, steps: usize) -> Self {
        self.history_window = steps;
        self
    }

    /// Fail the run after this many steps in a row where every action failed
    pub fn max_consecutive_failures(mut self, cap: Option<usize>) -> Self {
        self.max_consecutive_failures = cap;
        self
    }

    /// Share a cancellation token with the caller
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Apply agent settings from configuration
    pub fn config(self, config: &AgentConfig) -> Self {
        self.use_vision(config.use_vision)
            .history_window(config.history_window)
            .max_consecutive_failures(config.max_consecutive_failures)
    }

    /// Build the Agent
    pub fn build(self) -> Result<Agent> {
        let reasoner = self
            .reasoner
            .ok_or_else(|| PilotError::config("Agent needs a reasoning client"))?;
        let observer = self
            .observer
            .ok_or_else(|| PilotError::config("Agent needs an environment observer"))?;

        if self.max_consecutive_failures == Some(0) {
            return Err(PilotError::config(
                "max_consecutive_failures must be at least 1 when set",
            ));
        }

        Ok(Agent {
            task: self.task,
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(ActionRegistry::new())),
            reasoner,
            observer,
            use_vision: self.use_vision,
            history_window: self.history_window,
            max_consecutive_failures: self.max_consecutive_failures,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

impl Agent {
    /// Create a builder for the given task
    pub fn builder(task: Task) -> AgentBuilder {
        AgentBuilder::new(task)
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Token that stops the run before its next step when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the task.
    ///
    /// Only invalid budgets return `Err`. Collaborator failures end the run
    /// as `Failed` and the partial history is returned.
    pub async fn run(&self, max_steps: usize, max_actions_per_step: usize) -> Result<History> {
        validate_budgets(max_steps, max_actions_per_step)?;

        let mut state = AgentState::new(max_steps, max_actions_per_step)
            .with_failure_cap(self.max_consecutive_failures);
        let mut history = History::new(self.task.clone());

        info!(
            max_steps,
            max_actions_per_step,
            actions = self.registry.len(),
            "starting agent run"
        );

        while state.should_continue() {
            if self.cancel.is_cancelled() {
                info!(step = state.step, "run cancelled");
                state.cancel();
                break;
            }

            let number = state.step + 1;
            info!(step = number, max_steps, "step");

            match self.step(number, &state, &history).await {
                Ok(step) => {
                    for error in step.errors() {
                        warn!(step = number, %error, "action failed");
                    }
                    state.complete_step(&step);
                    history.push(step);
                }
                Err(e) => {
                    warn!(step = number, error = %e, "run failed");
                    state.fail(e.to_string());
                }
            }
        }

        state.finish();
        info!(status = %state.status, steps = history.len(), "agent run finished");
        history.finish(state.status, state.failure);

        Ok(history)
    }

    /// One observe-reason-act cycle. `Err` only for collaborator failures.
    async fn step(&self, number: usize, state: &AgentState, history: &History) -> Result<Step> {
        let observation = self.observer.observe(self.use_vision).await?;

        let decision = {
            let request = DecisionRequest {
                task: &self.task,
                history,
                history_window: self.history_window,
                observation: &observation,
                actions: self.registry.list_specs().collect(),
                max_actions: state.max_actions_per_step,
                step: number,
                max_steps: state.max_steps,
            };
            self.reasoner.decide(&request).await?
        };

        debug!(
            step = number,
            rationale = %decision.rationale,
            invocations = decision.invocations.len(),
            done = decision.done,
            "decision"
        );

        let actions = self
            .execute_actions(&decision.invocations, state.max_actions_per_step)
            .await;

        Ok(Step {
            number,
            observation,
            decision,
            actions,
        })
    }

    /// Execute invocations sequentially in the given order.
    ///
    /// Invocations past the budget are recorded as `BudgetExceeded` and
    /// never run.
    async fn execute_actions(
        &self,
        invocations: &[ActionInvocation],
        max_actions: usize,
    ) -> Vec<ActionRecord> {
        let mut records = Vec::with_capacity(invocations.len());

        for (i, invocation) in invocations.iter().enumerate() {
            let outcome: ActionOutcome = if i >= max_actions {
                PilotError::BudgetExceeded {
                    action: invocation.name.clone(),
                    limit: max_actions,
                }
                .into()
            } else {
                self.execute_action(invocation).await
            };

            records.push(ActionRecord {
                invocation: invocation.clone(),
                outcome,
            });
        }

        records
    }

    async fn execute_action(&self, invocation: &ActionInvocation) -> ActionOutcome {
        debug!(action = %invocation.name, arguments = %invocation.arguments, "executing");

        let bound = match self.registry.resolve(&invocation.name, &invocation.arguments) {
            Ok(bound) => bound,
            Err(e) => return e.into(),
        };

        match bound.execute().await {
            Ok(result) => ActionOutcome::Completed(result),
            Err(e) => e.into(),
        }
    }
}

impl From<PilotError> for ActionOutcome {
    fn from(error: PilotError) -> Self {
        ActionOutcome::Failed(error.into())
    }
}
