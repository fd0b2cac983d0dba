//! Agent loop state management
//!
//! Tracks step budget, run status and consecutive failures for one run.

use crate::agent::history::{AgentStatus, Step};

/// State of one agent run, owned by the execution loop
#[derive(Debug, Clone)]
pub struct AgentState {
    /// Steps completed so far
    pub step: usize,
    /// Maximum allowed steps
    pub max_steps: usize,
    /// Maximum executed actions per step
    pub max_actions_per_step: usize,
    pub status: AgentStatus,
    /// Steps in a row where every proposed action failed
    pub consecutive_failures: usize,
    /// Fail the run once `consecutive_failures` reaches this
    pub max_consecutive_failures: Option<usize>,
    /// Reason the run failed, if it did
    pub failure: Option<String>,
}

impl AgentState {
    /// Create a new state with the given budgets
    pub fn new(max_steps: usize, max_actions_per_step: usize) -> Self {
        Self {
            step: 0,
            max_steps,
            max_actions_per_step,
            status: AgentStatus::Running,
            consecutive_failures: 0,
            max_consecutive_failures: None,
            failure: None,
        }
    }

    /// Set the consecutive-failure cap
    pub fn with_failure_cap(mut self, cap: Option<usize>) -> Self {
        self.max_consecutive_failures = cap;
        self
    }

    /// Check if the loop should start another step
    pub fn should_continue(&self) -> bool {
        self.status == AgentStatus::Running && self.step < self.max_steps
    }

    /// Account for a finished step and apply the transition rules
    pub fn complete_step(&mut self, step: &Step) {
        self.step += 1;

        if step.all_actions_failed() {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }

        if step.decision.done {
            self.status = AgentStatus::Done;
        } else if let Some(cap) = self
            .max_consecutive_failures
            .filter(|&cap| self.consecutive_failures >= cap)
        {
            self.fail(format!("{} consecutive steps failed", cap));
        }
    }

    /// End the run as failed
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = AgentStatus::Failed;
        self.failure = Some(reason.into());
    }

    /// End the run as cancelled
    pub fn cancel(&mut self) {
        self.status = AgentStatus::Cancelled;
    }

    /// Settle a run that left the loop while still running
    pub fn finish(&mut self) {
        if self.status == AgentStatus::Running {
            self.status = AgentStatus::StepsExhausted;
        }
    }
}
