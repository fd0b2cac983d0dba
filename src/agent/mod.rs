//! Agent module - execution loop, decisions and run history
//!
//! Contains the main agent logic that coordinates observation, reasoning and
//! action execution.

pub mod history;
pub mod loop_state;
pub mod orchestrator;
pub mod reasoning;

pub use history::{ActionFailure, ActionOutcome, ActionRecord, AgentStatus, History, Step};
pub use loop_state::AgentState;
pub use orchestrator::{Agent, AgentBuilder};
pub use reasoning::{Decision, DecisionRequest, ReasoningClient};
