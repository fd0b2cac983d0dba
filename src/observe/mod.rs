//! Observe module - how the agent sees its environment
//!
//! The agent never inspects the environment directly; it asks an
//! [`EnvironmentObserver`] before every decision.

mod browser;

pub use browser::BrowserObserver;

use async_trait::async_trait;

use crate::core::{Observation, Result};

/// Captures the current state of the environment.
///
/// One observer drives one session and belongs to one agent.
#[async_trait]
pub trait EnvironmentObserver: Send + Sync {
    /// Observe the environment, with a screenshot when `include_visual` is set
    async fn observe(&self, include_visual: bool) -> Result<Observation>;
}
