//! Actions module - what the agent is allowed to do
//!
//! Contains parameter schemas, the action registry, and the built-in browser
//! actions.

pub mod browser;
pub mod registry;
pub mod schema;

pub use browser::{browser_actions, register_browser_actions};
pub use registry::{ActionHandler, ActionRegistry, ActionSpec, BoundAction, DuplicatePolicy};
pub use schema::{FieldSpec, FieldType, ParamSchema, ValidatedArgs};
