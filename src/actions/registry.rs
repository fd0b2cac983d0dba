//! Action registry - manages and dispatches actions
//!
//! Central hub for registering actions and turning raw invocations into
//! validated, executable calls.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::schema::{ParamSchema, ValidatedArgs};
use crate::core::{ActionResult, PilotError, Result, ToolDefinition};

/// Capability every action implements: run with arguments that already
/// passed the action's schema.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionResult>;
}

type BoxFuture = Pin<Box<dyn Future<Output = Result<ActionResult>> + Send>>;

/// Adapter for plain synchronous functions
struct FnHandler<F>(F);

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(ValidatedArgs) -> Result<ActionResult> + Send + Sync,
{
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionResult> {
        (self.0)(args)
    }
}

/// Adapter for functions returning a future
struct AsyncFnHandler<F>(F);

#[async_trait]
impl<F> ActionHandler for AsyncFnHandler<F>
where
    F: Fn(ValidatedArgs) -> BoxFuture + Send + Sync,
{
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionResult> {
        (self.0)(args).await
    }
}

/// A named, schema-validated operation
#[derive(Clone)]
pub struct ActionSpec {
    name: String,
    description: String,
    schema: ParamSchema,
    handler: Arc<dyn ActionHandler>,
}

impl ActionSpec {
    /// Create a spec around any handler
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ParamSchema,
        handler: Arc<dyn ActionHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler,
        }
    }

    /// Create a spec from a synchronous function
    pub fn from_fn<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ParamSchema,
        f: F,
    ) -> Self
    where
        F: Fn(ValidatedArgs) -> Result<ActionResult> + Send + Sync + 'static,
    {
        Self::new(name, description, schema, Arc::new(FnHandler(f)))
    }

    /// Create a spec from a function returning a boxed future
    pub fn from_async_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ParamSchema,
        f: F,
    ) -> Self
    where
        F: Fn(ValidatedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActionResult>> + Send + 'static,
    {
        let boxed = move |args: ValidatedArgs| -> BoxFuture { Box::pin(f(args)) };
        Self::new(name, description, schema, Arc::new(AsyncFnHandler(boxed)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn schema(&self) -> &ParamSchema {
        &self.schema
    }

    /// Function-calling definition of this action
    pub fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition::function(&self.name, &self.description, self.schema.to_json_schema())
    }
}

impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// What happens when a name is registered twice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Last registration wins
    #[default]
    Override,
    /// Fail with `DuplicateAction`
    Reject,
}

/// An action bound to arguments that passed its schema
pub struct BoundAction {
    name: String,
    args: ValidatedArgs,
    handler: Arc<dyn ActionHandler>,
}

impl BoundAction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &ValidatedArgs {
        &self.args
    }

    /// Run the handler. Handler failures come back as `ActionExecution`.
    pub async fn execute(self) -> Result<ActionResult> {
        self.handler.execute(self.args).await.map_err(|e| match e {
            e @ PilotError::ActionExecution { .. } => e,
            other => PilotError::action(&self.name, other.to_string()),
        })
    }
}

/// Registry of available actions
#[derive(Debug, Default)]
pub struct ActionRegistry {
    /// Specs in registration order
    specs: Vec<ActionSpec>,
    /// Name to position in `specs`
    index: HashMap<String, usize>,
    policy: DuplicatePolicy,
}

impl ActionRegistry {
    /// Create an empty registry that allows overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with an explicit duplicate policy
    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Register an action
    pub fn register(&mut self, spec: ActionSpec) -> Result<()> {
        match self.index.get(spec.name()) {
            Some(_) if self.policy == DuplicatePolicy::Reject => {
                Err(PilotError::DuplicateAction(spec.name().to_string()))
            }
            Some(&pos) => {
                tracing::debug!(action = spec.name(), "overriding registered action");
                self.specs[pos] = spec;
                Ok(())
            }
            None => {
                self.index.insert(spec.name().to_string(), self.specs.len());
                self.specs.push(spec);
                Ok(())
            }
        }
    }

    /// Builder-style registration for setup code
    pub fn with_action(mut self, spec: ActionSpec) -> Result<Self> {
        self.register(spec)?;
        Ok(self)
    }

    /// Look up an action and validate arguments against its schema
    pub fn resolve(&self, name: &str, raw_arguments: &serde_json::Value) -> Result<BoundAction> {
        let spec = self
            .get(name)
            .ok_or_else(|| PilotError::UnknownAction(name.to_string()))?;

        let args = spec
            .schema
            .validate(raw_arguments)
            .map_err(|violations| PilotError::Validation {
                action: name.to_string(),
                violations,
            })?;

        Ok(BoundAction {
            name: spec.name.clone(),
            args,
            handler: Arc::clone(&spec.handler),
        })
    }

    /// Registered specs in registration order. Each call starts a fresh pass.
    pub fn list_specs(&self) -> impl Iterator<Item = &ActionSpec> + '_ {
        self.specs.iter()
    }

    /// Get a spec by name
    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.index.get(name).map(|&pos| &self.specs[pos])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
