//! Taskpilot - Budgeted Browser Automation Agent
//!
//! Hands a natural-language task and a set of actions to an agent that
//! observes its environment, asks a reasoning model for the next move,
//! executes the chosen actions and records every step.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **Actions**: Parameter schemas, the action registry, built-in browser actions
//! - **Agent**: Execution loop, decisions, and run history
//! - **LLM**: LLM provider abstraction with Ollama and the LLM reasoner
//! - **Observe**: Environment observers
//! - **Browser**: agent-browser CLI wrapper
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use taskpilot::actions::{ActionRegistry, ActionSpec, FieldType, ParamSchema};
//! use taskpilot::browser::BrowserExecutor;
//! use taskpilot::core::{ActionResult, Config, Task};
//! use taskpilot::llm::{LlmReasoner, OllamaClient};
//! use taskpilot::observe::BrowserObserver;
//! use taskpilot::Agent;
//!
//! #[tokio::main]
//! async fn main() -> taskpilot::Result<()> {
//!     let config = Config::load();
//!
//!     let registry = ActionRegistry::new().with_action(ActionSpec::from_fn(
//!         "go_to_webpage",
//!         "Go to the webpage",
//!         ParamSchema::new().with_default(
//!             "link",
//!             FieldType::Url,
//!             "Webpage link",
//!             "https://robinhood.com".into(),
//!         ),
//!         |args| Ok(ActionResult::text(args.get_str("link").unwrap_or_default())),
//!     ))?;
//!
//!     let browser = Arc::new(BrowserExecutor::from_config(&config.browser));
//!     let provider = Arc::new(OllamaClient::from_config(&config)?);
//!
//!     let agent = Agent::builder(Task::new("Return my stock holdings as JSON"))
//!         .registry(Arc::new(registry))
//!         .reasoner(Arc::new(LlmReasoner::from_config(provider, &config)))
//!         .observer(Arc::new(BrowserObserver::new(browser)))
//!         .build()?;
//!
//!     let history = agent.run(5, 1).await?;
//!     match history.final_result() {
//!         Some(result) => println!("{}", result),
//!         None => println!("No result"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod agent;
pub mod browser;
pub mod core;
pub mod llm;
pub mod observe;

// Re-export commonly used items
pub use agent::{Agent, History};
pub use core::{Config, PilotError, Result};
