//! LLM module - Language Model integrations
//!
//! Provides the provider abstraction, the Ollama backend, and the reasoning
//! client that drives the agent from a function-calling model.

pub mod ollama;
pub mod reasoner;
pub mod traits;

pub use ollama::OllamaClient;
pub use reasoner::{LlmReasoner, DONE_TOOL};
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};
