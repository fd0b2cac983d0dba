//! LLM-backed reasoning client
//!
//! Turns a decision request into a tool-calling chat, and the model's tool
//! calls back into a [`Decision`]. Completion is signalled through a
//! built-in `done` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::{Decision, DecisionRequest, ReasoningClient};
use crate::core::{Config, Message, PilotError, Result, ToolDefinition};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse};

/// Name of the built-in completion tool
pub const DONE_TOOL: &str = "done";

/// Reasoning client that asks a function-calling model
pub struct LlmReasoner {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
    /// Reject decisions naming actions that were not offered
    strict: bool,
}

impl LlmReasoner {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.1,
            strict: true,
        }
    }

    /// Create a reasoner using the configured model and settings
    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &Config) -> Self {
        Self {
            provider,
            model: config.models.reasoner.clone(),
            temperature: config.models.temperature,
            strict: config.agent.strict_actions,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn done_tool() -> ToolDefinition {
        ToolDefinition::function(
            DONE_TOOL,
            "Finish the task and return the final result. Call this once the task is complete.",
            json!({
                "type": "object",
                "properties": {
                    "result": {
                        "description": "The final answer, in the requested output format"
                    }
                },
                "required": ["result"]
            }),
        )
    }

    fn system_prompt(request: &DecisionRequest<'_>) -> String {
        let output_format = match &request.task.output_schema {
            Some(schema) => format!(
                "\n## Output Format\nWhen calling `{}`, `result` MUST match this JSON shape:\n{}\n",
                DONE_TOOL,
                serde_json::to_string_pretty(schema).unwrap_or_default()
            ),
            None => String::new(),
        };

        format!(
            r#"You are a browser automation agent that completes tasks by calling tools.
Each turn:
1. THINK about the current page and what the previous actions achieved.
2. ACT by calling at most {max} tool(s). They run in the order you give them.
3. When the task is complete, call `{done}` with the final result.

## Rules
- Only call the tools you are given.
- Use EXACT element refs from the current page snapshot (e.g. `e5`).
- If an action failed, read the error in the history and try something else.
- You have {remaining} step(s) left including this one. Call `{done}` with your best result before they run out.
{output_format}"#,
            max = request.max_actions,
            done = DONE_TOOL,
            remaining = request.max_steps.saturating_sub(request.step) + 1,
            output_format = output_format,
        )
    }

    fn user_message(request: &DecisionRequest<'_>) -> Message {
        let mut content = format!("## Task\n{}\n", request.task.goal);

        let history = request.history_summary();
        if !history.is_empty() {
            content.push_str("\n## Previous Steps\n");
            content.push_str(&history);
        }

        content.push_str(&format!(
            "\n## Current State (step {}/{})\n",
            request.step, request.max_steps
        ));
        if let Some(url) = &request.observation.url {
            content.push_str(&format!("URL: {}\n", url));
        }
        if let Some(title) = &request.observation.title {
            content.push_str(&format!("Title: {}\n", title));
        }
        content.push_str(&request.observation.text);

        let message = Message::user(content);
        match &request.observation.image {
            Some(image) => message.with_image(image.clone()),
            None => message,
        }
    }

    /// Convert the model's reply into a decision
    fn to_decision(&self, response: LLMResponse) -> Result<Decision> {
        let rationale = response.content.trim().to_string();

        if response.tool_calls.is_empty() {
            // No tool calls = final answer
            if rationale.is_empty() {
                return Err(PilotError::decision_format(
                    "model returned neither tool calls nor an answer",
                ));
            }
            let result = parse_payload(&rationale);
            return Ok(Decision::complete(rationale, result));
        }

        let mut decision = Decision::act(rationale, Vec::new());
        for call in response.tool_calls {
            if call.name == DONE_TOOL {
                decision.done = true;
                decision.result = Some(match call.arguments.get("result") {
                    Some(Value::String(text)) => parse_payload(text),
                    Some(Value::Null) | None => {
                        return Err(PilotError::decision_format(format!(
                            "`{}` called without a result",
                            DONE_TOOL
                        )))
                    }
                    Some(value) => value.clone(),
                });
            } else {
                decision.invocations.push(call);
            }
        }

        Ok(decision)
    }
}

/// Parse a textual answer as JSON when it is JSON, tolerating code fences
fn parse_payload(text: &str) -> Value {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

#[async_trait]
impl ReasoningClient for LlmReasoner {
    async fn decide(&self, request: &DecisionRequest<'_>) -> Result<Decision> {
        if request.offers(DONE_TOOL) {
            return Err(PilotError::config(format!(
                "action name '{}' is reserved for task completion",
                DONE_TOOL
            )));
        }

        let messages = vec![
            Message::system(Self::system_prompt(request)),
            Self::user_message(request),
        ];

        let mut tools = request.tool_definitions();
        tools.push(Self::done_tool());

        let response = self
            .provider
            .chat_with_tools(
                &self.model,
                &messages,
                &tools,
                Some(GenerateOptions {
                    temperature: Some(self.temperature), // Low temperature for tool selection
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| PilotError::reasoning_unavailable(e.to_string()))?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                provider = self.provider.name(),
                total_tokens = usage.total_tokens,
                "reasoner usage"
            );
        }

        let decision = self.to_decision(response)?;
        if self.strict {
            request.check(&decision)?;
        }
        Ok(decision)
    }
}
