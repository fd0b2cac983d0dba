//! Built-in browser actions
//!
//! Registers the standard navigation and interaction actions against one
//! shared agent-browser session.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::actions::registry::{ActionHandler, ActionRegistry, ActionSpec};
use crate::actions::schema::{FieldType, ParamSchema, ValidatedArgs};
use crate::browser::BrowserExecutor;
use crate::core::{ActionResult, Result};

#[derive(Debug, Clone, Copy)]
enum BrowserOp {
    GoToUrl,
    GoBack,
    Click,
    InputText,
    GetText,
    Scroll,
    PressKey,
    WaitForText,
}

struct BrowserAction {
    browser: Arc<BrowserExecutor>,
    op: BrowserOp,
}

// Required fields are guaranteed present by schema validation.
fn arg<'a>(args: &'a ValidatedArgs, key: &str) -> &'a str {
    args.get_str(key).unwrap_or_default()
}

#[async_trait]
impl ActionHandler for BrowserAction {
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionResult> {
        let browser = &self.browser;
        match self.op {
            BrowserOp::GoToUrl => {
                let url = arg(&args, "url");
                browser.open(url).await?;
                Ok(ActionResult::text(format!("Navigated to {}", url)))
            }
            BrowserOp::GoBack => {
                browser.back().await?;
                Ok(ActionResult::text("Navigated back"))
            }
            BrowserOp::Click => {
                let ref_id = arg(&args, "ref");
                browser.click(ref_id).await?;
                Ok(ActionResult::text(format!("Clicked {}", ref_id)))
            }
            BrowserOp::InputText => {
                let ref_id = arg(&args, "ref");
                let text = arg(&args, "text");
                browser.fill(ref_id, text).await?;
                Ok(ActionResult::text(format!("Filled {} with '{}'", ref_id, text)))
            }
            BrowserOp::GetText => {
                let ref_id = arg(&args, "ref");
                let text = browser.get_text(ref_id).await?;
                Ok(ActionResult::with_data(
                    format!("Text of {}: {}", ref_id, text),
                    json!({ "ref": ref_id, "text": text }),
                ))
            }
            BrowserOp::Scroll => {
                let direction = arg(&args, "direction");
                let pixels = args
                    .get_i64("pixels")
                    .and_then(|px| u32::try_from(px).ok());
                browser.scroll(direction, pixels).await?;
                Ok(ActionResult::text(format!("Scrolled {}", direction)))
            }
            BrowserOp::PressKey => {
                let key = arg(&args, "key");
                browser.press(key).await?;
                Ok(ActionResult::text(format!("Pressed {}", key)))
            }
            BrowserOp::WaitForText => {
                let text = arg(&args, "text");
                browser.wait_for_text(text).await?;
                Ok(ActionResult::text(format!("Text '{}' is now visible", text)))
            }
        }
    }
}

fn spec(
    browser: &Arc<BrowserExecutor>,
    op: BrowserOp,
    name: &str,
    description: &str,
    schema: ParamSchema,
) -> ActionSpec {
    let handler = BrowserAction {
        browser: Arc::clone(browser),
        op,
    };
    ActionSpec::new(name, description, schema, Arc::new(handler))
}

/// Specs for every built-in browser action
pub fn browser_actions(browser: Arc<BrowserExecutor>) -> Vec<ActionSpec> {
    let element_ref = "Element ref from the page snapshot (e.g. e5)";
    vec![
        spec(
            &browser,
            BrowserOp::GoToUrl,
            "go_to_url",
            "Navigate the current tab to a URL",
            ParamSchema::new().required("url", FieldType::Url, "The URL to navigate to"),
        ),
        spec(
            &browser,
            BrowserOp::GoBack,
            "go_back",
            "Go back to the previous page",
            ParamSchema::new(),
        ),
        spec(
            &browser,
            BrowserOp::Click,
            "click_element",
            "Click an element by its ref from the snapshot",
            ParamSchema::new().required("ref", FieldType::String, element_ref),
        ),
        spec(
            &browser,
            BrowserOp::InputText,
            "input_text",
            "Type text into an input field by its ref",
            ParamSchema::new()
                .required("ref", FieldType::String, element_ref)
                .required("text", FieldType::String, "Text to enter"),
        ),
        spec(
            &browser,
            BrowserOp::GetText,
            "get_text",
            "Read the text content of an element",
            ParamSchema::new().required("ref", FieldType::String, element_ref),
        ),
        spec(
            &browser,
            BrowserOp::Scroll,
            "scroll",
            "Scroll the page",
            ParamSchema::new()
                .with_default(
                    "direction",
                    FieldType::String,
                    "up, down, left or right",
                    json!("down"),
                )
                .optional("pixels", FieldType::Integer, "Distance in pixels"),
        ),
        spec(
            &browser,
            BrowserOp::PressKey,
            "press_key",
            "Press a keyboard key (e.g. Enter, Escape, Tab)",
            ParamSchema::new().required("key", FieldType::String, "Key name"),
        ),
        spec(
            &browser,
            BrowserOp::WaitForText,
            "wait_for_text",
            "Wait until the given text is visible on the page",
            ParamSchema::new().required("text", FieldType::String, "Text to wait for"),
        ),
    ]
}

/// Register the built-in browser actions
pub fn register_browser_actions(
    registry: &mut ActionRegistry,
    browser: Arc<BrowserExecutor>,
) -> Result<()> {
    for spec in browser_actions(browser) {
        registry.register(spec)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PilotError;

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        register_browser_actions(&mut registry, Arc::new(BrowserExecutor::new("test"))).unwrap();
        registry
    }

    #[test]
    fn test_browser_actions_registered() {
        let registry = registry();
        for name in [
            "go_to_url",
            "go_back",
            "click_element",
            "input_text",
            "get_text",
            "scroll",
            "press_key",
            "wait_for_text",
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_go_to_url_rejects_bad_url() {
        let err = registry()
            .resolve("go_to_url", &json!({"url": "robinhood"}))
            .err()
            .unwrap();
        assert!(matches!(err, PilotError::Validation { .. }));
    }

    #[test]
    fn test_scroll_defaults_direction() {
        let bound = registry().resolve("scroll", &json!({})).unwrap();
        assert_eq!(bound.args().get_str("direction"), Some("down"));
    }
}
