//! Browser observer
//!
//! Observes an agent-browser session: URL, title, interactive accessibility
//! snapshot and, with vision, a viewport screenshot.

use std::sync::Arc;

use async_trait::async_trait;

use crate::browser::BrowserExecutor;
use crate::core::{Observation, PilotError, Result};
use crate::observe::EnvironmentObserver;

const NO_PAGE: &str = "No page is open yet. Navigate to a URL first.";

/// Observer over one agent-browser session
#[derive(Debug, Clone)]
pub struct BrowserObserver {
    browser: Arc<BrowserExecutor>,
}

impl BrowserObserver {
    pub fn new(browser: Arc<BrowserExecutor>) -> Self {
        Self { browser }
    }
}

fn is_blank_page(url: &str) -> bool {
    let url = url.trim();
    url.is_empty() || url == "about:blank"
}

#[async_trait]
impl EnvironmentObserver for BrowserObserver {
    async fn observe(&self, include_visual: bool) -> Result<Observation> {
        let snapshot = match self.browser.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // A fresh session still answers with a blank URL.
                match self.browser.get_url().await {
                    Ok(url) if is_blank_page(&url) => {
                        tracing::debug!(error = %e, "no page to observe");
                        return Ok(Observation::text(NO_PAGE));
                    }
                    _ => return Err(PilotError::observation(e.to_string())),
                }
            }
        };

        tracing::debug!(
            session = self.browser.session_name(),
            elements = snapshot.count_elements(),
            "captured snapshot"
        );

        let url = self.browser.get_url().await.ok();
        let title = self.browser.get_title().await.ok();

        let image = if include_visual {
            match self.browser.screenshot_base64().await {
                Ok(image) if !image.is_empty() => Some(image),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(error = %e, "screenshot failed, continuing without image");
                    None
                }
            }
        } else {
            None
        };

        Ok(Observation {
            text: snapshot.render(),
            url,
            title,
            image,
        })
    }
}
