//! `console` action: writes a log line.
//!
//! ```json
//! { "console": { "priority": "high", "message": "{{ payload.hits.total }} errors" } }
//! ```
//!
//! `priority` selects the level (`high` → warn, `medium` → info, `low` →
//! debug; default medium). Without a `message` the payload is logged as JSON.

use serde::Deserialize;

use crate::templating::{TemplateContext, TemplateRenderer};
use crate::traits::{Action, ActionHandler, NotifyError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Default, Deserialize)]
struct ConsoleSettings {
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    message: Option<String>,
}

/// Logs each action through `tracing`.
#[derive(Debug, Default)]
pub struct ConsoleHandler {
    renderer: TemplateRenderer,
}

impl ConsoleHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The line that would be logged for `action`, with its priority.
    pub fn render(&self, action: &Action<'_>) -> Result<(Priority, String), NotifyError> {
        let settings: ConsoleSettings = if action.settings.is_null() {
            ConsoleSettings::default()
        } else {
            serde_json::from_value(action.settings.clone())
                .map_err(|e| NotifyError::Config(format!("invalid console settings: {e}")))?
        };

        let line = match settings.message.as_deref() {
            Some(template) => self
                .renderer
                .render(template, &TemplateContext::from_action(action))?,
            None => action.payload.to_string(),
        };
        Ok((settings.priority, line))
    }
}

#[async_trait::async_trait]
impl ActionHandler for ConsoleHandler {
    async fn handle(&self, action: &Action<'_>) -> Result<(), NotifyError> {
        let (priority, line) = self.render(action)?;
        match priority {
            Priority::High => tracing::warn!(watcher_id = action.watcher_id, action = action.name, "{line}"),
            Priority::Medium => tracing::info!(watcher_id = action.watcher_id, action = action.name, "{line}"),
            Priority::Low => tracing::debug!(watcher_id = action.watcher_id, action = action.name, "{line}"),
        }
        Ok(())
    }

    fn kind(&self) -> &str {
        "console"
    }
}
