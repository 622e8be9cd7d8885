//! Minijinja rendering for action message templates.
//!
//! Templates are arbitrary strings from watcher definitions (not
//! pre-registered), so a fresh [`minijinja::Environment`] is created per
//! render call. Templates see `payload`, `watcher_id`, `watcher` and `action`.

use serde_json::Value;

use crate::traits::{Action, NotifyError};

/// Context data available to action templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext<'a> {
    pub watcher_id: &'a str,
    pub action: &'a str,
    pub payload: &'a Value,
    pub watcher: WatcherContext<'a>,
}

/// Watcher metadata exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WatcherContext<'a> {
    pub title: Option<&'a str>,
    pub uuid: Option<&'a str>,
}

impl<'a> TemplateContext<'a> {
    pub fn from_action(action: &Action<'a>) -> Self {
        Self {
            watcher_id: action.watcher_id,
            action: action.name,
            payload: action.payload,
            watcher: WatcherContext {
                title: action.watcher.title.as_deref(),
                uuid: action.watcher.uuid.as_deref(),
            },
        }
    }
}

/// Renders action templates using minijinja.
#[derive(Debug, Default)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("round", round_filter);
        env.add_filter("json", json_filter);
        env
    }

    /// Render a template string with the given context.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render(&self, template_str: &str, ctx: &TemplateContext<'_>) -> Result<String, NotifyError> {
        Self::build_env()
            .render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }
}

/// Round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

/// Serialize any value as compact JSON.
fn json_filter(value: minijinja::Value) -> Result<String, minijinja::Error> {
    serde_json::to_string(&value).map_err(|e| {
        minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, e.to_string())
    })
}
