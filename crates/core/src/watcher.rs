//! Stored watcher definitions.
//!
//! A watcher is an alert definition kept in the watcher index: when to run
//! (`trigger`), what to query (`input`), when to react (`condition`), how to
//! reshape the result (`transform`) and what to do (`actions`).
//!
//! Fields the scheduler does not interpret are retained in `extra` so that
//! two snapshots compare equal only when the whole stored document is equal.
//!
//! Decoding is per field: a sub-tree of the wrong shape reads as absent
//! instead of discarding the whole definition, and `disable`/`report` follow
//! JavaScript truthiness.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::WatchkeeperError;

/// One hit from the watcher index: the document id plus its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source", default)]
    pub source: Option<WatcherDefinition>,
}

impl WatcherHit {
    pub fn new(id: impl Into<String>, source: WatcherDefinition) -> Self {
        Self {
            id: id.into(),
            source: Some(source),
        }
    }

    /// Parse a raw `{_id, _source}` hit.
    pub fn from_value(value: Value) -> Result<Self, WatchkeeperError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// A watcher definition as stored in the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatcherDefinition {
    #[serde(default, deserialize_with = "truthy")]
    pub disable: bool,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub input: Option<Input>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub condition: Option<ScriptHolder>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    /// Action name → opaque action settings.
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub actions: IndexMap<String, Value>,
    /// Global report flag: report-class actions run without a search.
    #[serde(default, deserialize_with = "truthy")]
    pub report: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WatcherDefinition {
    /// `trigger.schedule`, if present.
    pub fn schedule(&self) -> Option<&TriggerSchedule> {
        self.trigger.as_ref()?.schedule.as_ref()
    }

    /// `input.search.request`, if present.
    pub fn search_request(&self) -> Option<&Value> {
        self.input.as_ref()?.search.as_ref()?.request.as_ref()
    }

    /// `condition.script.script`, if present.
    pub fn condition_script(&self) -> Option<&str> {
        self.condition
            .as_ref()?
            .script
            .as_ref()?
            .script
            .as_deref()
    }

    /// `transform.script.script`, if present.
    pub fn transform_script(&self) -> Option<&str> {
        self.transform
            .as_ref()?
            .script
            .as_ref()?
            .script
            .as_deref()
    }

    /// `transform.search.request`, if present.
    pub fn transform_request(&self) -> Option<&Value> {
        self.transform.as_ref()?.search.as_ref()?.request.as_ref()
    }

    /// Label used in log lines: the uuid when set, otherwise the title.
    pub fn label(&self) -> &str {
        self.uuid
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("<unnamed>")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub schedule: Option<TriggerSchedule>,
}

/// When a watcher runs: a recurrence phrase (`later`) or a fixed interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerSchedule {
    /// Human-readable recurrence phrase or cron expression.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub later: Option<String>,
    /// Interval in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<IntervalValue>,
}

/// Interval as stored: documents carry both numbers and numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntervalValue {
    Number(f64),
    Text(String),
    Other(Value),
}

impl IntervalValue {
    /// Whole number of seconds, or `None` when the value is not integral.
    pub fn whole_seconds(&self) -> Option<u64> {
        let n = match self {
            IntervalValue::Number(n) => *n,
            IntervalValue::Text(s) => s.trim().parse::<f64>().ok()?,
            IntervalValue::Other(_) => return None,
        };
        if n.is_finite() && n >= 0.0 && n.fract() == 0.0 {
            Some(n as u64)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptHolder {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

/// Optional post-condition step: a script over the payload or a second search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchInput>,
}

/// Decode `T`, reading a value of the wrong shape as `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

/// JavaScript truthiness of any stored value.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}
