//! Report / alert action classification.

use indexmap::IndexMap;
use serde_json::Value;

/// Settings key marking an action as report-class.
pub const REPORT_MARKER: &str = "report";

/// Split actions into `(report, other)` by the presence of a `report` key
/// in each action's settings. Only presence counts, not the key's value.
/// Settings that are not objects are never report-class.
pub fn classify(actions: &IndexMap<String, Value>) -> (IndexMap<String, Value>, IndexMap<String, Value>) {
    let mut report = IndexMap::new();
    let mut other = IndexMap::new();
    for (name, settings) in actions {
        let target = if is_report(settings) { &mut report } else { &mut other };
        target.insert(name.clone(), settings.clone());
    }
    (report, other)
}

fn is_report(settings: &Value) -> bool {
    settings
        .as_object()
        .is_some_and(|map| map.contains_key(REPORT_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn actions(value: Value) -> IndexMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn partitions_by_report_key_presence() {
        let input = actions(json!({
            "daily_pdf": { "report": { "to": "ops@example.com" } },
            "email_admin": { "email": { "to": "admin@example.com" } },
            "disabled_report": { "report": false },
        }));
        let (report, other) = classify(&input);
        assert_eq!(report.keys().collect::<Vec<_>>(), ["daily_pdf", "disabled_report"]);
        assert_eq!(other.keys().collect::<Vec<_>>(), ["email_admin"]);
    }

    #[test]
    fn every_action_lands_on_exactly_one_side() {
        let input = actions(json!({
            "a": { "report": {} },
            "b": "not an object",
            "c": null,
            "d": { "console": { "priority": "high" } },
        }));
        let (report, other) = classify(&input);
        assert_eq!(report.len() + other.len(), input.len());
        assert!(report.contains_key("a"));
        assert!(other.contains_key("b") && other.contains_key("c") && other.contains_key("d"));
    }

    #[test]
    fn empty_actions_yield_empty_sides() {
        let (report, other) = classify(&IndexMap::new());
        assert!(report.is_empty() && other.is_empty());
    }
}
