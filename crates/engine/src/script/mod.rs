//! Watcher condition and transform scripts.
//!
//! Conditions and transforms are short expressions written by whoever
//! authored the watcher, evaluated against the search payload. The pipeline
//! only depends on the [`ScriptEvaluator`] trait; [`ExpressionEvaluator`] is
//! the built-in implementation, a restricted JavaScript-like expression
//! language over `serde_json::Value`:
//!
//! - literals, arrays, objects, `payload.a.b`, `payload.list[0]`, `.length`
//! - `! - +`, `* / %`, `+ -`, `< <= > >=`, `== != === !==`, `&& ||`, `?:`
//! - `;`-separated statements and assignments (`=`, `+=`, `-=`, `var x = ...`)
//!
//! Transforms take effect by mutating [`Bindings`]; the caller reads the
//! payload back after evaluation.

mod interpreter;
mod lexer;
mod parser;
mod value;

use std::collections::HashMap;

use serde_json::Value;

use interpreter::Interpreter;
use lexer::tokenize;
use parser::parse_program;

pub use value::is_truthy;

/// Name under which the search payload is visible to scripts.
pub const PAYLOAD: &str = "payload";

/// Errors raised while parsing or evaluating a script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("{0} is not defined")]
    UnknownIdentifier(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("invalid assignment target")]
    InvalidAssignment,

    #[error("expression nesting exceeds {0} levels")]
    DepthExceeded(usize),
}

/// Evaluates watcher-authored expressions.
///
/// Implementations may embed a scripting engine, a restricted expression
/// language, or a sandboxed interpreter; the pipeline only sees this contract.
pub trait ScriptEvaluator: Send + Sync {
    /// Evaluate `expression` with access to `bindings`, returning its value.
    fn evaluate(&self, expression: &str, bindings: &mut Bindings) -> Result<Value, ScriptError>;

    /// Check that `expression` is well-formed without running it.
    fn check(&self, _expression: &str) -> Result<(), ScriptError> {
        Ok(())
    }
}

/// Variables visible to a script.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    vars: HashMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings exposing `payload` and nothing else.
    pub fn with_payload(payload: Value) -> Self {
        let mut bindings = Self::new();
        bindings.set(PAYLOAD, payload);
        bindings
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.vars.get_mut(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn payload(&self) -> Option<&Value> {
        self.get(PAYLOAD)
    }

    /// Consume the bindings, returning the (possibly mutated) payload.
    pub fn into_payload(mut self) -> Value {
        self.vars.remove(PAYLOAD).unwrap_or(Value::Null)
    }
}

/// Built-in restricted expression evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptEvaluator for ExpressionEvaluator {
    fn evaluate(&self, expression: &str, bindings: &mut Bindings) -> Result<Value, ScriptError> {
        let program = parse_program(tokenize(expression)?, expression.len())?;
        Interpreter::new(bindings).run(&program)
    }

    fn check(&self, expression: &str) -> Result<(), ScriptError> {
        parse_program(tokenize(expression)?, expression.len()).map(|_| ())
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(expr: &str, payload: Value) -> Result<Value, ScriptError> {
        let mut bindings = Bindings::with_payload(payload);
        ExpressionEvaluator.evaluate(expr, &mut bindings)
    }

    #[test]
    fn hit_count_condition() {
        let payload = json!({ "hits": { "total": 3 } });
        assert_eq!(eval("payload.hits.total > 0", payload.clone()).unwrap(), json!(true));
        assert_eq!(eval("payload.hits.total > 5", payload).unwrap(), json!(false));
    }

    #[test]
    fn compound_condition_with_length() {
        let payload = json!({
            "hits": { "total": 2, "hits": [ { "_source": { "level": "error" } }, {} ] }
        });
        let expr = "payload.hits.hits.length >= 2 && payload.hits.hits[0]._source.level === 'error'";
        assert_eq!(eval(expr, payload).unwrap(), json!(true));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(eval("payload.missing || 'fallback'", json!({})).unwrap(), json!("fallback"));
        assert_eq!(eval("0 && payload.never", json!({})).unwrap(), json!(0));
    }

    #[test]
    fn arithmetic_and_concatenation() {
        assert_eq!(eval("payload.a * 2 + 1", json!({ "a": 4 })).unwrap(), json!(9));
        assert_eq!(eval("'count: ' + payload.a", json!({ "a": 4 })).unwrap(), json!("count: 4"));
        assert_eq!(eval("7 % 4 - 1 / 2", json!({})).unwrap(), json!(2.5));
    }

    #[test]
    fn ternary_selects_branch() {
        assert_eq!(eval("payload.n > 10 ? 'high' : 'low'", json!({ "n": 11 })).unwrap(), json!("high"));
    }

    #[test]
    fn reading_through_null_is_a_type_error() {
        let err = eval("payload.aggregations.buckets.length > 0", json!({})).unwrap_err();
        assert!(matches!(err, ScriptError::Type(_)), "got {err:?}");
    }

    #[test]
    fn unknown_identifier_is_reported() {
        let err = eval("ctx.total > 0", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "ctx is not defined");
    }

    #[test]
    fn transform_mutates_payload_in_place() {
        let mut bindings = Bindings::with_payload(json!({ "hits": { "total": 3 } }));
        ExpressionEvaluator
            .evaluate(
                "var total = payload.hits.total; payload.summary.doubled = total * 2; payload.hits.total += 1",
                &mut bindings,
            )
            .unwrap();
        assert_eq!(
            bindings.into_payload(),
            json!({ "hits": { "total": 4 }, "summary": { "doubled": 6 } })
        );
    }

    #[test]
    fn transform_can_replace_payload() {
        let mut bindings = Bindings::with_payload(json!({ "hits": { "total": 3 } }));
        ExpressionEvaluator
            .evaluate("payload = { count: payload.hits.total, tags: ['a', 'b'] }", &mut bindings)
            .unwrap();
        assert_eq!(bindings.into_payload(), json!({ "count": 3, "tags": ["a", "b"] }));
    }

    #[test]
    fn array_index_assignment_appends_at_end() {
        let mut bindings = Bindings::with_payload(json!({ "list": [1] }));
        ExpressionEvaluator
            .evaluate("payload.list[1] = 2; payload.list[0] = 0", &mut bindings)
            .unwrap();
        assert_eq!(bindings.into_payload(), json!({ "list": [0, 2] }));
    }

    #[test]
    fn assignment_through_array_element() {
        let mut bindings = Bindings::with_payload(json!({ "rows": [{ "n": 1 }, { "n": 2 }] }));
        ExpressionEvaluator
            .evaluate("payload.rows[1].seen = true", &mut bindings)
            .unwrap();
        assert_eq!(
            bindings.into_payload(),
            json!({ "rows": [{ "n": 1 }, { "n": 2, "seen": true }] })
        );

        let err = eval("payload.rows[5].seen = true", json!({ "rows": [] })).unwrap_err();
        assert!(matches!(err, ScriptError::Type(_)), "got {err:?}");
        let err = eval("payload.n[0].seen = true", json!({ "n": 5 })).unwrap_err();
        assert!(matches!(err, ScriptError::Type(_)), "got {err:?}");
    }

    #[test]
    fn runaway_expression_is_rejected_not_evaluated() {
        let src = format!("payload{}", ".a".repeat(200_000));
        assert!(matches!(eval(&src, json!({})), Err(ScriptError::DepthExceeded(_))));
        let src = vec!["1"; 200_000].join(" + ");
        assert!(matches!(eval(&src, json!({})), Err(ScriptError::DepthExceeded(_))));
    }

    #[test]
    fn assigning_below_a_scalar_fails() {
        let err = eval("payload.n.inner = 1", json!({ "n": 5 })).unwrap_err();
        assert!(matches!(err, ScriptError::Type(_)));
    }

    #[test]
    fn check_reports_syntax_errors_without_evaluating() {
        assert!(ExpressionEvaluator.check("payload.hits.total >").is_err());
        assert!(ExpressionEvaluator.check("payload.undefinedThing > 0").is_ok());
    }

    #[test]
    fn empty_script_evaluates_to_null() {
        assert_eq!(eval("", json!({})).unwrap(), Value::Null);
    }
}
