//! Tree-walking interpreter over `serde_json::Value`.

use serde_json::{Map, Value};

use super::parser::{AssignOp, BinaryOp, Expr, LogicalOp, UnaryOp};
use super::value::{is_truthy, loose_eq, number, strict_eq, to_display, to_number, type_name};
use super::{Bindings, ScriptError};

/// One step of an assignment path below the root binding.
enum PathSegment {
    Key(String),
    Index(usize),
}

pub(crate) struct Interpreter<'a> {
    bindings: &'a mut Bindings,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(bindings: &'a mut Bindings) -> Self {
        Self { bindings }
    }

    /// Run every statement; the value of the last one is the result.
    pub(crate) fn run(&mut self, program: &[Expr]) -> Result<Value, ScriptError> {
        let mut last = Value::Null;
        for statement in program {
            last = self.eval(statement)?;
        }
        Ok(last)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Ident(name) => self
                .bindings
                .get(name)
                .cloned()
                .ok_or_else(|| ScriptError::UnknownIdentifier(name.clone())),
            Expr::Member(object, name) => {
                let target = self.eval(object)?;
                read_property(&target, name)
            }
            Expr::Index(object, index) => {
                let target = self.eval(object)?;
                let key = self.eval(index)?;
                read_index(&target, &key)
            }
            Expr::Unary(op, operand) => {
                let v = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!is_truthy(&v)),
                    UnaryOp::Neg => number(-to_number(&v)),
                    UnaryOp::Plus => number(to_number(&v)),
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                let a = self.eval(lhs)?;
                let b = self.eval(rhs)?;
                Ok(binary(*op, &a, &b))
            }
            Expr::Logical(op, lhs, rhs) => {
                let a = self.eval(lhs)?;
                match (op, is_truthy(&a)) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(a),
                    _ => self.eval(rhs),
                }
            }
            Expr::Conditional(test, consequent, alternate) => {
                if is_truthy(&self.eval(test)?) {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?);
                }
                Ok(Value::Array(out))
            }
            Expr::Object(fields) => {
                let mut out = Map::new();
                for (key, value) in fields {
                    let v = self.eval(value)?;
                    out.insert(key.clone(), v);
                }
                Ok(Value::Object(out))
            }
            Expr::Assign(op, target, value) => self.assign(*op, target, value),
        }
    }

    fn assign(&mut self, op: AssignOp, target: &Expr, value: &Expr) -> Result<Value, ScriptError> {
        let (root, path) = self.resolve_path(target)?;
        let rhs = self.eval(value)?;

        let new_value = match op {
            AssignOp::Set => rhs,
            AssignOp::Add | AssignOp::Sub => {
                let current = match self.bindings.get(&root) {
                    Some(base) => read_path(base, &path)?,
                    None => return Err(ScriptError::UnknownIdentifier(root)),
                };
                let bop = if op == AssignOp::Add { BinaryOp::Add } else { BinaryOp::Sub };
                binary(bop, &current, &rhs)
            }
        };

        if path.is_empty() {
            self.bindings.set(root, new_value.clone());
            return Ok(new_value);
        }

        let base = self
            .bindings
            .get_mut(&root)
            .ok_or_else(|| ScriptError::UnknownIdentifier(root.clone()))?;
        write_path(base, &path, new_value.clone())?;
        Ok(new_value)
    }

    /// Flatten an assignment target into its root binding and the path below it.
    /// Index sub-expressions are evaluated here, before any mutation happens.
    fn resolve_path(&mut self, target: &Expr) -> Result<(String, Vec<PathSegment>), ScriptError> {
        match target {
            Expr::Ident(name) => Ok((name.clone(), Vec::new())),
            Expr::Member(object, name) => {
                let (root, mut path) = self.resolve_path(object)?;
                path.push(PathSegment::Key(name.clone()));
                Ok((root, path))
            }
            Expr::Index(object, index) => {
                let (root, mut path) = self.resolve_path(object)?;
                let key = self.eval(index)?;
                path.push(match key {
                    Value::Number(ref n) => match n.as_u64() {
                        Some(i) => PathSegment::Index(i as usize),
                        None => PathSegment::Key(to_display(&key)),
                    },
                    other => PathSegment::Key(to_display(&other)),
                });
                Ok((root, path))
            }
            _ => Err(ScriptError::InvalidAssignment),
        }
    }
}

fn read_property(target: &Value, name: &str) -> Result<Value, ScriptError> {
    match target {
        Value::Null => Err(ScriptError::Type(format!(
            "cannot read property '{name}' of null"
        ))),
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if name == "length" => Ok(number(items.len() as f64)),
        Value::String(s) if name == "length" => Ok(number(s.chars().count() as f64)),
        _ => Ok(Value::Null),
    }
}

fn read_index(target: &Value, key: &Value) -> Result<Value, ScriptError> {
    match (target, key) {
        (Value::Null, _) => Err(ScriptError::Type(format!(
            "cannot read property '{}' of null",
            to_display(key)
        ))),
        (Value::Array(items), Value::Number(n)) => Ok(n
            .as_u64()
            .and_then(|i| items.get(i as usize))
            .cloned()
            .unwrap_or(Value::Null)),
        (Value::String(s), Value::Number(n)) => Ok(n
            .as_u64()
            .and_then(|i| s.chars().nth(i as usize))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
        (_, other) => read_property(target, &to_display(other)),
    }
}

fn read_path(base: &Value, path: &[PathSegment]) -> Result<Value, ScriptError> {
    let mut current = base.clone();
    for segment in path {
        current = match segment {
            PathSegment::Key(k) => read_property(&current, k)?,
            PathSegment::Index(i) => read_index(&current, &number(*i as f64))?,
        };
    }
    Ok(current)
}

/// Write `value` at `path` below `base`, creating intermediate objects as needed.
fn write_path(base: &mut Value, path: &[PathSegment], value: Value) -> Result<(), ScriptError> {
    let Some((last, parents)) = path.split_last() else {
        *base = value;
        return Ok(());
    };

    let mut current = base;
    for segment in parents {
        current = match segment {
            PathSegment::Key(k) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                match current {
                    Value::Object(map) => map.entry(k.clone()).or_insert(Value::Null),
                    other => {
                        return Err(ScriptError::Type(format!(
                            "cannot set property '{k}' on {}",
                            type_name(other)
                        )))
                    }
                }
            }
            PathSegment::Index(i) => {
                let kind = type_name(current);
                match current.as_array_mut().and_then(|items| items.get_mut(*i)) {
                    Some(item) => item,
                    None => return Err(ScriptError::Type(format!("cannot index {kind} at {i}"))),
                }
            }
        };
    }

    match last {
        PathSegment::Key(k) => {
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
            match current {
                Value::Object(map) => {
                    map.insert(k.clone(), value);
                    Ok(())
                }
                other => Err(ScriptError::Type(format!(
                    "cannot set property '{k}' on {}",
                    type_name(other)
                ))),
            }
        }
        PathSegment::Index(i) => {
            let kind = type_name(current);
            match current.as_array_mut() {
                Some(items) if *i < items.len() => {
                    items[*i] = value;
                    Ok(())
                }
                Some(items) if *i == items.len() => {
                    items.push(value);
                    Ok(())
                }
                _ => Err(ScriptError::Type(format!("cannot index {kind} at {i}"))),
            }
        }
    }
}

fn binary(op: BinaryOp, a: &Value, b: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if a.is_string() || b.is_string() {
                Value::String(format!("{}{}", to_display(a), to_display(b)))
            } else {
                number(to_number(a) + to_number(b))
            }
        }
        BinaryOp::Sub => number(to_number(a) - to_number(b)),
        BinaryOp::Mul => number(to_number(a) * to_number(b)),
        BinaryOp::Div => number(to_number(a) / to_number(b)),
        BinaryOp::Rem => number(to_number(a) % to_number(b)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Value::Bool(compare(op, a, b)),
        BinaryOp::LooseEq => Value::Bool(loose_eq(a, b)),
        BinaryOp::LooseNe => Value::Bool(!loose_eq(a, b)),
        BinaryOp::StrictEq => Value::Bool(strict_eq(a, b)),
        BinaryOp::StrictNe => Value::Bool(!strict_eq(a, b)),
    }
}

fn compare(op: BinaryOp, a: &Value, b: &Value) -> bool {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return match op {
            BinaryOp::Lt => x < y,
            BinaryOp::Le => x <= y,
            BinaryOp::Gt => x > y,
            _ => x >= y,
        };
    }
    let (x, y) = (to_number(a), to_number(b));
    match op {
        BinaryOp::Lt => x < y,
        BinaryOp::Le => x <= y,
        BinaryOp::Gt => x > y,
        _ => x >= y,
    }
}
