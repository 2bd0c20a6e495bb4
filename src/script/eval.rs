//! Tree-walking evaluator over `serde_json::Value`.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Number, Value};

use crate::context::ContextMap;
use crate::host::Application;
use crate::script::parser::{BinOp, Expr, Stmt};
use crate::script::{ScriptError, ScriptFn};

/// Variables visible to one script run: assigned locals shadow the context.
pub(crate) struct Scope<'a> {
    context: &'a ContextMap,
    locals: BTreeMap<String, Value>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(context: &'a ContextMap) -> Self {
        Self {
            context,
            locals: BTreeMap::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals.get(name).or_else(|| self.context.get(name))
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<Value> {
        self.locals.remove(name)
    }
}

pub(crate) struct Evaluator<'s, 'a> {
    pub(crate) functions: &'s HashMap<String, ScriptFn>,
    pub(crate) app: &'s mut dyn Application,
    pub(crate) scope: Scope<'a>,
}

impl Evaluator<'_, '_> {
    pub(crate) fn run(&mut self, stmt: &Stmt) -> Result<(), ScriptError> {
        match stmt {
            Stmt::Assign(name, expr) => {
                let value = self.eval(expr)?;
                self.scope.locals.insert(name.clone(), value);
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(())
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => self
                .scope
                .lookup(name)
                .cloned()
                .ok_or_else(|| ScriptError::UnknownName(name.clone())),
            Expr::List(items) => items
                .iter()
                .map(|e| self.eval(e))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Object(entries) => {
                let mut map = serde_json::Map::new();
                for (key, e) in entries {
                    map.insert(key.clone(), self.eval(e)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Member(target, field) => match self.eval(target)? {
                Value::Object(mut map) => Ok(map.remove(field).unwrap_or(Value::Null)),
                other => Err(ScriptError::Type(format!(
                    "cannot read field '{}' of {}",
                    field,
                    type_name(&other)
                ))),
            },
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                subscript(target, &index)
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Result<Vec<_>, _>>()?;
                let function = self
                    .functions
                    .get(name)
                    .ok_or_else(|| ScriptError::UnknownFunction(name.clone()))?;
                function(&mut *self.app, &args).map_err(ScriptError::Raised)
            }
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Number(n) => negate(&n),
                other => Err(ScriptError::Type(format!("cannot negate {}", type_name(&other)))),
            },
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                match op {
                    BinOp::Add => add(lhs, rhs),
                    BinOp::Eq => Ok(Value::Bool(loosely_equal(&lhs, &rhs))),
                    BinOp::Ne => Ok(Value::Bool(!loosely_equal(&lhs, &rhs))),
                }
            }
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn subscript(target: Value, index: &Value) -> Result<Value, ScriptError> {
    match (target, index) {
        (Value::Array(mut items), Value::Number(n)) => {
            let len = items.len();
            n.as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .filter(|i| *i < len)
                .map(|i| items.swap_remove(i))
                .ok_or_else(|| ScriptError::Type(format!("index {} out of range for list of {}", n, len)))
        }
        (Value::Object(mut map), Value::String(key)) => Ok(map.remove(key).unwrap_or(Value::Null)),
        (Value::String(s), Value::Number(n)) => n
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .ok_or_else(|| ScriptError::Type(format!("index {} out of range for string", n))),
        (target, index) => Err(ScriptError::Type(format!(
            "cannot index {} with {}",
            type_name(&target),
            type_name(index)
        ))),
    }
}

fn negate(n: &Number) -> Result<Value, ScriptError> {
    if let Some(i) = n.as_i64() {
        if let Some(neg) = i.checked_neg() {
            return Ok(Value::from(neg));
        }
    }
    float(-n.as_f64().unwrap_or_default())
}

fn add(lhs: Value, rhs: Value) -> Result<Value, ScriptError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                if let Some(sum) = x.checked_add(y) {
                    return Ok(Value::from(sum));
                }
            }
            float(a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default())
        }
        (Value::String(mut a), Value::String(b)) => {
            a.push_str(&b);
            Ok(Value::String(a))
        }
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (a, b) => Err(ScriptError::Type(format!(
            "cannot add {} and {}",
            type_name(&a),
            type_name(&b)
        ))),
    }
}

fn float(f: f64) -> Result<Value, ScriptError> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| ScriptError::Type("arithmetic produced a non-finite number".into()))
}

/// JSON equality, except that numbers compare by value (`1 == 1.0`).
fn loosely_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}
