//! Script evaluation for `/eval` and `/exec`.
//!
//! # Data Flow
//! ```text
//! code (from the `code` parameter)
//!     → parser.rs tokenize + parse → statements
//!     → eval.rs walks them on the affine thread with the request's ContextMap
//!     → JSON value, or a HandlerError carrying message and trace
//! ```
//!
//! # Design Decisions
//! - JSON values only; no host objects cross into scripts
//! - Host access goes through registered functions that receive `app`
//! - Names resolve to assigned locals first, then context capabilities

pub mod eval;
pub mod parser;

use std::collections::HashMap;

use axum::http::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::bridge::error::HandlerError;
use crate::context::ContextMap;
use crate::host::Application;

use eval::{type_name, Evaluator, Scope};
use parser::Stmt;

/// A function callable from scripts.
pub type ScriptFn = Box<dyn Fn(&mut dyn Application, &[Value]) -> Result<Value, HandlerError>>;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("name '{0}' is not defined")]
    UnknownName(String),

    #[error("function '{0}' is not defined")]
    UnknownFunction(String),

    #[error("{0}")]
    Type(String),

    /// Raised by a function, typically `fail`.
    #[error(transparent)]
    Raised(HandlerError),

    #[error("eval accepts a single expression; use /exec for statements")]
    NotExpression,
}

impl From<ScriptError> for HandlerError {
    fn from(e: ScriptError) -> Self {
        match e {
            ScriptError::Raised(inner) => inner,
            other => HandlerError::new(other.to_string()),
        }
    }
}

/// Registered functions plus the entry points for both script forms.
pub struct ScriptEngine {
    functions: HashMap<String, ScriptFn>,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine {
    /// Engine with the builtin functions registered.
    pub fn new() -> Self {
        let mut engine = Self {
            functions: HashMap::new(),
        };

        engine.register("len", |_, args| {
            let len = match one(args, "len")? {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => return Err(argument_error("len", other)),
            };
            Ok(Value::from(len))
        });
        engine.register("keys", |_, args| match one(args, "keys")? {
            Value::Object(o) => Ok(Value::Array(o.keys().cloned().map(Value::String).collect())),
            other => Err(argument_error("keys", other)),
        });
        engine.register("str", |_, args| {
            Ok(Value::String(match one(args, "str")? {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }))
        });
        engine.register("fail", |_, args| {
            let message = match args.first() {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "fail() called".to_string(),
            };
            let mut error = HandlerError::new(message);
            if let Some(code) = args.get(1).and_then(Value::as_u64) {
                let status = u16::try_from(code)
                    .ok()
                    .and_then(|c| StatusCode::from_u16(c).ok())
                    .ok_or_else(|| HandlerError::new(format!("fail: invalid status {}", code)))?;
                error = error.with_status(status);
            }
            Err(error)
        });
        engine.register("app_name", |app, _| Ok(Value::String(app.name().to_string())));
        engine.register("app_version", |app, _| Ok(Value::String(app.version().to_string())));

        engine
    }

    /// Register (or replace) a function.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut dyn Application, &[Value]) -> Result<Value, HandlerError> + 'static,
    {
        self.functions.insert(name.into(), Box::new(f));
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Evaluate exactly one expression.
    pub fn eval(
        &self,
        code: &str,
        context: &ContextMap,
        app: &mut dyn Application,
    ) -> Result<Value, HandlerError> {
        let mut program = parser::parse(code)?;
        let expr = match (program.pop(), program.is_empty()) {
            (Some(statement), true) => match statement.stmt {
                Stmt::Expr(expr) => expr,
                Stmt::Assign(..) => return Err(ScriptError::NotExpression.into()),
            },
            (Some(_), false) => return Err(ScriptError::NotExpression.into()),
            (None, _) => {
                return Err(ScriptError::Syntax {
                    line: 1,
                    message: "empty expression".into(),
                }
                .into())
            }
        };

        let mut evaluator = Evaluator {
            functions: &self.functions,
            app,
            scope: Scope::new(context),
        };
        evaluator
            .eval(&expr)
            .map_err(|e| HandlerError::from(e).frame("eval"))
    }

    /// Run statements and return whatever ended up bound to `result`.
    pub fn exec(
        &self,
        code: &str,
        context: &ContextMap,
        app: &mut dyn Application,
    ) -> Result<Value, HandlerError> {
        let program = parser::parse(code)?;
        let mut evaluator = Evaluator {
            functions: &self.functions,
            app,
            scope: Scope::new(context),
        };

        for statement in &program {
            evaluator
                .run(&statement.stmt)
                .map_err(|e| HandlerError::from(e).frame(format!("exec line {}", statement.line)))?;
        }

        Ok(evaluator.scope.take("result").unwrap_or(Value::Null))
    }
}

fn one<'v>(args: &'v [Value], function: &str) -> Result<&'v Value, HandlerError> {
    match args {
        [value] => Ok(value),
        _ => Err(HandlerError::new(format!(
            "{}() takes 1 argument, {} given",
            function,
            args.len()
        ))),
    }
}

fn argument_error(function: &str, value: &Value) -> HandlerError {
    HandlerError::new(format!("{}() does not accept {}", function, type_name(value)))
}
