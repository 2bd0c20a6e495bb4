//! Per-request capability maps.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → http::request builds a ContextMap (path, request, query, body, env, status)
//!     → ticket carries it to the affine thread
//!     → binding.rs hands a handler only the capabilities it declared
//! ```
//!
//! # Design Decisions
//! - Immutable after construction, never shared across requests
//! - The application handle is not stored here: it only exists on the
//!   affine thread and is bound there under the name `app`

pub mod binding;

use std::collections::BTreeMap;

use serde_json::Value;

/// The host application handle. Bound on the affine thread only.
pub const APP: &str = "app";
/// HTTP method.
pub const METHOD: &str = "method";
/// Request path.
pub const PATH: &str = "path";
/// Combined parameter set, body values over query values.
pub const REQUEST: &str = "request";
/// Query-string parameters only.
pub const QUERY: &str = "query";
/// Raw JSON payload (`{}` when absent or malformed).
pub const BODY: &str = "body";
/// Allowlisted environment variables.
pub const ENV: &str = "env";
/// Process status block.
pub const STATUS: &str = "status";

/// Named capabilities available to handlers for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextMap {
    values: BTreeMap<String, Value>,
}

impl ContextMap {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub(crate) fn get_key_value(&self, name: &str) -> Option<(&String, &Value)> {
        self.values.get_key_value(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The request path, or an empty string for synthetic contexts.
    pub fn path(&self) -> &str {
        self.values.get(PATH).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builder for [`ContextMap`]. The only way to populate one.
#[derive(Debug, Default)]
pub struct ContextBuilder {
    values: BTreeMap<String, Value>,
}

impl ContextBuilder {
    pub fn insert(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> ContextMap {
        ContextMap {
            values: self.values,
        }
    }
}
