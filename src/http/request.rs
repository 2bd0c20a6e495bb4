//! Request parsing into a context map.
//!
//! # Responsibilities
//! - Parse the query string (single key → scalar, repeated key → list)
//! - Parse POST JSON bodies, never failing the request on bad JSON
//! - Merge body values over query values into one parameter set
//! - Assemble the per-request `ContextMap`
//!
//! # Design Decisions
//! - Query values stay strings; no type guessing
//! - Only allowlisted environment variables are exposed

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::http::Method;
use serde_json::{json, Map, Value};

use crate::context::{ContextMap, BODY, ENV, METHOD, PATH, QUERY, REQUEST, STATUS};

/// Process facts exposed under the `status` capability.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    started: Instant,
    started_at: u64,
}

impl ProcessInfo {
    pub fn new() -> Self {
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            started: Instant::now(),
            started_at,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "pid": std::process::id(),
            "started_at": self.started_at,
            "uptime_secs": self.uptime_secs(),
        })
    }
}

impl Default for ProcessInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a query string. A key seen once maps to a string, a repeated key
/// to the list of its values in order of appearance.
pub fn parse_query(raw: Option<&str>) -> Map<String, Value> {
    let mut params = Map::new();
    let Some(raw) = raw else {
        return params;
    };

    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        let value = Value::String(value.into_owned());
        match params.get_mut(&*key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                params.insert(key.into_owned(), value);
            }
        }
    }

    params
}

/// The JSON payload of a POST; `{}` when absent, malformed, or not a POST.
pub fn parse_body(method: &Method, body: &[u8]) -> Value {
    if method != Method::POST || body.iter().all(u8::is_ascii_whitespace) {
        return Value::Object(Map::new());
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Ignoring malformed JSON body");
        Value::Object(Map::new())
    })
}

/// Body values win over query values with the same key.
pub fn merge_params(query: &Map<String, Value>, body: &Value) -> Value {
    let mut merged = query.clone();
    if let Value::Object(fields) = body {
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

/// Allowlisted environment variables that are currently set.
pub fn env_snapshot(keys: &[String]) -> Value {
    let vars: Map<String, Value> = keys
        .iter()
        .filter_map(|k| std::env::var(k).ok().map(|v| (k.clone(), Value::String(v))))
        .collect();
    Value::Object(vars)
}

/// Build the capability map for one request.
pub fn build_context(
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: &[u8],
    env_keys: &[String],
    process: &ProcessInfo,
) -> ContextMap {
    let query = parse_query(query);
    let body = parse_body(method, body);
    let request = merge_params(&query, &body);

    ContextMap::builder()
        .insert(METHOD, method.as_str())
        .insert(PATH, path)
        .insert(REQUEST, request)
        .insert(QUERY, Value::Object(query))
        .insert(BODY, body)
        .insert(ENV, env_snapshot(env_keys))
        .insert(STATUS, process.to_json())
        .build()
}
