//! Response envelopes.
//!
//! # Responsibilities
//! - Wrap handler results in `{"status":"ok","result":...}`
//! - Pass raw replies (exports, renders) through with their own content type
//! - Map bridge errors to `{"status":"error","message","traceback"}` + status
//!
//! # Design Decisions
//! - The error body shape never varies; only the status code does

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::bridge::error::BridgeError;

/// What a handler hands back to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Wrapped in the success envelope.
    Json(Value),
    /// Sent as-is.
    Raw {
        status: StatusCode,
        content_type: String,
        body: Vec<u8>,
    },
}

impl Reply {
    pub fn json(value: impl Into<Value>) -> Self {
        Reply::Json(value.into())
    }

    /// A 200 binary payload.
    pub fn binary(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::raw(StatusCode::OK, content_type, body)
    }

    pub fn raw(status: StatusCode, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Reply::Raw {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

pub fn success(reply: Reply) -> Response {
    match reply {
        Reply::Json(result) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "result": result })),
        )
            .into_response(),
        Reply::Raw {
            status,
            content_type,
            body,
        } => (status, [(header::CONTENT_TYPE, content_type)], body).into_response(),
    }
}

pub fn failure(error: &BridgeError) -> Response {
    (
        error.status_code(),
        Json(json!({
            "status": "error",
            "message": error.to_string(),
            "traceback": error.traceback(),
        })),
    )
        .into_response()
}
