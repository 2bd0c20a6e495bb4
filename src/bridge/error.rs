//! Error taxonomy for bridged operations.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

/// A failure raised inside a route handler or scripted block.
///
/// Carries an optional explicit HTTP status and a trace of frames, most
/// recent last, that ends up in the `traceback` field of the error body.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    status: Option<u16>,
    trace: Vec<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            trace: Vec::new(),
        }
    }

    /// Override the status code sent to the client (defaults to 500).
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status.as_u16());
        self
    }

    /// Append a frame to the trace.
    pub fn frame(mut self, frame: impl Into<String>) -> Self {
        self.trace.push(frame.into());
        self
    }

    /// Insert a frame at the outermost position of the trace.
    pub(crate) fn outer_frame(mut self, frame: impl Into<String>) -> Self {
        self.trace.insert(0, frame.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status.and_then(|s| StatusCode::from_u16(s).ok())
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }
}

/// Errors produced while driving a request through the bridge.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// A handler declared a capability the context map does not carry.
    #[error("Capability '{capability}' is not available for {path}")]
    Binding { capability: String, path: String },

    /// No route registered for the path.
    #[error("Route {0} not defined")]
    RouteNotFound(String),

    /// The handler or script failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The affine thread did not complete the ticket before the deadline.
    #[error("Host did not respond within {0:?}")]
    HostUnresponsive(Duration),

    /// The affine thread is gone or dropped the ticket.
    #[error("Host event loop is not available")]
    HostUnavailable,
}

impl BridgeError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::Binding { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            BridgeError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            BridgeError::Handler(e) => e.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            BridgeError::HostUnresponsive(_) => StatusCode::GATEWAY_TIMEOUT,
            BridgeError::HostUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Binding { .. } => "BindingError",
            BridgeError::RouteNotFound(_) => "RouteNotFound",
            BridgeError::Handler(_) => "HandlerError",
            BridgeError::HostUnresponsive(_) => "HostUnresponsive",
            BridgeError::HostUnavailable => "HostUnavailable",
        }
    }

    /// Render the trace frames followed by the kind and message.
    pub fn traceback(&self) -> String {
        let mut lines: Vec<String> = match self {
            BridgeError::Handler(e) => e.trace().to_vec(),
            _ => Vec::new(),
        };
        lines.push(format!("{}: {}", self.kind(), self));
        lines.join("\n")
    }
}
