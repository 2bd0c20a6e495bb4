//! Tickets: one correlation record per bridged request.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::bridge::error::BridgeError;
use crate::context::ContextMap;
use crate::http::Reply;

/// Result slot of a ticket.
pub type Outcome = Result<Reply, BridgeError>;

/// Opaque unique ticket identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TicketId(Uuid);

impl TicketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the affine thread should do with a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Look the path up in the route registry.
    Route,
    /// Evaluate an expression.
    Eval(String),
    /// Execute a block and return its `result` binding.
    Exec(String),
    /// Reload every handler module.
    Reload,
    /// Reload, then replace the HTTP listener.
    Restart,
}

impl Operation {
    /// Resolve reserved paths; anything else is a registry lookup.
    pub fn resolve(path: &str, params: Option<&Value>) -> Self {
        let code = || {
            params
                .and_then(|p| p.get("code"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        match path {
            "/eval" => Operation::Eval(code()),
            "/exec" => Operation::Exec(code()),
            "/reload" => Operation::Reload,
            "/restart" => Operation::Restart,
            _ => Operation::Route,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operation::Route => "route",
            Operation::Eval(_) => "eval",
            Operation::Exec(_) => "exec",
            Operation::Reload => "reload",
            Operation::Restart => "restart",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    Pending,
    Completed,
}

/// A request waiting for (or finished with) its run on the affine thread.
///
/// Written once by the affine thread, read once by the owning worker after
/// the completion signal fires.
#[derive(Debug)]
pub struct Ticket {
    id: TicketId,
    path: String,
    operation: Operation,
    context: Arc<ContextMap>,
    state: TicketState,
    outcome: Option<Outcome>,
    signal: Option<oneshot::Sender<()>>,
}

impl Ticket {
    /// Create a pending ticket and the receiver its worker blocks on.
    pub fn new(
        path: impl Into<String>,
        operation: Operation,
        context: ContextMap,
    ) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let ticket = Self {
            id: TicketId::new(),
            path: path.into(),
            operation,
            context: Arc::new(context),
            state: TicketState::Pending,
            outcome: None,
            signal: Some(tx),
        };
        (ticket, rx)
    }

    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn context(&self) -> &Arc<ContextMap> {
        &self.context
    }

    pub fn state(&self) -> TicketState {
        self.state
    }

    /// Fill the result slot and fire the completion signal.
    ///
    /// Returns false if the ticket was already completed or its waiter is gone.
    pub(crate) fn complete(&mut self, outcome: Outcome) -> bool {
        if self.state == TicketState::Completed {
            return false;
        }
        self.outcome = Some(outcome);
        self.state = TicketState::Completed;
        match self.signal.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Consume the ticket, yielding its outcome if it was completed.
    pub fn into_outcome(self) -> Option<Outcome> {
        self.outcome
    }
}
