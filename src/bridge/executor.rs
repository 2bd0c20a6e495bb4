//! The affine-thread side of the bridge.
//!
//! # Responsibilities
//! - Own the host application, route registry, module registry and script engine
//! - Drain notifications one at a time from the host's own loop
//! - Run each ticket inside a failure boundary and always complete it
//! - Escalate failures that happen outside any ticket to the user

use std::any::Any;
use std::io;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::bridge::error::{BridgeError, HandlerError};
use crate::bridge::notifier::{HostQueue, Notification, Notifier};
use crate::bridge::pending::PendingTable;
use crate::bridge::ticket::{Operation, Outcome, TicketId};
use crate::context::{binding, ContextMap};
use crate::host::Application;
use crate::http::{ListenerControl, Reply};
use crate::lifecycle::reload::{reload_modules, ReloadStatus};
use crate::routing::builtin;
use crate::routing::module::{HandlerModule, ModuleError, ModuleRegistry};
use crate::routing::registry::RouteRegistry;
use crate::script::ScriptEngine;

/// Everything the affine thread needs before the host application exists.
///
/// `Send`, so it can be handed to the thread that will own the host.
pub struct ExecutorBuilder {
    queue: HostQueue,
    pending: PendingTable,
    notifier: Arc<dyn Notifier>,
    listener: Option<ListenerControl>,
}

impl ExecutorBuilder {
    pub(crate) fn new(queue: HostQueue, pending: PendingTable, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            queue,
            pending,
            notifier,
            listener: None,
        }
    }

    /// Attach the control used to replace the HTTP listener on restart.
    pub fn listener(mut self, control: ListenerControl) -> Self {
        self.listener = Some(control);
        self
    }

    /// Build the executor on the current thread, which becomes the affine thread.
    pub fn build<A>(self, app: A) -> AffineExecutor
    where
        A: Application,
    {
        let mut routes = RouteRegistry::new();
        routes.install(builtin::ORIGIN, builtin::routes());

        AffineExecutor {
            app: Box::new(app),
            queue: self.queue,
            pending: self.pending,
            notifier: self.notifier,
            listener: self.listener,
            routes,
            modules: ModuleRegistry::new(),
            scripts: ScriptEngine::new(),
        }
    }

    /// Start a dedicated affine thread for hosts without a loop of their own.
    ///
    /// `setup` runs on the new thread and builds the executor there; the
    /// thread then blocks in [`AffineExecutor::run`] until stopped.
    pub fn spawn<F>(self, setup: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce(ExecutorBuilder) -> AffineExecutor + Send + 'static,
    {
        thread::Builder::new()
            .name("affine-host".into())
            .spawn(move || {
                let mut executor = setup(self);
                executor.run();
            })
    }
}

/// Runs tickets on the thread that owns the host application.
pub struct AffineExecutor {
    app: Box<dyn Application>,
    queue: HostQueue,
    pending: PendingTable,
    notifier: Arc<dyn Notifier>,
    listener: Option<ListenerControl>,
    routes: RouteRegistry,
    modules: ModuleRegistry,
    scripts: ScriptEngine,
}

impl AffineExecutor {
    /// Register a handler module and install its routes.
    pub fn load_module(&mut self, module: Box<dyn HandlerModule>) -> Result<usize, ModuleError> {
        let origin = module.origin().to_string();
        let count = self.modules.register(module, &mut self.routes)?;
        tracing::info!(module = %origin, routes = count, "Module loaded");
        Ok(count)
    }

    pub fn app(&self) -> &dyn Application {
        self.app.as_ref()
    }

    pub fn app_mut(&mut self) -> &mut dyn Application {
        self.app.as_mut()
    }

    pub fn routes(&self) -> &RouteRegistry {
        &self.routes
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn scripts_mut(&mut self) -> &mut ScriptEngine {
        &mut self.scripts
    }

    /// Process every queued notification without blocking.
    ///
    /// For hosts that pump the bridge from their own event loop. Returns the
    /// number of notifications handled; stops early on `Stop`.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Some(notification) = self.queue.try_next() {
            handled += 1;
            if self.dispatch(notification).is_break() {
                break;
            }
        }
        handled
    }

    /// Block the calling thread, handling notifications until `Stop`.
    pub fn run(&mut self) {
        tracing::info!(app = %self.app.name(), "Host loop started");
        while let Some(notification) = self.queue.next_blocking() {
            if self.dispatch(notification).is_break() {
                break;
            }
        }
        tracing::info!("Host loop stopped");
    }

    fn dispatch(&mut self, notification: Notification) -> ControlFlow<()> {
        match notification {
            Notification::Stop => return ControlFlow::Break(()),
            Notification::RestartListener => self.restart_listener(),
            Notification::Ticket(id) => {
                let handled = panic::catch_unwind(AssertUnwindSafe(|| self.handle_ticket(id)));
                if let Err(payload) = handled {
                    let message = panic_message(payload.as_ref());
                    self.escalate(&message);
                    let failed = HandlerError::new(message).frame(format!("ticket {} escaped its handler", id));
                    self.pending.complete(&id, Err(failed.into()));
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_ticket(&mut self, id: TicketId) {
        let Some((path, operation, context)) = self.pending.checkout(&id) else {
            tracing::debug!(ticket = %id, "Notification for unknown ticket ignored");
            return;
        };

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute(&path, &operation, &context)
        })) {
            Ok(outcome) => outcome,
            Err(payload) => Err(HandlerError::new(panic_message(payload.as_ref()))
                .frame(format!("panicked in {} handler", operation.label()))
                .into()),
        };

        let outcome = outcome.map_err(|e| match e {
            BridgeError::Handler(e) => BridgeError::Handler(
                e.outer_frame(format!("ticket {} ({}) at {}", id, operation.label(), path)),
            ),
            other => other,
        });

        if let Err(e) = &outcome {
            tracing::warn!(ticket = %id, path = %path, error = %e, "Ticket failed");
        }

        if !self.pending.complete(&id, outcome) {
            tracing::debug!(ticket = %id, "Ticket waiter went away before completion");
        }
    }

    fn execute(&mut self, path: &str, operation: &Operation, context: &ContextMap) -> Outcome {
        self.app.ensure_idle()?;

        match operation {
            Operation::Route => {
                let handler = self
                    .routes
                    .get(path)
                    .ok_or_else(|| BridgeError::RouteNotFound(path.to_string()))?;
                binding::invoke(&handler, path, context, self.app.as_mut())
            }
            Operation::Eval(code) => {
                let value = self.scripts.eval(code, context, self.app.as_mut())?;
                Ok(Reply::Json(value))
            }
            Operation::Exec(code) => {
                let value = self.scripts.exec(code, context, self.app.as_mut())?;
                Ok(Reply::Json(value))
            }
            Operation::Reload => {
                let report = reload_modules(&mut self.modules, &mut self.routes);
                Ok(Reply::Json(report.to_json()))
            }
            Operation::Restart => {
                let mut report = reload_modules(&mut self.modules, &mut self.routes);
                report.insert("server", ReloadStatus::Restarting);
                // Queued behind this ticket, so the reply goes out before the
                // listener starts shutting down.
                if let Err(e) = self.notifier.notify(Notification::RestartListener) {
                    tracing::error!(error = %e, "Failed to schedule listener restart");
                }
                Ok(Reply::Json(report.to_json()))
            }
        }
    }

    fn restart_listener(&mut self) {
        match &self.listener {
            Some(control) => {
                tracing::info!("Replacing HTTP listener");
                control.request_restart();
            }
            None => tracing::warn!("Restart requested but no listener is attached"),
        }
    }

    /// Last line of defense for failures no ticket can report.
    ///
    /// Shows a blocking alert on the host and disables automatic teardown,
    /// so the bridge is never lost silently.
    fn escalate(&mut self, message: &str) {
        tracing::error!(error = %message, "Failure outside any ticket");
        self.app.alert("Failed", message);
        self.app.set_auto_terminate(false);
    }
}

impl Drop for AffineExecutor {
    fn drop(&mut self) {
        self.queue.close();
        let failed = self.pending.fail_all(|| Err(BridgeError::HostUnavailable));
        if failed > 0 {
            tracing::warn!(tickets = failed, "Host loop gone, failing waiting tickets");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
