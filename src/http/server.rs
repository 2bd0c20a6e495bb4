//! HTTP server setup and listener supervision.
//!
//! # Responsibilities
//! - Create Axum Router with the single dispatch handler
//! - Wire up middleware (tracing, body limits, request ID)
//! - Dispatch every request through the bridge and serialize the outcome
//! - Serve until shutdown, replacing the listener on restart requests

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, Uri},
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch, Notify};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::bridge::{Bridge, Operation};
use crate::config::BridgeConfig;
use crate::context::REQUEST;
use crate::http::request::{build_context, ProcessInfo};
use crate::http::response::{failure, success};
use crate::lifecycle::ShutdownSignal;
use crate::net::{self, ListenerError};
use crate::observability::metrics;
use crate::resilience::RebindPolicy;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Bridge,
    pub env_keys: Arc<[String]>,
    pub process: Arc<ProcessInfo>,
}

/// Handle for replacing the listener from outside the server task.
///
/// Cloneable and usable from any thread; `request_restart` never blocks.
#[derive(Debug, Clone)]
pub struct ListenerControl {
    restart: Arc<Notify>,
    generation: watch::Receiver<u64>,
}

impl ListenerControl {
    /// Ask the server to close its listener and bind a fresh one.
    pub fn request_restart(&self) {
        self.restart.notify_one();
    }

    /// How many times the listener has been replaced.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Wait until the listener generation reaches `target`.
    ///
    /// Returns `false` if the server went away first.
    pub async fn wait_for_generation(&self, target: u64) -> bool {
        let mut rx = self.generation.clone();
        let reached = rx.wait_for(|g| *g >= target).await.is_ok();
        reached
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Restart,
    Shutdown,
}

/// HTTP front end of the bridge.
pub struct HttpServer {
    router: Router,
    restart: Arc<Notify>,
    generation: watch::Sender<u64>,
    rebind: RebindPolicy,
}

impl HttpServer {
    /// Create a new HTTP server dispatching into `bridge`.
    pub fn new(bridge: Bridge, config: &BridgeConfig) -> Self {
        let state = AppState {
            bridge,
            env_keys: config.context.env.clone().into(),
            process: Arc::new(ProcessInfo::new()),
        };
        let (generation, _) = watch::channel(0);

        Self {
            router: Self::build_router(config, state),
            restart: Arc::new(Notify::new()),
            generation,
            rebind: RebindPolicy::from_config(&config.listener),
        }
    }

    /// Control handle; hand it to the executor so `/restart` can reach the listener.
    pub fn control(&self) -> ListenerControl {
        ListenerControl {
            restart: Arc::clone(&self.restart),
            generation: self.generation.subscribe(),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &BridgeConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(dispatch).post(dispatch))
            .route("/{*path}", get(dispatch).post(dispatch))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.security.max_body_size)),
            )
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// A restart request stops the current listener gracefully, binds the same
    /// address again and bumps the generation counter.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        let mut listener = listener;

        loop {
            tracing::info!(address = %addr, generation = *self.generation.borrow(), "HTTP server starting");

            let (reason_tx, reason_rx) = oneshot::channel();
            let restart = Arc::clone(&self.restart);
            let mut stop = shutdown.clone();
            let signal = async move {
                let reason = tokio::select! {
                    _ = restart.notified() => StopReason::Restart,
                    _ = stop.recv() => StopReason::Shutdown,
                };
                let _ = reason_tx.send(reason);
            };

            axum::serve(listener, self.router.clone())
                .with_graceful_shutdown(signal)
                .await
                .map_err(ListenerError::Serve)?;

            match reason_rx.await.unwrap_or(StopReason::Shutdown) {
                StopReason::Shutdown => break,
                StopReason::Restart => {
                    tracing::info!(address = %addr, "Listener closed for restart");
                    listener = net::rebind(addr, &self.rebind).await?;
                    self.generation.send_modify(|g| *g += 1);
                }
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// The one handler: context → ticket → envelope.
async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let path = uri.path().to_string();

    let context = build_context(&method, &path, uri.query(), &body, &state.env_keys, &state.process);
    let operation = Operation::resolve(&path, context.get(REQUEST));

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        operation = operation.label(),
        "Dispatching request"
    );

    let response = match state.bridge.submit(operation, context).await {
        Ok(reply) => success(reply),
        Err(e) => {
            tracing::warn!(request_id = %request_id, path = %path, kind = e.kind(), error = %e, "Request failed");
            failure(&e)
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control() -> (watch::Sender<u64>, ListenerControl) {
        let (tx, rx) = watch::channel(0);
        let control = ListenerControl {
            restart: Arc::new(Notify::new()),
            generation: rx,
        };
        (tx, control)
    }

    #[tokio::test]
    async fn wait_for_generation_sees_bump() {
        let (tx, control) = control();
        let waiter = tokio::spawn({
            let control = control.clone();
            async move { control.wait_for_generation(1).await }
        });
        tx.send_modify(|g| *g += 1);

        assert!(waiter.await.unwrap());
        assert_eq!(control.generation(), 1);
    }

    #[tokio::test]
    async fn wait_for_generation_fails_when_server_gone() {
        let (tx, control) = control();
        drop(tx);
        assert!(!control.wait_for_generation(1).await);
        assert!(control.wait_for_generation(0).await);
    }
}
