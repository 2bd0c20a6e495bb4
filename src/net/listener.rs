//! TCP listener binding.
//!
//! # Responsibilities
//! - Resolve and bind the configured address
//! - Rebind the exact same address after a listener restart, with retries

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ListenerConfig;
use crate::resilience::RebindPolicy;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// The configured address does not parse.
    Address(String),
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Serving on a bound listener failed.
    Serve(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Address(a) => write!(f, "Invalid listener address: {}", a),
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Serve(e) => write!(f, "Failed to serve: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

impl From<ListenerError> for std::io::Error {
    fn from(e: ListenerError) -> Self {
        match e {
            ListenerError::Address(a) => std::io::Error::new(std::io::ErrorKind::InvalidInput, a),
            ListenerError::Bind(e) | ListenerError::Serve(e) => e,
        }
    }
}

/// Bind to the configured address.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|_| ListenerError::Address(config.bind_address.clone()))?;

    let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener)
}

/// Bind `addr` again, retrying per `policy` while the old socket drains.
pub async fn rebind(addr: SocketAddr, policy: &RebindPolicy) -> Result<TcpListener, ListenerError> {
    let mut attempt = 1;
    loop {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                tracing::info!(address = %addr, attempt, "Listener rebound");
                return Ok(listener);
            }
            Err(e) if attempt < policy.attempts => {
                let delay = policy.delay(attempt);
                tracing::warn!(address = %addr, attempt, delay = ?delay, error = %e, "Rebind failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(address = %addr, attempts = attempt, error = %e, "Giving up on rebind");
                return Err(ListenerError::Bind(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unparseable_address() {
        let config = ListenerConfig {
            bind_address: "not-an-address".into(),
            ..ListenerConfig::default()
        };
        assert!(matches!(bind(&config).await, Err(ListenerError::Address(_))));
    }

    #[tokio::test]
    async fn rebinds_released_port() {
        let config = ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            ..ListenerConfig::default()
        };
        let first = bind(&config).await.unwrap();
        let addr = first.local_addr().unwrap();
        drop(first);

        let second = rebind(addr, &RebindPolicy::default()).await.unwrap();
        assert_eq!(second.local_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn gives_up_while_port_is_held() {
        let held = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = held.local_addr().unwrap();
        let policy = RebindPolicy {
            attempts: 2,
            base_ms: 1,
            max_ms: 1,
        };
        assert!(matches!(rebind(addr, &policy).await, Err(ListenerError::Bind(_))));
    }
}
