//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! startup:  config.listener.bind_address → listener.rs bind → http::HttpServer::run
//! restart:  old listener closed → listener.rs rebind (same address, backoff) → serve again
//! ```
//!
//! # Design Decisions
//! - Plain TCP on loopback; no TLS
//! - The address is fixed for the process lifetime, restarts reuse it

pub mod listener;

pub use listener::{bind, rebind, ListenerError};
