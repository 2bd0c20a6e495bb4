//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Reload (reload.rs), on the affine thread:
//!     for each module → load() → swap routes | evict routes → status map
//!
//! Restart:
//!     reload pass → queue RestartListener behind the current ticket
//!     → reply sent → affine thread asks the HTTP supervisor to rebind
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → trigger → listener drains and stops → host loop told to stop
//! ```
//!
//! # Design Decisions
//! - Reload is just another affine operation; no extra locking
//! - Per-module outcomes are data, never raised
//! - Restart never waits for the new listener, so the request that asked for
//!   it cannot deadlock on its own listener going away

pub mod reload;
pub mod shutdown;

pub use reload::{reload_modules, ReloadReport, ReloadStatus};
pub use shutdown::{Shutdown, ShutdownSignal};
