//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Listener restart:
//!     → bind fails (port still draining, transient EADDRINUSE)
//!     → backoff.rs schedules the next attempt
//!     → give up after `listener.rebind_attempts`
//! ```
//!
//! # Design Decisions
//! - Exponential delays with a cap and a little jitter
//! - Bounded attempts; a listener that cannot come back is reported, not retried forever

pub mod backoff;

pub use backoff::{calculate_backoff, RebindPolicy};
