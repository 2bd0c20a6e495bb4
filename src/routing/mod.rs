//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     builtin.rs routes         → RouteRegistry (origin "core")
//!     HandlerModule::load()     → ModuleRegistry + RouteRegistry (origin = module)
//!
//! Per ticket (affine thread):
//!     path → registry.rs lookup → Handler
//!     → context::binding injects declared capabilities → Reply
//!
//! On /reload or /restart:
//!     lifecycle::reload swaps or evicts each module's routes
//! ```
//!
//! # Design Decisions
//! - Exact path lookup; first-class "not registered" rather than a default
//! - Handlers declare capability names instead of sharing one signature
//! - A module's routes are replaced as a unit, never patched

pub mod builtin;
pub mod module;
pub mod registry;

pub use module::{FnModule, HandlerModule, ModuleError, ModuleRegistry, ModuleStatus};
pub use registry::{Handler, Route, RouteRegistry};
