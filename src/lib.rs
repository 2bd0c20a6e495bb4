//! Headless bridge library.
//!
//! Exposes a single-threaded host application over a local HTTP listener.
//! Every request is turned into a ticket that runs exactly once on the
//! host's affine thread; HTTP workers only parse, wait and serialize.

pub mod bridge;
pub mod config;
pub mod context;
pub mod host;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod script;

pub use bridge::{AffineExecutor, Bridge, BridgeError, ExecutorBuilder, HandlerError};
pub use config::schema::BridgeConfig;
pub use host::Application;
pub use http::{HttpServer, ListenerControl, Reply};
pub use lifecycle::Shutdown;
