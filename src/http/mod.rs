//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, single dispatch handler)
//!     → request.rs (query/body parsing, ContextMap)
//!     → bridge::Bridge::submit (affine thread does the work)
//!     → response.rs (success envelope, raw bytes, or error body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::ProcessInfo;
pub use response::Reply;
pub use server::{HttpServer, ListenerControl};
