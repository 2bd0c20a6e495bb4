//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BridgeConfig (validated, immutable)
//!     → sections handed to the bridge, listener and observability setup
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; `/reload` reloads handler modules, not config
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AffinityConfig, BridgeConfig, ContextConfig, ListenerConfig, ObservabilityConfig, SecurityConfig,
};
