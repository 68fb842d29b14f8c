//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → loader.rs (optional TOML file)
//!     → args.rs (command-line flags win)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → used once at startup to build the shared proxy context
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod args;
pub mod loader;
pub mod schema;
pub mod validation;

pub use args::Args;
pub use loader::ConfigError;
pub use schema::ProxyConfig;
pub use schema::{
    CaptureConfig, ListenerConfig, LogFormat, ObservabilityConfig, TargetConfig, TlsConfig,
    TransformConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
