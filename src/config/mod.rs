//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI flag overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//! ```
//!
//! All fields have defaults, so the proxy runs with no config file at all.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ListenerConfig, LimitsConfig, ObservabilityConfig, ProxyConfig, ReloadConfig, RetryConfig,
    RewriteConfig, TargetConfig, TimeoutConfig,
};
pub use validation::{parse_target, validate_config, ValidationError};
