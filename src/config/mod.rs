//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml (optional)
//!     → loader.rs (parse & deserialize, GATEWAY_* env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed by value to the server at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BackendConfig, GatewayConfig, HealthCheckConfig, LoadBalancerConfig, LogFormat,
    ObservabilityConfig, RateLimitConfig, ServerConfig,
};
