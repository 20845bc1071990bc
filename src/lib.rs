//! Edge dispatch gateway.
//!
//! Accepts HTTP requests, admits them through a process-wide token bucket,
//! picks a healthy backend with the configured selection strategy and
//! forwards the request there.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server (request id, access log, metrics)
//!                    │
//!                    ▼
//!              security::rate_limit ──▶ 429
//!                    │
//!                    ▼
//!              http::proxy ──▶ load_balancer::BackendRegistry ──▶ 503
//!                    │
//!                    ▼
//!                 Backend
//!
//!     health::HealthMonitor ──(periodic probes)──▶ BackendRegistry
//!     admin (separate listener) ──▶ BackendRegistry
//! ```

// Core subsystems
pub mod config;
pub mod http;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
