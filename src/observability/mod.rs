//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, summaries via Telemetry)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON lines)
//!     → GET /metrics (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through access logs and upstream headers
//! - Telemetry is a trait so tests can observe events without a recorder

pub mod logging;
pub mod metrics;

pub use metrics::{PrometheusTelemetry, Telemetry};
