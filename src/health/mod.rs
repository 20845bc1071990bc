//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer (own task, independent of traffic)
//!     → One probe task per backend, each with its own timeout
//!     → registry.set_health + telemetry.set_backend_status
//! ```
//!
//! # Design Decisions
//! - Backends start healthy; the first probe may demote them
//! - A probe failure is local to its backend and never stops the loop
//! - One probe result flips state directly (no thresholds)
//! - Selections may see health up to one interval stale

pub mod active;

pub use active::{HealthMonitor, Prober, ProbeError};
