//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (process-wide token bucket, exempt paths bypass)
//!     → Pass to routing
//!
//! Forwarding:
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//! ```
//!
//! # Design Decisions
//! - Admission runs before any backend work
//! - Rejections carry a fixed Retry-After, not one computed from the bucket
//! - No trust in client-supplied hop-by-hop headers

pub mod headers;
pub mod rate_limit;

pub use rate_limit::{AdmissionGate, AdmissionState};
