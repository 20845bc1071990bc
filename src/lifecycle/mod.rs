//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → listeners stop accepting, health monitor exits
//!     → drain() waits for the server task up to the grace period
//! ```
//!
//! # Design Decisions
//! - One broadcast channel reaches every long-running task
//! - Shutdown has a deadline: in-flight requests past it are abandoned

pub mod shutdown;
pub mod signals;

pub use shutdown::{DrainOutcome, Shutdown};
pub use signals::shutdown_signal;
