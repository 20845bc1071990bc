//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → request.rs (request ID, client address)
//!     → middleware.rs (access log, metrics capture)
//!     → security::rate_limit (admission)
//!     → proxy.rs (select backend, rewrite, forward)
//!     → Send to client
//! ```

pub mod middleware;
pub mod proxy;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, GatewayServer, ServerError};
