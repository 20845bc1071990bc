//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. Every problem is
//! collected so an operator sees the whole list in one run.
//!
//! Backend URLs are not parsed here. A malformed target is reported at
//! dispatch time as an internal error for the requests that land on it.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::{GatewayConfig, PLACEHOLDER_ADMIN_KEY};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("server.address {0:?} is not a socket address")]
    InvalidAddress(String),
    #[error("server.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("backend at index {0} has an empty name")]
    EmptyBackendName(usize),
    #[error("backend {0:?} is defined more than once")]
    DuplicateBackend(String),
    #[error("backend {0:?} has an empty url")]
    EmptyBackendUrl(String),
    #[error("backend {0:?} health path {1:?} must start with '/'")]
    RelativeHealthPath(String, String),
    #[error("rate_limit.burst_size must be greater than zero")]
    ZeroBurst,
    #[error("health_check.interval_secs must be greater than zero")]
    ZeroProbeInterval,
    #[error("health_check.timeout_secs ({timeout}) must be shorter than interval_secs ({interval})")]
    ProbeTimeoutTooLong { timeout: u64, interval: u64 },
    #[error("admin.api_key must be set to a non-default value when the admin API is enabled")]
    InsecureAdminKey,
}

/// Validate a parsed configuration, returning every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress(config.server.address.clone()));
    }
    if config.server.read_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("read_timeout_secs"));
    }
    if config.server.write_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("write_timeout_secs"));
    }
    if config.server.idle_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("idle_timeout_secs"));
    }

    let mut seen = HashSet::new();
    for (index, backend) in config.backends.iter().enumerate() {
        if backend.name.trim().is_empty() {
            errors.push(ValidationError::EmptyBackendName(index));
            continue;
        }
        if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        if backend.url.trim().is_empty() {
            errors.push(ValidationError::EmptyBackendUrl(backend.name.clone()));
        }
        if !backend.health.starts_with('/') {
            errors.push(ValidationError::RelativeHealthPath(
                backend.name.clone(),
                backend.health.clone(),
            ));
        }
    }

    if config.rate_limit.burst_size == 0 {
        errors.push(ValidationError::ZeroBurst);
    }

    let probe = &config.health_check;
    if probe.enabled {
        if probe.interval_secs == 0 {
            errors.push(ValidationError::ZeroProbeInterval);
        } else if probe.timeout_secs >= probe.interval_secs {
            errors.push(ValidationError::ProbeTimeoutTooLong {
                timeout: probe.timeout_secs,
                interval: probe.interval_secs,
            });
        }
    }

    let admin = &config.admin;
    if admin.enabled {
        let key = admin.api_key.trim();
        if key.is_empty() || key == PLACEHOLDER_ADMIN_KEY {
            errors.push(ValidationError::InsecureAdminKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
