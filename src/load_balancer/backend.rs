//! Backend abstraction.
//!
//! # Responsibilities
//! - Describe a single configured backend (immutable descriptor)
//! - Carry its mutable runtime state (health, weight)
//! - Track in-flight requests (for Least Connections LB)

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::BackendConfig;

/// Immutable description of a backend, supplied at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    /// Unique key within the registry.
    pub name: String,
    /// URL requests are forwarded to. Parsed at dispatch time.
    pub target: String,
    /// Selection bias for weighted round robin.
    pub weight: u32,
    /// Path probed for liveness, relative to `target`.
    pub health_path: String,
}

impl BackendDescriptor {
    pub fn new(name: impl Into<String>, target: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            weight,
            health_path: "/health".to_string(),
        }
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    /// URL probed by the health monitor.
    pub fn health_url(&self) -> String {
        format!("{}{}", self.target.trim_end_matches('/'), self.health_path)
    }
}

impl From<&BackendConfig> for BackendDescriptor {
    fn from(config: &BackendConfig) -> Self {
        Self {
            name: config.name.clone(),
            target: config.url.clone(),
            weight: config.weight,
            health_path: config.health.clone(),
        }
    }
}

/// Runtime state of one backend, owned by the registry.
#[derive(Debug, Clone)]
pub struct BackendState {
    pub descriptor: Arc<BackendDescriptor>,
    /// Eligible for selection. Backends start healthy before the first probe.
    pub healthy: bool,
    /// Effective weight, copied from the descriptor.
    pub weight: u32,
    active_connections: Arc<AtomicUsize>,
}

impl BackendState {
    pub fn new(descriptor: BackendDescriptor) -> Self {
        let weight = descriptor.weight;
        Self {
            descriptor: Arc::new(descriptor),
            healthy: true,
            weight,
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Number of requests currently forwarded to this backend.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Take a lease that counts as one in-flight request until dropped.
    pub fn lease(&self) -> BackendLease {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        BackendLease {
            descriptor: self.descriptor.clone(),
            active_connections: self.active_connections.clone(),
        }
    }
}

/// A selected backend. Decrements the in-flight count on drop.
#[derive(Debug)]
pub struct BackendLease {
    descriptor: Arc<BackendDescriptor>,
    active_connections: Arc<AtomicUsize>,
}

impl Deref for BackendLease {
    type Target = BackendDescriptor;
    fn deref(&self) -> &Self::Target {
        &self.descriptor
    }
}

impl Drop for BackendLease {
    fn drop(&mut self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}
