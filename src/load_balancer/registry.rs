//! Backend registry and selection.
//!
//! # Responsibilities
//! - Hold every configured backend and its runtime health/weight
//! - Answer "which backends are healthy" as one consistent snapshot
//! - Apply the configured algorithm to pick a backend per request
//!
//! One reader/writer lock guards the table, the algorithm and the rotation
//! cursor together, so reading the healthy set and applying the algorithm are
//! atomic with respect to health flips and algorithm changes. No I/O happens
//! under the lock.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::config::BackendConfig;
use crate::load_balancer::{
    backend::{BackendDescriptor, BackendLease, BackendState},
    round_robin::SelectionCursor,
    Algorithm,
};

/// Result of a registry mutation addressed by backend name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The value changed.
    Applied,
    /// The backend already had this value.
    Unchanged,
    /// No backend with that name is registered.
    NotFound,
}

#[derive(Debug)]
struct RegistryState {
    backends: Vec<BackendState>,
    algorithm: Algorithm,
    cursor: SelectionCursor,
}

impl RegistryState {
    fn healthy(&self) -> Vec<&BackendState> {
        self.backends.iter().filter(|b| b.healthy).collect()
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut BackendState> {
        self.backends.iter_mut().find(|b| b.name() == name)
    }
}

/// Shared table of backends plus the selection engine operating over it.
#[derive(Debug)]
pub struct BackendRegistry {
    inner: RwLock<RegistryState>,
}

impl BackendRegistry {
    /// Build a registry. Later duplicates of a name are dropped.
    pub fn new(descriptors: Vec<BackendDescriptor>, algorithm: Algorithm) -> Self {
        let mut seen = HashSet::new();
        let mut backends = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if !seen.insert(descriptor.name.clone()) {
                tracing::warn!(backend = %descriptor.name, "Duplicate backend name, ignoring later entry");
                continue;
            }
            backends.push(BackendState::new(descriptor));
        }

        tracing::info!(backends = backends.len(), algorithm = %algorithm, "Backend registry initialized");

        Self {
            inner: RwLock::new(RegistryState {
                backends,
                algorithm,
                cursor: SelectionCursor::new(),
            }),
        }
    }

    /// Build a registry from configuration, normalizing the algorithm name.
    pub fn from_config(configs: &[BackendConfig], algorithm: &str) -> Self {
        let descriptors = configs.iter().map(BackendDescriptor::from).collect();
        Self::new(descriptors, Algorithm::parse_or_default(algorithm))
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// All healthy backends, in registration order.
    pub fn snapshot_healthy(&self) -> Vec<BackendState> {
        self.read().healthy().into_iter().cloned().collect()
    }

    pub fn healthy_count(&self) -> usize {
        self.read().backends.iter().filter(|b| b.healthy).count()
    }

    /// Every configured backend, healthy or not (used by the prober).
    pub fn descriptors(&self) -> Vec<Arc<BackendDescriptor>> {
        self.read().backends.iter().map(|b| b.descriptor.clone()).collect()
    }

    /// Pick a backend with the configured algorithm.
    ///
    /// `None` means no capacity right now; callers should not retry inline.
    pub fn next(&self) -> Option<BackendLease> {
        let mut guard = self.write();
        let state = &mut *guard;
        let healthy: Vec<&BackendState> = state.backends.iter().filter(|b| b.healthy).collect();
        if healthy.is_empty() {
            tracing::warn!("No healthy backends available");
            return None;
        }
        state
            .algorithm
            .balancer()
            .next_server(&healthy, &mut state.cursor)
            .map(BackendState::lease)
    }

    /// Record the health of a backend.
    pub fn set_health(&self, name: &str, healthy: bool) -> UpdateOutcome {
        let mut state = self.write();
        match state.find_mut(name) {
            Some(backend) if backend.healthy == healthy => UpdateOutcome::Unchanged,
            Some(backend) => {
                tracing::info!(backend = %name, from = backend.healthy, to = healthy, "Backend health changed");
                backend.healthy = healthy;
                UpdateOutcome::Applied
            }
            None => {
                tracing::warn!(backend = %name, "Backend not found when updating health status");
                UpdateOutcome::NotFound
            }
        }
    }

    /// Override the effective weight of a backend.
    pub fn set_weight(&self, name: &str, weight: u32) -> UpdateOutcome {
        let mut state = self.write();
        match state.find_mut(name) {
            Some(backend) if backend.weight == weight => UpdateOutcome::Unchanged,
            Some(backend) => {
                tracing::info!(backend = %name, from = backend.weight, to = weight, "Backend weight changed");
                backend.weight = weight;
                UpdateOutcome::Applied
            }
            None => {
                tracing::warn!(backend = %name, "Backend not found when updating weight");
                UpdateOutcome::NotFound
            }
        }
    }

    /// Switch algorithm by name. Unknown names fall back to round robin.
    /// Returns the algorithm now in effect.
    pub fn set_algorithm(&self, name: &str) -> Algorithm {
        let algorithm = Algorithm::parse_or_default(name);
        self.write().algorithm = algorithm;
        tracing::info!(algorithm = %algorithm, "Load balancing algorithm set");
        algorithm
    }

    pub fn algorithm(&self) -> Algorithm {
        self.read().algorithm
    }

    /// Consistent view of the whole table, taken under one read lock.
    pub fn stats(&self) -> RegistryStats {
        let state = self.read();
        let backends: Vec<BackendStats> = state
            .backends
            .iter()
            .map(|b| BackendStats {
                name: b.descriptor.name.clone(),
                url: b.descriptor.target.clone(),
                healthy: b.healthy,
                weight: b.weight,
                active_connections: b.active_connections(),
            })
            .collect();
        let healthy_backends = backends.iter().filter(|b| b.healthy).count();

        RegistryStats {
            total_backends: backends.len(),
            healthy_backends,
            unhealthy_backends: backends.len() - healthy_backends,
            algorithm: state.algorithm,
            backends,
        }
    }
}

/// Registry statistics served by the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_backends: usize,
    pub healthy_backends: usize,
    pub unhealthy_backends: usize,
    pub algorithm: Algorithm,
    pub backends: Vec<BackendStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendStats {
    pub name: String,
    pub url: String,
    pub healthy: bool,
    pub weight: u32,
    pub active_connections: usize,
}
