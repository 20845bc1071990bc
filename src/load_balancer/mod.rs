//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted
//!     → registry.rs (write lock: healthy snapshot + cursor)
//!     → Apply configured algorithm:
//!         - round_robin.rs (rotate through backends)
//!         - weighted.rs (random draw proportional to weight)
//!         - random.rs (uniform pick)
//!         - least_conn.rs (fewest in-flight requests)
//!     → backend.rs (lease counts the request as in flight)
//!     → Return lease, or None when nothing is healthy
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless; the registry owns the cursor
//! - Unhealthy backends excluded from selection
//! - Unknown algorithm names are normalized when set, never at selection time

pub mod backend;
pub mod least_conn;
pub mod random;
pub mod registry;
pub mod round_robin;
pub mod weighted;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use self::backend::BackendState;
use self::least_conn::LeastConnections;
use self::random::RandomPick;
use self::round_robin::{RoundRobin, SelectionCursor};
use self::weighted::WeightedRoundRobin;

pub use backend::{BackendDescriptor, BackendLease};
pub use registry::{BackendRegistry, RegistryStats, UpdateOutcome};

/// A backend selection strategy.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Pick one of `healthy`, or `None` when it is empty.
    fn next_server<'a>(
        &self,
        healthy: &[&'a BackendState],
        cursor: &mut SelectionCursor,
    ) -> Option<&'a BackendState>;
}

/// Selectable algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
    Random,
    LeastConnections,
}

/// Error for an algorithm name that is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown load balancing algorithm: {0}")]
pub struct UnknownAlgorithm(pub String);

static ROUND_ROBIN: RoundRobin = RoundRobin;
static WEIGHTED: WeightedRoundRobin = WeightedRoundRobin;
static RANDOM: RandomPick = RandomPick;
static LEAST_CONNECTIONS: LeastConnections = LeastConnections;

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round_robin",
            Algorithm::WeightedRoundRobin => "weighted_round_robin",
            Algorithm::Random => "random",
            Algorithm::LeastConnections => "least_connections",
        }
    }

    /// Parse a configured name, falling back to round robin with a warning.
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|e: UnknownAlgorithm| {
            tracing::warn!(error = %e, "Invalid load balancing algorithm, using round_robin");
            Algorithm::RoundRobin
        })
    }

    pub(crate) fn balancer(self) -> &'static dyn LoadBalancer {
        match self {
            Algorithm::RoundRobin => &ROUND_ROBIN,
            Algorithm::WeightedRoundRobin => &WEIGHTED,
            Algorithm::Random => &RANDOM,
            Algorithm::LeastConnections => &LEAST_CONNECTIONS,
        }
    }
}

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "round_robin" => Ok(Algorithm::RoundRobin),
            "weighted_round_robin" => Ok(Algorithm::WeightedRoundRobin),
            "random" => Ok(Algorithm::Random),
            "least_connections" => Ok(Algorithm::LeastConnections),
            other => Err(UnknownAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_names_round_trip() {
        for algorithm in [
            Algorithm::RoundRobin,
            Algorithm::WeightedRoundRobin,
            Algorithm::Random,
            Algorithm::LeastConnections,
        ] {
            assert_eq!(algorithm.as_str().parse::<Algorithm>(), Ok(algorithm));
        }
    }

    #[test]
    fn test_unknown_name_defaults() {
        assert!("fastest".parse::<Algorithm>().is_err());
        assert_eq!(Algorithm::parse_or_default("fastest"), Algorithm::RoundRobin);
    }
}
