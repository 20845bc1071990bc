//! Weighted load balancing strategy.
//!
//! Draws a uniform integer in `[0, total_weight)` and walks the healthy set
//! accumulating weights. Long-run frequency is proportional to weight and no
//! per-backend counters are needed.

use rand::Rng;

use crate::load_balancer::{
    backend::BackendState,
    round_robin::{RoundRobin, SelectionCursor},
    LoadBalancer,
};

#[derive(Debug, Default)]
pub struct WeightedRoundRobin;

impl LoadBalancer for WeightedRoundRobin {
    fn next_server<'a>(
        &self,
        healthy: &[&'a BackendState],
        cursor: &mut SelectionCursor,
    ) -> Option<&'a BackendState> {
        let first = *healthy.first()?;

        let total: u64 = healthy.iter().map(|b| u64::from(b.weight)).sum();
        if total == 0 {
            return RoundRobin.next_server(healthy, cursor);
        }

        let draw = rand::thread_rng().gen_range(0..total);
        let mut accumulated = 0u64;
        for backend in healthy {
            accumulated += u64::from(backend.weight);
            if draw < accumulated {
                return Some(*backend);
            }
        }

        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::BackendDescriptor;

    fn state(name: &str, weight: u32) -> BackendState {
        BackendState::new(BackendDescriptor::new(name, format!("http://{}", name), weight))
    }

    #[test]
    fn test_distribution_follows_weights() {
        let (heavy, light) = (state("heavy", 75), state("light", 25));
        let backends = vec![&heavy, &light];
        let mut cursor = SelectionCursor::new();

        let heavy_hits = (0..1000)
            .filter(|_| WeightedRoundRobin.next_server(&backends, &mut cursor).unwrap().name() == "heavy")
            .count();

        // 75% of 1000 with a generous band (> 6 sigma).
        assert!((660..=840).contains(&heavy_hits), "heavy got {}", heavy_hits);
    }

    #[test]
    fn test_zero_weight_backend_never_drawn() {
        let (live, idle) = (state("live", 10), state("idle", 0));
        let backends = vec![&idle, &live];
        let mut cursor = SelectionCursor::new();

        for _ in 0..200 {
            assert_eq!(WeightedRoundRobin.next_server(&backends, &mut cursor).unwrap().name(), "live");
        }
    }

    #[test]
    fn test_all_zero_weights_rotate() {
        let (b1, b2) = (state("b1", 0), state("b2", 0));
        let backends = vec![&b1, &b2];
        let mut cursor = SelectionCursor::new();

        assert_eq!(WeightedRoundRobin.next_server(&backends, &mut cursor).unwrap().name(), "b1");
        assert_eq!(WeightedRoundRobin.next_server(&backends, &mut cursor).unwrap().name(), "b2");
    }
}
