//! Uniform random load balancing strategy.

use rand::Rng;

use crate::load_balancer::{backend::BackendState, round_robin::SelectionCursor, LoadBalancer};

#[derive(Debug, Default)]
pub struct RandomPick;

impl LoadBalancer for RandomPick {
    fn next_server<'a>(
        &self,
        healthy: &[&'a BackendState],
        _cursor: &mut SelectionCursor,
    ) -> Option<&'a BackendState> {
        if healthy.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..healthy.len());
        Some(healthy[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::BackendDescriptor;

    #[test]
    fn test_random_covers_all_backends() {
        let states: Vec<_> = ["b1", "b2", "b3"]
            .iter()
            .map(|n| BackendState::new(BackendDescriptor::new(*n, format!("http://{}", n), 1)))
            .collect();
        let backends: Vec<_> = states.iter().collect();
        let mut cursor = SelectionCursor::new();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..300 {
            seen.insert(RandomPick.next_server(&backends, &mut cursor).unwrap().name().to_string());
        }
        assert_eq!(seen.len(), 3);
    }
}
