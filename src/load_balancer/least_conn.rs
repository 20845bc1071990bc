//! Least Connections load balancing strategy.

use crate::load_balancer::{backend::BackendState, round_robin::SelectionCursor, LoadBalancer};

/// Least connections selector.
/// Selects the backend with the fewest in-flight requests. The scan starts at
/// the rotation cursor, so ties rotate instead of always landing on the first
/// backend.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LoadBalancer for LeastConnections {
    fn next_server<'a>(
        &self,
        healthy: &[&'a BackendState],
        cursor: &mut SelectionCursor,
    ) -> Option<&'a BackendState> {
        if healthy.is_empty() {
            return None;
        }

        let len = healthy.len();
        let start = cursor.advance() % len;
        (0..len)
            .map(|offset| healthy[(start + offset) % len])
            .min_by_key(|b| b.active_connections())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::BackendDescriptor;

    fn state(name: &str) -> BackendState {
        BackendState::new(BackendDescriptor::new(name, format!("http://{}", name), 1))
    }

    #[test]
    fn test_least_conn() {
        let (b1, b2) = (state("b1"), state("b2"));
        let backends = vec![&b1, &b2];
        let mut cursor = SelectionCursor::new();

        // b1 busy: pick b2
        let _busy = b1.lease();
        assert_eq!(LeastConnections.next_server(&backends, &mut cursor).unwrap().name(), "b2");

        // b2 now has 2, b1 has 1
        let _l1 = b2.lease();
        let _l2 = b2.lease();
        assert_eq!(LeastConnections.next_server(&backends, &mut cursor).unwrap().name(), "b1");
    }

    #[test]
    fn test_ties_rotate() {
        let (b1, b2) = (state("b1"), state("b2"));
        let backends = vec![&b1, &b2];
        let mut cursor = SelectionCursor::new();

        assert_eq!(LeastConnections.next_server(&backends, &mut cursor).unwrap().name(), "b1");
        assert_eq!(LeastConnections.next_server(&backends, &mut cursor).unwrap().name(), "b2");
    }
}
