//! Round-robin load balancing strategy.

use crate::load_balancer::{backend::BackendState, LoadBalancer};

/// Cursor value at which the rotation restarts from zero.
pub const CURSOR_WRAP: usize = 1_000_000;

/// Rotation counter shared by the cursor-driven strategies.
///
/// Only ever mutated while the registry's write lock is held.
#[derive(Debug, Default)]
pub struct SelectionCursor {
    position: usize,
}

impl SelectionCursor {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> usize {
        self.position
    }

    /// Return the current position and move forward by one.
    pub fn advance(&mut self) -> usize {
        let current = self.position;
        self.position += 1;
        if self.position >= CURSOR_WRAP {
            self.position = 0;
        }
        current
    }
}

/// Round-robin selector.
#[derive(Debug, Default)]
pub struct RoundRobin;

impl LoadBalancer for RoundRobin {
    fn next_server<'a>(
        &self,
        healthy: &[&'a BackendState],
        cursor: &mut SelectionCursor,
    ) -> Option<&'a BackendState> {
        if healthy.is_empty() {
            return None;
        }
        let index = cursor.advance() % healthy.len();
        Some(healthy[index])
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
    fn test_round_robin() {
        let (b1, b2) = (state("b1"), state("b2"));
        let backends = vec![&b1, &b2];
        let mut cursor = SelectionCursor::new();

        let picks: Vec<_> = (0..3)
            .map(|_| RoundRobin.next_server(&backends, &mut cursor).unwrap().name().to_string())
            .collect();
        assert_eq!(picks, ["b1", "b2", "b1"]);
    }

    #[test]
    fn test_empty_returns_none() {
        let mut cursor = SelectionCursor::new();
        assert!(RoundRobin.next_server(&[], &mut cursor).is_none());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_cursor_wraps() {
        let mut cursor = SelectionCursor { position: CURSOR_WRAP - 1 };
        assert_eq!(cursor.advance(), CURSOR_WRAP - 1);
        assert_eq!(cursor.position(), 0);
    }
}
