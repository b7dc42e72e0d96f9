//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the connection lifecycle.
//! They have no external dependencies and contain only business logic.

use serde::{Deserialize, Serialize};

/// Liveness bookkeeping for the pooled datastore connection.
///
/// Exactly one instance exists per manager. It starts disconnected with an
/// empty retry budget and is only mutated by the manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    /// Whether the last connect or probe succeeded
    pub connected: bool,
    /// Number of the last failed attempt on the backoff ladder since the
    /// link was last known good
    pub reconnect_attempts: u32,
}

impl ConnectionState {
    /// Record an observed success.
    ///
    /// Returns true if this flipped the state from disconnected.
    pub fn mark_connected(&mut self) -> bool {
        let recovered = !self.connected;
        self.connected = true;
        self.reconnect_attempts = 0;
        recovered
    }

    /// Record an observed failure without spending any retry budget.
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    /// Record a failed connect attempt on the backoff ladder.
    ///
    /// The counter is clamped to `ceiling`.
    pub fn record_failed_attempt(&mut self, attempt: u32, ceiling: u32) {
        self.connected = false;
        self.reconnect_attempts = attempt.min(ceiling);
    }

    /// Whether another recovery sequence may be launched.
    pub fn has_retry_budget(&self, ceiling: u32) -> bool {
        self.reconnect_attempts < ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = ConnectionState::default();
        assert!(!state.connected);
        assert_eq!(state.reconnect_attempts, 0);
    }

    #[test]
    fn test_mark_connected_resets_attempts() {
        let mut state = ConnectionState {
            connected: false,
            reconnect_attempts: 3,
        };
        assert!(state.mark_connected());
        assert!(state.connected);
        assert_eq!(state.reconnect_attempts, 0);

        // Already connected: not a recovery
        assert!(!state.mark_connected());
    }

    #[test]
    fn test_mark_disconnected_keeps_budget() {
        let mut state = ConnectionState {
            connected: true,
            reconnect_attempts: 2,
        };
        state.mark_disconnected();
        assert!(!state.connected);
        assert_eq!(state.reconnect_attempts, 2);
    }

    #[test]
    fn test_record_failed_attempt_clamps_to_ceiling() {
        let mut state = ConnectionState::default();
        state.record_failed_attempt(4, 5);
        assert_eq!(state.reconnect_attempts, 4);
        assert!(state.has_retry_budget(5));

        state.record_failed_attempt(9, 5);
        assert_eq!(state.reconnect_attempts, 5);
        assert!(!state.has_retry_budget(5));
    }

    #[test]
    fn test_serialize() {
        let state = ConnectionState {
            connected: true,
            reconnect_attempts: 0,
        };
        let json = serde_json::to_value(state).unwrap();
        assert_eq!(json["connected"], true);
        assert_eq!(json["reconnect_attempts"], 0);
    }
}
