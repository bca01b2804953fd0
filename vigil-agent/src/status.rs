//! Shared agent status board
//!
//! Replaces ambient globals with an explicit synchronized holder: the sender
//! takes the lock briefly once per attempt, readers (status command, future
//! tray icon) clone an immutable snapshot and never block the send loop.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Loop not started yet.
    Starting,
    /// Last attempt was acknowledged by the server.
    Connected,
    /// Last attempt failed, retry budget not yet spent.
    Retrying,
    /// Retry budget spent; still retrying at the capped delay ("red" state).
    Exhausted,
    /// Operator-initiated shutdown completed.
    Stopped,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Starting => "starting",
            ConnectionState::Connected => "connected",
            ConnectionState::Retrying => "retrying",
            ConnectionState::Exhausted => "exhausted",
            ConnectionState::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentSnapshot {
    pub connection: ConnectionState,
    pub heartbeat_count: u64,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Clone)]
pub struct StatusBoard {
    inner: Arc<Mutex<AgentSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(AgentSnapshot {
                connection: ConnectionState::Starting,
                heartbeat_count: 0,
                consecutive_failures: 0,
                last_success: None,
                last_error: None,
            })),
        }
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        self.lock().clone()
    }

    pub fn record_success(&self, at: DateTime<Utc>) {
        let mut state = self.lock();
        state.connection = ConnectionState::Connected;
        state.heartbeat_count += 1;
        state.consecutive_failures = 0;
        state.last_success = Some(at);
        state.last_error = None;
    }

    pub fn record_failure(&self, error: String, consecutive_failures: u32, exhausted: bool) {
        let mut state = self.lock();
        state.connection = if exhausted {
            ConnectionState::Exhausted
        } else {
            ConnectionState::Retrying
        };
        state.consecutive_failures = consecutive_failures;
        state.last_error = Some(error);
    }

    pub fn mark_stopped(&self) {
        self.lock().connection = ConnectionState::Stopped;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AgentSnapshot> {
        // a poisoned board is still readable state, not a reason to die
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_resets_failures_and_counts() {
        let board = StatusBoard::new();
        board.record_failure("timeout".to_string(), 2, false);
        board.record_success(Utc::now());

        let snap = board.snapshot();
        assert_eq!(snap.connection, ConnectionState::Connected);
        assert_eq!(snap.heartbeat_count, 1);
        assert_eq!(snap.consecutive_failures, 0);
        assert!(snap.last_success.is_some());
        assert!(snap.last_error.is_none());
    }

    #[test]
    fn exhausted_failures_flip_to_red_state() {
        let board = StatusBoard::new();
        board.record_failure("connection refused".to_string(), 2, false);
        assert_eq!(board.snapshot().connection, ConnectionState::Retrying);

        board.record_failure("connection refused".to_string(), 3, true);
        let snap = board.snapshot();
        assert_eq!(snap.connection, ConnectionState::Exhausted);
        assert_eq!(snap.consecutive_failures, 3);
        assert_eq!(snap.last_error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn readers_see_independent_snapshots() {
        let board = StatusBoard::new();
        let before = board.snapshot();
        board.record_success(Utc::now());

        assert_eq!(before.heartbeat_count, 0);
        assert_eq!(board.snapshot().heartbeat_count, 1);
    }
}
