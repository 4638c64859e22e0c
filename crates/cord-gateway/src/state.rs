//! Connection state types.

use std::sync::atomic::{AtomicU8, Ordering};

/// State of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Opening the socket or waiting to reconnect.
    Connecting,
    /// Socket open.
    Connected,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

/// Atomic wrapper for connection state.
#[derive(Debug)]
pub struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    /// Create a new atomic state.
    #[must_use]
    pub const fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    /// Load the current state.
    #[must_use]
    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Store a new state.
    pub fn store(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Move from `from` to `to`, or return the state actually found.
    pub fn transition(&self, from: ConnectionState, to: ConnectionState) -> Result<(), ConnectionState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(ConnectionState::from_u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_enum() {
        assert_eq!(ConnectionState::Disconnected as u8, 0);
        assert_eq!(ConnectionState::Connecting as u8, 1);
        assert_eq!(ConnectionState::Connected as u8, 2);
    }

    #[test]
    fn test_atomic_connection_state() {
        let state = AtomicConnectionState::new(ConnectionState::Disconnected);
        assert_eq!(state.load(), ConnectionState::Disconnected);

        state.store(ConnectionState::Connecting);
        assert_eq!(state.load(), ConnectionState::Connecting);

        state.store(ConnectionState::Connected);
        assert_eq!(state.load(), ConnectionState::Connected);
    }

    #[test]
    fn test_transition() {
        let state = AtomicConnectionState::new(ConnectionState::Disconnected);

        assert!(state
            .transition(ConnectionState::Disconnected, ConnectionState::Connecting)
            .is_ok());
        assert_eq!(
            state.transition(ConnectionState::Disconnected, ConnectionState::Connecting),
            Err(ConnectionState::Connecting)
        );
        assert_eq!(state.load(), ConnectionState::Connecting);
    }
}
