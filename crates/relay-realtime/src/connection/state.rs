//! Lifecycle states.

use std::sync::atomic::{AtomicU8, Ordering};

/// `Booting → Active → Closed`; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Created, not yet booted.
    Booting = 0,
    /// Receiving events.
    Active = 1,
    /// Torn down.
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Booting,
            1 => Self::Active,
            _ => Self::Closed,
        }
    }
}

/// Atomically updated [`ConnectionState`].
#[derive(Debug)]
pub struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    /// Starts in `Booting`.
    pub fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Booting as u8))
    }

    /// Current state.
    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Moves `Booting → Active`. Returns `false` from any other state.
    pub fn activate(&self) -> bool {
        self.0
            .compare_exchange(
                ConnectionState::Booting as u8,
                ConnectionState::Active as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Moves to `Closed`. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.0.swap(ConnectionState::Closed as u8, Ordering::SeqCst) != ConnectionState::Closed as u8
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new()
    }
}
