use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
        }
    }
}

/// Connection state written by a client's reactor, readable from any thread.
#[derive(Clone, Debug, Default)]
pub(crate) struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Returns the previous state.
    pub fn set(&self, state: ConnectionState) -> ConnectionState {
        let prev = ConnectionState::from_u8(self.0.swap(state.as_u8(), Ordering::AcqRel));
        if prev != state {
            log::debug!("Connection state {prev:?} -> {state:?}");
        }

        prev
    }
}
