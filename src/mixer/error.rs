use std::{sync::Arc, time::Duration};

use crate::{midi, osc};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No response from {host}:{port} within {} ms", .timeout.as_millis())]
    ConnectTimeout {
        host: Arc<str>,
        port: u16,
        timeout: Duration,
    },

    #[error("A connection attempt is already in progress")]
    ConnectInProgress,

    #[error("Connection attempt cancelled by disconnection")]
    Disconnected,

    #[error("Mixer not connected")]
    NotConnected,

    #[error("Socket error: {}", .0)]
    Socket(#[from] std::io::Error),

    #[error("Couldn't resolve mixer host {}", .0)]
    Resolve(Arc<str>),

    #[error("Invalid connection settings: {}", .0)]
    InvalidConfig(&'static str),

    #[error("Invalid {what} {value}: expected {min} to {max}")]
    OutOfRange {
        what: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },

    #[error("Unknown mixer protocol {}", .0)]
    UnknownProtocol(Arc<str>),

    #[error("Mixer client thread terminated")]
    ReactorGone,

    #[error("OSC error: {}", .0)]
    Osc(#[from] osc::Error),

    #[error("MIDI error: {}", .0)]
    Midi(#[from] midi::Error),
}

impl Error {
    /// Whether a new connection attempt might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ConnectTimeout { .. }
                | Error::Socket(_)
                | Error::Resolve(_)
                | Error::Disconnected
        )
    }
}
