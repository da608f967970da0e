//! Remote control of Behringer X32 mixers.
//!
//! Two transports are available behind the [`Mixer`] capabilities:
//! OSC over UDP ([`X32Client`]) and Mackie Control over TCP
//! ([`McuClient`]).

pub mod bytes;
pub mod midi;

pub mod mixer;
pub use mixer::{
    ConnectionConfig, ConnectionState, Error, McuClient, Mixer, MixerEvent, Target, X32Client,
    FACTORY,
};

pub mod osc;
