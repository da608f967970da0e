//! Mixer control capabilities and the transports implementing them.
//!
//! Callers program against [`Mixer`] and don't need to know which
//! transport backs an instance. Operations a transport can't express
//! are accepted and logged, without any effect on the mixer.

use crossbeam_channel as channel;
use std::time::Duration;

pub mod config;
pub use config::{ConnectionConfig, McuConfig, PollConfig};

mod error;
pub use error::Error;

pub mod event;
pub use event::MixerEvent;

mod factory;
pub use factory::{Buildable, Factory, FACTORY};

mod io;

pub mod limits;

pub mod protocol;
pub use protocol::{mackie::McuClient, x32::X32Client};

pub mod retry;

mod state;
pub use state::ConnectionState;

mod target;
pub use target::Target;

/// Unity gain (0 dB) fader position.
pub const UNITY_LEVEL: f64 = 0.75;

/// Brings a fader `level` into `[0.0, 1.0]`.
pub fn clamp_level(level: f64) -> f64 {
    if level.is_nan() {
        return 0.0;
    }

    level.clamp(0.0, 1.0)
}

/// Mixer control capabilities.
///
/// Channels, DCAs, scenes and mute groups are 1-based. Except for
/// [`Mixer::connect`], calls return as soon as the request is handed
/// to the socket: the mixer doesn't acknowledge them, its state changes
/// are published on the [`Mixer::events`] channel.
pub trait Mixer: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn config(&self) -> &ConnectionConfig;

    /// Timeout used when the caller has no preference.
    fn default_connect_timeout(&self) -> Duration;

    /// Blocks until the mixer answered or `timeout` expired.
    ///
    /// Fails immediately with [`Error::ConnectInProgress`] if another
    /// attempt is pending on this instance.
    fn connect(&self, timeout: Duration) -> Result<(), Error>;

    /// Releases the socket and stops all timers. Idempotent.
    fn disconnect(&self);

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    fn mute_channel(&self, channel: u8, muted: bool) -> Result<(), Error>;
    fn set_channel_fader(&self, channel: u8, level: f64) -> Result<(), Error>;
    fn get_channel_mute_status(&self, channel: u8) -> Result<(), Error>;
    fn get_channel_fader_level(&self, channel: u8) -> Result<(), Error>;

    fn mute_dca(&self, dca: u8, muted: bool) -> Result<(), Error>;
    fn set_dca_fader(&self, dca: u8, level: f64) -> Result<(), Error>;
    fn get_dca_mute_status(&self, dca: u8) -> Result<(), Error>;

    fn recall_scene(&self, scene: u8) -> Result<(), Error>;

    fn load_scene(&self, scene: u8) -> Result<(), Error> {
        self.recall_scene(scene)
    }

    fn set_mute_group(&self, group: u8, active: bool) -> Result<(), Error>;
    fn get_mute_group_state(&self, group: u8) -> Result<(), Error>;

    /// Requests periodic state updates for `target`. Idempotent.
    fn subscribe(&self, target: Target);
    fn unsubscribe(&self, target: Target);

    fn subscribe_to_channel(&self, channel: u8) {
        self.subscribe(Target::Channel(channel));
    }

    fn subscribe_to_dca(&self, dca: u8) {
        self.subscribe(Target::Dca(dca));
    }

    fn subscribe_to_mute_group(&self, group: u8) {
        self.subscribe(Target::MuteGroup(group));
    }

    fn unsubscribe_from_channel(&self, channel: u8) {
        self.unsubscribe(Target::Channel(channel));
    }

    fn unsubscribe_from_dca(&self, dca: u8) {
        self.unsubscribe(Target::Dca(dca));
    }

    fn unsubscribe_from_mute_group(&self, group: u8) {
        self.unsubscribe(Target::MuteGroup(group));
    }

    /// Registers a listener for inbound state changes and connection events.
    ///
    /// Every listener receives every event emitted after its registration.
    /// Dropping the receiver unregisters it.
    fn events(&self) -> channel::Receiver<MixerEvent>;
}
