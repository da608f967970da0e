//! X32 control through its Mackie Control emulation, MIDI over TCP.
//!
//! Only the first bank of 8 channel strips is reachable: mutes are
//! control changes, faders are pitch bends. The mixer pushes state
//! changes on its own, so there is nothing to subscribe to nor query.
//! DCAs, scenes and mute groups have no Mackie Control counterpart:
//! these calls are accepted and have no effect.

use crossbeam_channel as channel;
use std::{
    io::{self, Write},
    net::{Shutdown, TcpStream},
    ops::ControlFlow,
    thread,
    time::{Duration, Instant},
};

use crate::{
    bytes, midi,
    mixer::{
        io::{self as mixer_io, Inbound, Pending, Reader, Reply, Request, Status},
        Buildable, ConnectionConfig, ConnectionState, Error, McuConfig, Mixer, MixerEvent, Target,
    },
};

pub const DEFAULT_PORT: u16 = 10111;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Channel strips per bank.
pub const BANK_SIZE: u8 = 8;

mod mute {
    pub const BASE_CONTROLLER: u8 = 16;

    pub const ON: u8 = 0x7f;
    pub const OFF: u8 = 0x00;
}

/// Messages implementing the mixer capabilities.
pub mod msg {
    use super::{mute, BANK_SIZE};
    use crate::{
        midi::{self, normalized_f64},
        mixer::clamp_level,
    };

    /// Channels beyond the bank land on its last strip.
    fn strip(channel: u8) -> midi::Channel {
        midi::Channel::from(channel.clamp(1, BANK_SIZE) - 1)
    }

    pub fn mute_channel(channel: u8, muted: bool) -> midi::Msg {
        midi::Msg::control_change(
            midi::Channel::default(),
            mute::BASE_CONTROLLER + u8::from(strip(channel)),
            if muted { mute::ON } else { mute::OFF },
        )
    }

    pub fn channel_fader(channel: u8, level: f64) -> Result<midi::Msg, midi::Error> {
        let value = normalized_f64::to_u14(clamp_level(level))?;

        midi::Msg::pitch_bend(strip(channel), value)
    }
}

/// X32 client speaking Mackie Control over TCP.
pub struct McuClient {
    cfg: ConnectionConfig,
    handle: mixer_io::Handle<midi::Msg>,
}

impl McuClient {
    pub fn new(cfg: ConnectionConfig) -> Result<Self, Error> {
        Self::with_mcu_config(cfg, McuConfig::default())
    }

    pub fn with_mcu_config(cfg: ConnectionConfig, mcu_cfg: McuConfig) -> Result<Self, Error> {
        cfg.validate()?;
        log::debug!("Creating Mackie Control client for {cfg}");

        let handle = {
            let cfg = cfg.clone();
            mixer_io::Handle::spawn("x32-mcu", move |req_rx, state, events| {
                Reactor::new(cfg, mcu_cfg, Status::new(state, events)).run(req_rx)
            })?
        };

        Ok(Self { cfg, handle })
    }

    pub fn send_msg(&self, msg: midi::Msg) -> Result<(), Error> {
        self.handle.send(msg)
    }

    fn unsupported(&self, what: &str) -> Result<(), Error> {
        log::warn!("{what} is not available over Mackie Control");
        Ok(())
    }

    fn as_feedback(&self, what: &str) -> Result<(), Error> {
        log::debug!("{what} is pushed by the mixer over Mackie Control");
        Ok(())
    }
}

impl Buildable for McuClient {
    const NAME: &'static str = "mcu";
    const DEFAULT_PORT: u16 = DEFAULT_PORT;

    fn build(cfg: ConnectionConfig) -> Result<Box<dyn Mixer>, Error> {
        Ok(Box::new(Self::new(cfg)?))
    }
}

impl Mixer for McuClient {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn config(&self) -> &ConnectionConfig {
        &self.cfg
    }

    fn default_connect_timeout(&self) -> Duration {
        DEFAULT_CONNECT_TIMEOUT
    }

    fn connect(&self, timeout: Duration) -> Result<(), Error> {
        self.handle.connect(timeout)
    }

    fn disconnect(&self) {
        self.handle.disconnect();
    }

    fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    fn mute_channel(&self, channel: u8, muted: bool) -> Result<(), Error> {
        self.send_msg(msg::mute_channel(channel, muted))
    }

    fn set_channel_fader(&self, channel: u8, level: f64) -> Result<(), Error> {
        self.send_msg(msg::channel_fader(channel, level)?)
    }

    fn get_channel_mute_status(&self, _channel: u8) -> Result<(), Error> {
        self.as_feedback("Channel mute status")
    }

    fn get_channel_fader_level(&self, _channel: u8) -> Result<(), Error> {
        self.as_feedback("Channel fader level")
    }

    fn mute_dca(&self, _dca: u8, _muted: bool) -> Result<(), Error> {
        self.unsupported("DCA mute")
    }

    fn set_dca_fader(&self, _dca: u8, _level: f64) -> Result<(), Error> {
        self.unsupported("DCA fader")
    }

    fn get_dca_mute_status(&self, _dca: u8) -> Result<(), Error> {
        self.unsupported("DCA mute status")
    }

    fn recall_scene(&self, _scene: u8) -> Result<(), Error> {
        self.unsupported("Scene recall")
    }

    fn load_scene(&self, _scene: u8) -> Result<(), Error> {
        self.unsupported("Scene loading")
    }

    fn set_mute_group(&self, _group: u8, _active: bool) -> Result<(), Error> {
        self.unsupported("Mute group control")
    }

    fn get_mute_group_state(&self, _group: u8) -> Result<(), Error> {
        self.unsupported("Mute group state")
    }

    fn subscribe(&self, target: Target) {
        match target {
            Target::Channel(_) => log::debug!("{target} feedback is automatic over Mackie Control"),
            _ => log::debug!("{target} feedback is not available over Mackie Control"),
        }
    }

    fn unsubscribe(&self, _target: Target) {}

    fn events(&self) -> channel::Receiver<MixerEvent> {
        self.handle.events()
    }
}

struct Stream {
    stream: TcpStream,
    reader: Reader,
}

impl Stream {
    fn open(stream: TcpStream) -> Result<Self, Error> {
        stream.set_nodelay(true)?;
        let reader = Reader::stream(stream.try_clone()?)?;

        Ok(Self { stream, reader })
    }

    fn send(&mut self, msg: &midi::Msg) -> io::Result<()> {
        log::trace!("Sending {}", msg.display());
        self.stream.write_all(msg)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        // Unblocks the reader.
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

struct Attempt {
    pending: Pending,
    outcome: channel::Receiver<Result<TcpStream, Error>>,
}

struct Reactor {
    cfg: ConnectionConfig,
    mcu_cfg: McuConfig,
    status: Status,
    stream: Option<Stream>,
    attempt: Option<Attempt>,
    keep_alive: Option<channel::Receiver<Instant>>,
}

impl Reactor {
    fn new(cfg: ConnectionConfig, mcu_cfg: McuConfig, status: Status) -> Self {
        Self {
            cfg,
            mcu_cfg,
            status,
            stream: None,
            attempt: None,
            keep_alive: None,
        }
    }

    fn run(mut self, req_rx: channel::Receiver<Request<midi::Msg>>) {
        loop {
            let inbound = self
                .stream
                .as_ref()
                .map_or_else(channel::never, |stream| stream.reader.inbound());
            let (deadline, outcome) = match self.attempt {
                Some(ref attempt) => (attempt.pending.deadline(), attempt.outcome.clone()),
                None => (channel::never(), channel::never()),
            };
            let keep_alive = self.keep_alive.clone().unwrap_or_else(channel::never);

            channel::select! {
                recv(req_rx) -> req => match req {
                    Ok(req) => {
                        if self.handle_request(req).is_break() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(outcome) -> res => {
                    self.attempt_done(res.unwrap_or(Err(Error::Disconnected)));
                }
                recv(deadline) -> _ => self.connect_timed_out(),
                recv(keep_alive) -> _ => self.keep_alive(),
                recv(inbound) -> inbound => match inbound {
                    Ok(inbound) => self.handle_inbound(inbound),
                    Err(_) => self.close(),
                },
            }
        }

        self.close();
        log::debug!("Shutting down Mackie Control client for {}", self.cfg);
    }

    fn handle_request(&mut self, req: Request<midi::Msg>) -> ControlFlow<()> {
        use Request::*;

        match req {
            Connect { timeout, reply } => self.connect(timeout, reply),
            Disconnect { done } => {
                self.close();
                let _ = done.send(());
            }
            Send { msg, reply } => {
                let _ = reply.send(self.send(&msg));
            }
            Subscribe(_) | Unsubscribe(_) => (),
            Shutdown => return ControlFlow::Break(()),
        }

        ControlFlow::Continue(())
    }

    fn connect(&mut self, timeout: Duration, reply: Reply) {
        if self.attempt.is_some() {
            log::warn!("Connection to {} already in progress", self.cfg);
            let _ = reply.send(Err(Error::ConnectInProgress));
            return;
        }

        if self.status.is(ConnectionState::Connected) {
            let _ = reply.send(Ok(()));
            return;
        }

        log::info!("Connecting to Mackie Control at {}", self.cfg);

        let (outcome_tx, outcome) = channel::bounded(1);
        let cfg = self.cfg.clone();
        let spawned = thread::Builder::new()
            .name("x32-mcu-connect".to_string())
            .spawn(move || {
                let res = cfg.socket_addr().and_then(|addr| {
                    TcpStream::connect_timeout(&addr, timeout).map_err(Error::from)
                });
                // Nobody listens anymore if the attempt was cancelled.
                let _ = outcome_tx.send(res);
            });

        if let Err(err) = spawned {
            let _ = reply.send(Err(err.into()));
            return;
        }

        self.status.connecting();
        self.attempt = Some(Attempt {
            pending: Pending::new(timeout, reply),
            outcome,
        });
    }

    fn attempt_done(&mut self, res: Result<TcpStream, Error>) {
        let attempt = match self.attempt.take() {
            Some(attempt) => attempt,
            None => return,
        };

        match res.and_then(Stream::open) {
            Ok(stream) => {
                log::info!("Connected to Mackie Control at {}", self.cfg);

                self.stream = Some(stream);
                self.keep_alive = Some(channel::tick(self.mcu_cfg.keep_alive));
                self.status.connected();
                attempt.pending.resolve(Ok(()));
            }
            Err(Error::Socket(err)) if err.kind() == io::ErrorKind::TimedOut => {
                let timeout = attempt.pending.timeout();
                self.status.disconnected();
                attempt.pending.resolve(Err(self.timeout_error(timeout)));
            }
            Err(err) => {
                log::error!("Couldn't connect to {}: {err}", self.cfg);
                self.status.disconnected();
                attempt.pending.resolve(Err(err));
            }
        }
    }

    fn connect_timed_out(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            let timeout = attempt.pending.timeout();
            self.status.disconnected();
            attempt.pending.resolve(Err(self.timeout_error(timeout)));
        }
    }

    fn timeout_error(&self, timeout: Duration) -> Error {
        log::error!(
            "No connection to {} within {} ms: check the remote protocol is Mackie Control",
            self.cfg,
            timeout.as_millis(),
        );

        Error::ConnectTimeout {
            host: self.cfg.host().clone(),
            port: self.cfg.port(),
            timeout,
        }
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Data(buf) => {
                log::trace!("Received {}", bytes::Displayable::from(buf.as_slice()));
                for event in midi::decode(&buf) {
                    self.status.events.emit(event);
                }
            }
            Inbound::Closed => {
                log::info!("Mackie Control connection closed by {}", self.cfg);
                self.close();
            }
            Inbound::Failed(err) => self.socket_error(err),
        }
    }

    fn socket_error(&mut self, err: io::Error) {
        log::error!("Socket error with {}: {err}", self.cfg);
        self.status.events.emit(Error::from(err));
        self.close();
    }

    fn send(&mut self, msg: &midi::Msg) -> Result<(), Error> {
        let res = match self.stream {
            Some(ref mut stream) => stream.send(msg),
            None => return Err(Error::NotConnected),
        };

        res.map_err(|err| {
            log::error!("Failed to send {}: {err}", msg.display());
            self.socket_error(io::Error::new(err.kind(), err.to_string()));
            err.into()
        })
    }

    fn keep_alive(&mut self) {
        if let Err(err) = self.send(&midi::Msg::active_sensing()) {
            log::debug!("Keep alive: {err}");
        }
    }

    fn close(&mut self) {
        self.keep_alive = None;

        if let Some(attempt) = self.attempt.take() {
            attempt.pending.resolve(Err(Error::Disconnected));
        }

        if self.stream.take().is_some() {
            log::info!("Disconnected from Mackie Control at {}", self.cfg);
        }

        self.status.disconnected();
    }
}
