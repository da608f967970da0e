//! X32 remote control over UDP.
//!
//! The X32 only talks to clients which recently sent `/xremote`, and it
//! doesn't acknowledge that message: connecting sends it followed by a
//! harmless query, the first datagram back completes the connection.
//! The mixer has no subscription mechanism, so subscribed targets are
//! queried periodically.

use crossbeam_channel as channel;
use std::{
    collections::BTreeSet,
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    ops::ControlFlow,
    time::{Duration, Instant},
};

use crate::{
    bytes,
    mixer::{
        io::{self as mixer_io, Inbound, Pending, Reader, Reply, Request, Status},
        Buildable, ConnectionConfig, ConnectionState, Error, Mixer, MixerEvent, PollConfig,
        Target,
    },
    osc,
};

pub const DEFAULT_PORT: u16 = 10023;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

pub mod address {
    pub const XREMOTE: &str = "/xremote";
    pub const LOAD: &str = "/load";

    pub fn channel_on(channel: u8) -> String {
        format!("/ch/{channel:02}/mix/on")
    }

    pub fn channel_fader(channel: u8) -> String {
        format!("/ch/{channel:02}/mix/fader")
    }

    pub fn dca_on(dca: u8) -> String {
        format!("/dca/{dca}/on")
    }

    pub fn dca_fader(dca: u8) -> String {
        format!("/dca/{dca}/fader")
    }

    pub fn mute_group(group: u8) -> String {
        format!("/config/mute/{group}")
    }
}

/// Messages implementing the mixer capabilities.
pub mod msg {
    use super::address;
    use crate::{mixer::clamp_level, osc::Msg};

    /// `on` switches: `0` silences the strip.
    const ON: i32 = 1;
    const OFF: i32 = 0;

    pub fn remote_enable() -> Msg {
        Msg::new(address::XREMOTE)
    }

    pub fn query(address: String) -> Msg {
        Msg::new(address)
    }

    pub fn mute_channel(channel: u8, muted: bool) -> Msg {
        Msg::new(address::channel_on(channel)).with(if muted { OFF } else { ON })
    }

    pub fn channel_fader(channel: u8, level: f64) -> Msg {
        Msg::new(address::channel_fader(channel)).with(clamp_level(level) as f32)
    }

    pub fn mute_dca(dca: u8, muted: bool) -> Msg {
        Msg::new(address::dca_on(dca)).with(if muted { OFF } else { ON })
    }

    pub fn dca_fader(dca: u8, level: f64) -> Msg {
        Msg::new(address::dca_fader(dca)).with(clamp_level(level) as f32)
    }

    /// Scenes are 0-based on the wire.
    pub fn recall_scene(scene: u8) -> Msg {
        Msg::new(address::LOAD)
            .with("scene")
            .with(i32::from(scene) - 1)
    }

    pub fn mute_group(group: u8, active: bool) -> Msg {
        Msg::new(address::mute_group(group)).with(if active { ON } else { OFF })
    }
}

/// Typed view on the state updates sent by the mixer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Feedback {
    ChannelMute { channel: u8, muted: bool },
    ChannelFader { channel: u8, level: f64 },
    DcaMute { dca: u8, muted: bool },
    DcaFader { dca: u8, level: f64 },
    MuteGroup { group: u8, active: bool },
}

impl Feedback {
    pub fn parse(msg: &osc::Msg) -> Option<Self> {
        use Feedback::*;

        let arg = msg.args().first()?;
        let parts: Vec<&str> = msg.address().strip_prefix('/')?.split('/').collect();

        let feedback = match parts.as_slice() {
            ["ch", channel, "mix", "on"] => ChannelMute {
                channel: channel.parse().ok()?,
                muted: arg.as_int()? == 0,
            },
            ["ch", channel, "mix", "fader"] => ChannelFader {
                channel: channel.parse().ok()?,
                level: arg.as_float()? as f64,
            },
            ["dca", dca, "on"] => DcaMute {
                dca: dca.parse().ok()?,
                muted: arg.as_int()? == 0,
            },
            ["dca", dca, "fader"] => DcaFader {
                dca: dca.parse().ok()?,
                level: arg.as_float()? as f64,
            },
            ["config", "mute", group] => MuteGroup {
                group: group.parse().ok()?,
                active: arg.as_int()? != 0,
            },
            _ => return None,
        };

        Some(feedback)
    }

    pub fn target(&self) -> Target {
        use Feedback::*;

        match *self {
            ChannelMute { channel, .. } | ChannelFader { channel, .. } => Target::Channel(channel),
            DcaMute { dca, .. } | DcaFader { dca, .. } => Target::Dca(dca),
            MuteGroup { group, .. } => Target::MuteGroup(group),
        }
    }
}

/// Targets polled on each cycle.
#[derive(Debug, Default)]
pub struct Subscriptions(BTreeSet<Target>);

impl Subscriptions {
    /// Returns `false` if `target` was already subscribed.
    pub fn insert(&mut self, target: Target) -> bool {
        self.0.insert(target)
    }

    pub fn remove(&mut self, target: Target) -> bool {
        self.0.remove(&target)
    }

    pub fn contains(&self, target: Target) -> bool {
        self.0.contains(&target)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read-only queries for one poll cycle.
    pub fn poll_msgs(&self) -> Vec<osc::Msg> {
        let mut msgs = Vec::with_capacity(2 * self.0.len());

        for target in self.0.iter() {
            match *target {
                Target::Channel(channel) => {
                    msgs.push(msg::query(address::channel_on(channel)));
                    msgs.push(msg::query(address::channel_fader(channel)));
                }
                Target::Dca(dca) => msgs.push(msg::query(address::dca_on(dca))),
                Target::MuteGroup(group) => msgs.push(msg::query(address::mute_group(group))),
            }
        }

        msgs
    }
}

/// X32 client speaking OSC over UDP.
pub struct X32Client {
    cfg: ConnectionConfig,
    handle: mixer_io::Handle<osc::Msg>,
}

impl X32Client {
    pub fn new(cfg: ConnectionConfig) -> Result<Self, Error> {
        Self::with_poll_config(cfg, PollConfig::default())
    }

    pub fn with_poll_config(cfg: ConnectionConfig, poll: PollConfig) -> Result<Self, Error> {
        cfg.validate()?;
        log::debug!("Creating OSC client for {cfg}");

        let handle = {
            let cfg = cfg.clone();
            mixer_io::Handle::spawn("x32-osc", move |req_rx, state, events| {
                Reactor::new(cfg, poll, Status::new(state, events)).run(req_rx)
            })?
        };

        Ok(Self { cfg, handle })
    }

    /// Sends an arbitrary message.
    pub fn send(&self, address: &str, args: &[osc::Value]) -> Result<(), Error> {
        let msg = args
            .iter()
            .cloned()
            .fold(osc::Msg::try_new(address)?, |msg, arg| msg.with(arg));

        self.send_msg(msg)
    }

    pub fn send_msg(&self, msg: osc::Msg) -> Result<(), Error> {
        self.handle.send(msg)
    }

    fn post(&self, req: Request<osc::Msg>) {
        if let Err(err) = self.handle.post(req) {
            log::error!("{err}");
        }
    }
}

impl Buildable for X32Client {
    const NAME: &'static str = "osc";
    const DEFAULT_PORT: u16 = DEFAULT_PORT;

    fn build(cfg: ConnectionConfig) -> Result<Box<dyn Mixer>, Error> {
        Ok(Box::new(Self::new(cfg)?))
    }
}

impl Mixer for X32Client {
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
        self.send_msg(msg::channel_fader(channel, level))
    }

    fn get_channel_mute_status(&self, channel: u8) -> Result<(), Error> {
        self.send_msg(msg::query(address::channel_on(channel)))
    }

    fn get_channel_fader_level(&self, channel: u8) -> Result<(), Error> {
        self.send_msg(msg::query(address::channel_fader(channel)))
    }

    fn mute_dca(&self, dca: u8, muted: bool) -> Result<(), Error> {
        self.send_msg(msg::mute_dca(dca, muted))
    }

    fn set_dca_fader(&self, dca: u8, level: f64) -> Result<(), Error> {
        self.send_msg(msg::dca_fader(dca, level))
    }

    fn get_dca_mute_status(&self, dca: u8) -> Result<(), Error> {
        self.send_msg(msg::query(address::dca_on(dca)))
    }

    fn recall_scene(&self, scene: u8) -> Result<(), Error> {
        self.send_msg(msg::recall_scene(scene))
    }

    fn set_mute_group(&self, group: u8, active: bool) -> Result<(), Error> {
        self.send_msg(msg::mute_group(group, active))
    }

    fn get_mute_group_state(&self, group: u8) -> Result<(), Error> {
        self.send_msg(msg::query(address::mute_group(group)))
    }

    fn subscribe(&self, target: Target) {
        self.post(Request::Subscribe(target));
    }

    fn unsubscribe(&self, target: Target) {
        self.post(Request::Unsubscribe(target));
    }

    fn events(&self) -> channel::Receiver<MixerEvent> {
        self.handle.events()
    }
}

struct Socket {
    socket: UdpSocket,
    peer: SocketAddr,
    reader: Reader,
}

impl Socket {
    fn open(cfg: &ConnectionConfig) -> Result<Self, Error> {
        let peer = cfg.socket_addr()?;
        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local)?;
        let reader = Reader::datagrams(socket.try_clone()?)?;
        log::debug!("Listening on {} for {peer}", socket.local_addr()?);

        Ok(Self {
            socket,
            peer,
            reader,
        })
    }

    fn send(&self, msg: &osc::Msg) -> Result<(), Error> {
        let buf = msg.to_bytes();
        log::trace!("Sending {msg} {}", bytes::Displayable::from(buf.as_slice()));

        self.socket.send_to(&buf, self.peer).map_err(|err| {
            log::error!("Failed to send {msg}: {err}");
            err
        })?;

        Ok(())
    }
}

struct Timers {
    keep_alive: channel::Receiver<Instant>,
    poll: channel::Receiver<Instant>,
}

struct Reactor {
    cfg: ConnectionConfig,
    poll_cfg: PollConfig,
    status: Status,
    socket: Option<Socket>,
    pending: Option<Pending>,
    timers: Option<Timers>,
    subscriptions: Subscriptions,
}

impl Reactor {
    fn new(cfg: ConnectionConfig, poll_cfg: PollConfig, status: Status) -> Self {
        Self {
            cfg,
            poll_cfg,
            status,
            socket: None,
            pending: None,
            timers: None,
            subscriptions: Subscriptions::default(),
        }
    }

    fn run(mut self, req_rx: channel::Receiver<Request<osc::Msg>>) {
        loop {
            let inbound = self
                .socket
                .as_ref()
                .map_or_else(channel::never, |socket| socket.reader.inbound());
            let deadline = mixer_io::deadline_of(&self.pending);
            let (keep_alive, poll) = match self.timers {
                Some(ref timers) => (timers.keep_alive.clone(), timers.poll.clone()),
                None => (channel::never(), channel::never()),
            };

            channel::select! {
                recv(req_rx) -> req => match req {
                    Ok(req) => {
                        if self.handle_request(req).is_break() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(inbound) -> inbound => match inbound {
                    Ok(inbound) => self.handle_inbound(inbound),
                    Err(_) => self.close(),
                },
                recv(deadline) -> _ => self.connect_timed_out(),
                recv(keep_alive) -> _ => self.keep_alive(),
                recv(poll) -> _ => self.poll(),
            }
        }

        self.close();
        log::debug!("Shutting down OSC client for {}", self.cfg);
    }

    fn handle_request(&mut self, req: Request<osc::Msg>) -> ControlFlow<()> {
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
            Subscribe(target) => {
                if self.subscriptions.insert(target) {
                    log::debug!("Polling {target}");
                }
            }
            Unsubscribe(target) => {
                if self.subscriptions.remove(target) {
                    log::debug!("No longer polling {target}");
                }
            }
            Shutdown => return ControlFlow::Break(()),
        }

        ControlFlow::Continue(())
    }

    fn connect(&mut self, timeout: Duration, reply: Reply) {
        if self.pending.is_some() {
            log::warn!("Connection to {} already in progress", self.cfg);
            let _ = reply.send(Err(Error::ConnectInProgress));
            return;
        }

        if self.status.is(ConnectionState::Connected) {
            let _ = reply.send(Ok(()));
            return;
        }

        log::info!("Connecting to X32 at {}", self.cfg);
        let socket = match Socket::open(&self.cfg) {
            Ok(socket) => socket,
            Err(err) => {
                log::error!("Couldn't open socket for {}: {err}", self.cfg);
                let _ = reply.send(Err(err));
                return;
            }
        };

        self.status.connecting();
        let res = socket
            .send(&msg::remote_enable())
            .and_then(|()| socket.send(&msg::query(address::channel_on(1))));

        self.socket = Some(socket);
        self.pending = Some(Pending::new(timeout, reply));

        if let Err(err) = res {
            self.close_with(err);
        }
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Data(buf) => {
                if let Some(pending) = self.pending.take() {
                    self.established(pending);
                }

                match osc::decode(&buf) {
                    Ok(msg) => {
                        log::trace!("Received {msg}");
                        self.status.events.emit(msg);
                    }
                    Err(err) => log::debug!("Dropping datagram: {err}"),
                }
            }
            Inbound::Closed => self.close(),
            Inbound::Failed(err) => self.socket_error(err),
        }
    }

    fn established(&mut self, pending: Pending) {
        log::info!("Connected to X32 at {}", self.cfg);

        self.timers = Some(Timers {
            keep_alive: channel::tick(self.poll_cfg.keep_alive),
            poll: channel::after(self.poll_cfg.next_delay()),
        });
        self.status.connected();
        pending.resolve(Ok(()));
    }

    fn connect_timed_out(&mut self) {
        let timeout = match self.pending {
            Some(ref pending) => pending.timeout(),
            None => return,
        };

        log::error!(
            "No response from X32 at {} within {} ms: check remote control is enabled",
            self.cfg,
            timeout.as_millis(),
        );

        self.close_with(Error::ConnectTimeout {
            host: self.cfg.host().clone(),
            port: self.cfg.port(),
            timeout,
        });
    }

    fn socket_error(&mut self, err: io::Error) {
        log::error!("Socket error with {}: {err}", self.cfg);

        if self.pending.is_some() {
            self.close_with(err.into());
        } else {
            self.status.events.emit(Error::from(err));
            self.close();
        }
    }

    fn send(&self, msg: &osc::Msg) -> Result<(), Error> {
        match self.socket {
            Some(ref socket) => socket.send(msg),
            None => Err(Error::NotConnected),
        }
    }

    fn keep_alive(&self) {
        if let Err(err) = self.send(&msg::remote_enable()) {
            log::debug!("Keep alive: {err}");
        }
    }

    fn poll(&mut self) {
        for msg in self.subscriptions.poll_msgs() {
            if let Err(err) = self.send(&msg) {
                log::debug!("Polling {}: {err}", msg.address());
            }
        }

        let delay = self.poll_cfg.next_delay();
        if let Some(ref mut timers) = self.timers {
            timers.poll = channel::after(delay);
        }
    }

    fn close(&mut self) {
        self.close_with(Error::Disconnected);
    }

    /// Releases the socket and the timers. A pending attempt fails with `err`.
    fn close_with(&mut self, err: Error) {
        self.timers = None;

        if let Some(pending) = self.pending.take() {
            pending.resolve(Err(err));
        }

        if self.socket.take().is_some() {
            log::debug!("Released socket for {}", self.cfg);
        }

        if self.status.is(ConnectionState::Connected) {
            log::info!("Disconnected from X32 at {}", self.cfg);
        }
        self.status.disconnected();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::Value;
    use std::{sync::Arc, thread};

    #[test]
    fn addresses() {
        assert_eq!(address::channel_on(1), "/ch/01/mix/on");
        assert_eq!(address::channel_on(32), "/ch/32/mix/on");
        assert_eq!(address::channel_fader(7), "/ch/07/mix/fader");
        assert_eq!(address::dca_on(3), "/dca/3/on");
        assert_eq!(address::mute_group(6), "/config/mute/6");
    }

    #[test]
    fn capability_msgs() {
        assert_eq!(msg::mute_channel(1, true).args(), &[Value::Int(0)]);
        assert_eq!(msg::mute_channel(1, false).args(), &[Value::Int(1)]);
        assert_eq!(msg::mute_group(2, true).args(), &[Value::Int(1)]);

        assert_eq!(msg::channel_fader(1, 1.5).args(), &[Value::Float(1.0)]);
        assert_eq!(msg::channel_fader(1, -0.2).args(), &[Value::Float(0.0)]);
        assert_eq!(msg::dca_fader(1, 0.75).args(), &[Value::Float(0.75)]);

        let scene = msg::recall_scene(1);
        assert_eq!(scene.address(), "/load");
        assert_eq!(scene.args(), &[Value::from("scene"), Value::Int(0)]);
        assert_eq!(msg::recall_scene(5).args()[1], Value::Int(4));
    }

    #[test]
    fn subscriptions_are_idempotent() {
        let mut subs = Subscriptions::default();
        assert!(subs.insert(Target::Channel(3)));
        assert!(!subs.insert(Target::Channel(3)));
        subs.insert(Target::Dca(2));
        subs.insert(Target::MuteGroup(1));
        assert_eq!(subs.len(), 3);

        let addresses: Vec<String> = subs
            .poll_msgs()
            .iter()
            .map(|msg| {
                assert!(msg.is_query());
                msg.address().to_string()
            })
            .collect();
        assert_eq!(
            addresses,
            vec![
                "/ch/03/mix/on",
                "/ch/03/mix/fader",
                "/dca/2/on",
                "/config/mute/1",
            ]
        );

        assert!(subs.remove(Target::Channel(3)));
        assert!(!subs.remove(Target::Channel(3)));
        assert!(!subs.contains(Target::Channel(3)));
    }

    #[test]
    fn feedback() {
        let parse = |msg: osc::Msg| Feedback::parse(&msg);

        assert_eq!(
            parse(osc::Msg::new("/ch/01/mix/on").with(0)),
            Some(Feedback::ChannelMute {
                channel: 1,
                muted: true
            })
        );
        assert_eq!(
            parse(osc::Msg::new("/ch/12/mix/fader").with(0.75f32)),
            Some(Feedback::ChannelFader {
                channel: 12,
                level: 0.75
            })
        );
        assert_eq!(
            parse(osc::Msg::new("/dca/2/on").with(1)),
            Some(Feedback::DcaMute {
                dca: 2,
                muted: false
            })
        );
        assert_eq!(
            parse(osc::Msg::new("/config/mute/4").with(1))
                .unwrap()
                .target(),
            Target::MuteGroup(4)
        );

        assert_eq!(parse(osc::Msg::new("/ch/01/mix/on")), None);
        assert_eq!(parse(osc::Msg::new("/ch/01/mix/on").with("on")), None);
        assert_eq!(parse(osc::Msg::new("/info").with(1)), None);
    }

    /// Plays the mixer side on loopback.
    struct FakeX32 {
        socket: UdpSocket,
    }

    impl FakeX32 {
        fn new() -> Self {
            let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
            socket
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();

            Self { socket }
        }

        fn config(&self) -> ConnectionConfig {
            ConnectionConfig::new("127.0.0.1", self.socket.local_addr().unwrap().port())
        }

        fn recv(&self) -> (osc::Msg, SocketAddr) {
            let mut buf = [0u8; 1024];
            let (len, from) = self.socket.recv_from(&mut buf).unwrap();

            (osc::decode(&buf[..len]).unwrap(), from)
        }

        fn recv_msg(&self) -> osc::Msg {
            self.recv().0
        }

        fn recv_within(&self, timeout: Duration) -> Option<osc::Msg> {
            self.socket.set_read_timeout(Some(timeout)).unwrap();
            let mut buf = [0u8; 1024];
            let res = self.socket.recv_from(&mut buf);
            self.socket
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();

            res.ok().map(|(len, _)| osc::decode(&buf[..len]).unwrap())
        }

        fn drain(&self) {
            self.socket.set_nonblocking(true).unwrap();
            let mut buf = [0u8; 1024];
            while self.socket.recv_from(&mut buf).is_ok() {}
            self.socket.set_nonblocking(false).unwrap();
        }

        fn send_to(&self, buf: &[u8], to: SocketAddr) {
            self.socket.send_to(buf, to).unwrap();
        }

        /// Answers the handshake, returns the client address.
        fn accept(&self) -> SocketAddr {
            let (remote, from) = self.recv();
            assert_eq!(remote.address(), "/xremote");

            let (probe, _) = self.recv();
            assert_eq!(probe.address(), "/ch/01/mix/on");
            assert!(probe.is_query());

            self.send_to(&osc::Msg::new("/ch/01/mix/on").with(1).to_bytes(), from);

            from
        }
    }

    fn connect(client: &X32Client, device: &FakeX32) -> SocketAddr {
        thread::scope(|s| {
            let accepting = s.spawn(|| device.accept());
            client.connect(Duration::from_secs(2)).unwrap();
            accepting.join().unwrap()
        })
    }

    fn next_osc(events: &channel::Receiver<MixerEvent>) -> osc::Msg {
        loop {
            if let MixerEvent::Osc(msg) = events.recv_timeout(Duration::from_secs(2)).unwrap() {
                return msg;
            }
        }
    }

    #[test]
    fn connects_on_first_reply() {
        let device = FakeX32::new();
        let client = X32Client::new(device.config()).unwrap();
        let events = client.events();
        assert!(!client.is_connected());

        connect(&client, &device);
        assert!(client.is_connected());

        assert!(matches!(
            events.recv_timeout(Duration::from_secs(2)),
            Ok(MixerEvent::Connected)
        ));
        let reply = next_osc(&events);
        assert_eq!(
            Feedback::parse(&reply),
            Some(Feedback::ChannelMute {
                channel: 1,
                muted: false
            })
        );

        // Already connected.
        client.connect(Duration::from_millis(100)).unwrap();
    }

    #[test]
    fn connect_timeout() {
        let device = FakeX32::new();
        let client = X32Client::new(device.config()).unwrap();

        let err = client.connect(Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, Error::ConnectTimeout { .. }), "{err}");
        assert!(!client.is_connected());
        assert_eq!(client.state(), ConnectionState::Disconnected);

        // The stimulus and the probe were sent nonetheless.
        assert_eq!(device.recv_msg().address(), "/xremote");
        assert_eq!(device.recv_msg().address(), "/ch/01/mix/on");
    }

    #[test]
    fn rejects_concurrent_connect() {
        let device = FakeX32::new();
        let client = Arc::new(X32Client::new(device.config()).unwrap());

        let first = {
            let client = client.clone();
            thread::spawn(move || client.connect(Duration::from_millis(500)))
        };

        let started = Instant::now();
        while client.state() != ConnectionState::Connecting {
            assert!(started.elapsed() < Duration::from_secs(1));
            thread::sleep(Duration::from_millis(5));
        }

        assert!(matches!(
            client.connect(Duration::from_millis(500)),
            Err(Error::ConnectInProgress)
        ));
        assert!(matches!(
            first.join().unwrap(),
            Err(Error::ConnectTimeout { .. })
        ));
    }

    #[test]
    fn capabilities_on_the_wire() {
        let device = FakeX32::new();
        let client = X32Client::new(device.config()).unwrap();
        connect(&client, &device);

        client.mute_channel(1, true).unwrap();
        let msg = device.recv_msg();
        assert_eq!(msg.address(), "/ch/01/mix/on");
        assert_eq!(msg.args(), &[Value::Int(0)]);

        client.set_channel_fader(32, 1.5).unwrap();
        let msg = device.recv_msg();
        assert_eq!(msg.address(), "/ch/32/mix/fader");
        assert_eq!(msg.args(), &[Value::Float(1.0)]);

        client.set_channel_fader(2, -0.2).unwrap();
        assert_eq!(device.recv_msg().args(), &[Value::Float(0.0)]);

        client.recall_scene(5).unwrap();
        let msg = device.recv_msg();
        assert_eq!(msg.address(), "/load");
        assert_eq!(msg.args(), &[Value::from("scene"), Value::Int(4)]);

        client.mute_dca(2, false).unwrap();
        let msg = device.recv_msg();
        assert_eq!(msg.address(), "/dca/2/on");
        assert_eq!(msg.args(), &[Value::Int(1)]);

        client.set_mute_group(3, true).unwrap();
        let msg = device.recv_msg();
        assert_eq!(msg.address(), "/config/mute/3");
        assert_eq!(msg.args(), &[Value::Int(1)]);

        client.get_dca_mute_status(4).unwrap();
        let msg = device.recv_msg();
        assert_eq!(msg.address(), "/dca/4/on");
        assert!(msg.is_query());

        client.send("/info", &[]).unwrap();
        assert_eq!(device.recv_msg().address(), "/info");
        assert!(client.send("", &[]).is_err());
    }

    #[test]
    fn polls_each_target_once_per_cycle() {
        let device = FakeX32::new();
        let poll = PollConfig {
            interval: Duration::from_millis(20),
            ..PollConfig::default()
        };
        let client = X32Client::with_poll_config(device.config(), poll).unwrap();

        client.subscribe_to_channel(5);
        client.subscribe_to_channel(5);
        client.subscribe_to_dca(2);
        connect(&client, &device);

        for _ in 0..2 {
            let cycle: Vec<String> = (0..3)
                .map(|_| device.recv_msg().address().to_string())
                .collect();
            assert_eq!(cycle, vec!["/ch/05/mix/on", "/ch/05/mix/fader", "/dca/2/on"]);
        }
    }

    #[test]
    fn no_timer_fires_after_disconnect() {
        let device = FakeX32::new();
        let poll = PollConfig {
            keep_alive: Duration::from_millis(20),
            interval: Duration::from_millis(20),
            jitter: Duration::from_millis(5),
        };
        let client = X32Client::with_poll_config(device.config(), poll).unwrap();
        let events = client.events();
        client.subscribe_to_mute_group(1);
        connect(&client, &device);

        // Timers are running.
        assert!(device.recv_within(Duration::from_secs(1)).is_some());

        client.disconnect();
        assert!(!client.is_connected());
        device.drain();
        assert!(device.recv_within(Duration::from_millis(200)).is_none());

        client.disconnect();
        assert!(matches!(
            client.mute_channel(1, true),
            Err(Error::NotConnected)
        ));

        let mut got_disconnected = false;
        while let Ok(event) = events.try_recv() {
            got_disconnected |= matches!(event, MixerEvent::Disconnected);
        }
        assert!(got_disconnected);
    }

    #[test]
    fn drops_malformed_datagrams() {
        let device = FakeX32::new();
        let client = X32Client::new(device.config()).unwrap();
        let events = client.events();
        let peer = connect(&client, &device);
        assert_eq!(next_osc(&events).address(), "/ch/01/mix/on");

        device.send_to(b"/ch/02/mix/on", peer);
        device.send_to(&osc::Msg::new("/dca/1/on").with(0).to_bytes(), peer);

        assert_eq!(next_osc(&events).address(), "/dca/1/on");
        assert!(client.is_connected());
    }
}
