//! Plumbing shared by the transport clients.
//!
//! A client is a handle on a reactor thread which owns the socket, the
//! timers and the protocol state. Capability calls are forwarded as
//! [`Request`]s and the caller waits on a one-shot reply channel.
//! Inbound bytes are read by a dedicated [`Reader`] thread and forwarded
//! to the reactor as [`Inbound`] items.

use crossbeam_channel as channel;
use std::{
    io::{self, Read},
    net::{TcpStream, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use super::{
    event::EventSink,
    state::{ConnectionState, SharedState},
    Error, MixerEvent, Target,
};

/// Blocking reads wake up this often to check for termination.
const READ_POLL: Duration = Duration::from_millis(50);
const READ_BUF_LEN: usize = 4096;

pub(crate) type Reply = channel::Sender<Result<(), Error>>;

pub(crate) enum Request<M> {
    Connect { timeout: Duration, reply: Reply },
    Disconnect { done: channel::Sender<()> },
    Send { msg: M, reply: Reply },
    Subscribe(Target),
    Unsubscribe(Target),
    Shutdown,
}

/// The caller side of a client.
pub(crate) struct Handle<M> {
    req_tx: channel::Sender<Request<M>>,
    state: SharedState,
    events: EventSink,
    reactor: Option<thread::JoinHandle<()>>,
}

impl<M: Send + 'static> Handle<M> {
    /// Spawns the reactor thread running `run`.
    pub fn spawn<F>(name: &str, run: F) -> Result<Self, Error>
    where
        F: FnOnce(channel::Receiver<Request<M>>, SharedState, EventSink) + Send + 'static,
    {
        let (req_tx, req_rx) = channel::unbounded();
        let events = EventSink::default();
        let state = SharedState::default();

        let reactor = {
            let state = state.clone();
            let events = events.clone();
            thread::Builder::new()
                .name(name.to_string())
                .spawn(move || run(req_rx, state, events))?
        };

        Ok(Self {
            req_tx,
            state,
            events,
            reactor: Some(reactor),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Registers a new listener.
    pub fn events(&self) -> channel::Receiver<MixerEvent> {
        self.events.listen()
    }

    pub fn post(&self, req: Request<M>) -> Result<(), Error> {
        self.req_tx.send(req).map_err(|_| Error::ReactorGone)
    }

    fn call(&self, req: impl FnOnce(Reply) -> Request<M>) -> Result<(), Error> {
        let (reply, reply_rx) = channel::bounded(1);
        self.post(req(reply))?;

        reply_rx.recv().map_err(|_| Error::ReactorGone)?
    }

    pub fn connect(&self, timeout: Duration) -> Result<(), Error> {
        self.call(|reply| Request::Connect { timeout, reply })
    }

    pub fn send(&self, msg: M) -> Result<(), Error> {
        self.call(|reply| Request::Send { msg, reply })
    }

    /// Returns once the reactor released the socket and its timers.
    pub fn disconnect(&self) {
        let (done, done_rx) = channel::bounded(1);
        if self.post(Request::Disconnect { done }).is_ok() {
            let _ = done_rx.recv();
        }
    }
}

impl<M> Drop for Handle<M> {
    fn drop(&mut self) {
        let _ = self.req_tx.send(Request::Shutdown);
        if let Some(reactor) = self.reactor.take() {
            if reactor.join().is_err() {
                log::error!("Mixer client thread panicked");
            }
        }
    }
}

/// A connection attempt waiting for its outcome.
///
/// Dropping it cancels the timeout.
pub(crate) struct Pending {
    reply: Reply,
    deadline: channel::Receiver<Instant>,
    timeout: Duration,
}

impl Pending {
    pub fn new(timeout: Duration, reply: Reply) -> Self {
        Self {
            reply,
            deadline: channel::after(timeout),
            timeout,
        }
    }

    pub fn deadline(&self) -> channel::Receiver<Instant> {
        self.deadline.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn resolve(self, res: Result<(), Error>) {
        let _ = self.reply.send(res);
    }
}

pub(crate) fn deadline_of(pending: &Option<Pending>) -> channel::Receiver<Instant> {
    pending.as_ref().map_or_else(channel::never, Pending::deadline)
}

pub(crate) enum Inbound {
    Data(Vec<u8>),
    Closed,
    Failed(io::Error),
}

/// Thread blocking on a socket read and forwarding what it gets.
pub(crate) struct Reader {
    rx: channel::Receiver<Inbound>,
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Reader {
    pub fn datagrams(socket: UdpSocket) -> Result<Self, Error> {
        socket.set_read_timeout(Some(READ_POLL))?;

        Self::spawn("mixer-udp-reader", move |buf| {
            loop {
                match socket.recv_from(buf) {
                    Ok((len, _from)) => return Ok(Some(len)),
                    // Windows reports unreachable peers on unconnected sockets.
                    Err(err) if err.kind() == io::ErrorKind::ConnectionReset => {
                        log::debug!("Ignoring {err}");
                    }
                    Err(err) => return Err(err),
                }
            }
        })
    }

    pub fn stream(mut stream: TcpStream) -> Result<Self, Error> {
        stream.set_read_timeout(Some(READ_POLL))?;

        Self::spawn("mixer-tcp-reader", move |buf| match stream.read(buf) {
            Ok(0) => Ok(None),
            Ok(len) => Ok(Some(len)),
            Err(err) => Err(err),
        })
    }

    /// `read` returns `None` when the peer closed the connection.
    fn spawn<R>(name: &str, mut read: R) -> Result<Self, Error>
    where
        R: FnMut(&mut [u8]) -> io::Result<Option<usize>> + Send + 'static,
    {
        let (tx, rx) = channel::unbounded();
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let stop = stop.clone();
            thread::Builder::new().name(name.to_string()).spawn(move || {
                let mut buf = vec![0u8; READ_BUF_LEN];
                while !stop.load(Ordering::Acquire) {
                    let inbound = match read(&mut buf) {
                        Ok(Some(len)) => Inbound::Data(buf[..len].to_vec()),
                        Ok(None) => Inbound::Closed,
                        Err(err)
                            if matches!(
                                err.kind(),
                                io::ErrorKind::WouldBlock
                                    | io::ErrorKind::TimedOut
                                    | io::ErrorKind::Interrupted
                            ) =>
                        {
                            continue
                        }
                        Err(err) => Inbound::Failed(err),
                    };

                    let is_last = !matches!(inbound, Inbound::Data(_));
                    if tx.send(inbound).is_err() || is_last {
                        break;
                    }
                }
            })?
        };

        Ok(Self {
            rx,
            stop,
            thread: Some(thread),
        })
    }

    pub fn inbound(&self) -> channel::Receiver<Inbound> {
        self.rx.clone()
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// State transitions and event publication common to both reactors.
pub(crate) struct Status {
    pub state: SharedState,
    pub events: EventSink,
}

impl Status {
    pub fn new(state: SharedState, events: EventSink) -> Self {
        Self { state, events }
    }

    pub fn is(&self, state: ConnectionState) -> bool {
        self.state.get() == state
    }

    pub fn connecting(&self) {
        self.state.set(ConnectionState::Connecting);
    }

    pub fn connected(&self) {
        if self.state.set(ConnectionState::Connected) != ConnectionState::Connected {
            self.events.emit(MixerEvent::Connected);
        }
    }

    pub fn disconnected(&self) {
        if self.state.set(ConnectionState::Disconnected) == ConnectionState::Connected {
            self.events.emit(MixerEvent::Disconnected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_times_out() {
        let (reply, _reply_rx) = channel::bounded(1);
        let pending = Some(Pending::new(Duration::from_millis(10), reply));

        assert!(deadline_of(&pending)
            .recv_timeout(Duration::from_secs(1))
            .is_ok());
        assert!(deadline_of(&None)
            .recv_timeout(Duration::from_millis(10))
            .is_err());
    }

    #[test]
    fn reader_forwards_datagrams() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();
        let reader = Reader::datagrams(socket).unwrap();

        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.send_to(b"/xremote\0\0\0\0", addr).unwrap();

        match reader.inbound().recv_timeout(Duration::from_secs(1)) {
            Ok(Inbound::Data(data)) => assert_eq!(data, b"/xremote\0\0\0\0"),
            _ => panic!("expected a datagram"),
        }

        // Joins the thread.
        drop(reader);
    }

    #[test]
    fn status_events() {
        let events = EventSink::default();
        let evt_rx = events.listen();
        let status = Status::new(SharedState::default(), events);

        status.connecting();
        status.disconnected();
        assert!(evt_rx.try_recv().is_err());

        status.connecting();
        status.connected();
        status.connected();
        status.disconnected();
        assert!(matches!(evt_rx.try_recv(), Ok(MixerEvent::Connected)));
        assert!(matches!(evt_rx.try_recv(), Ok(MixerEvent::Disconnected)));
        assert!(evt_rx.try_recv().is_err());
    }
}
