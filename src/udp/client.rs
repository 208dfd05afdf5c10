use socket2::{Domain, Protocol, Socket, Type};
use std::io::{
    Error,
    ErrorKind::{AlreadyExists, NotConnected, Other, TimedOut, WouldBlock},
    Result,
};
use std::net::{Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering::Relaxed},
    Arc, Mutex, MutexGuard, OnceLock,
};
use std::thread::{sleep, spawn, JoinHandle};
use std::time::{Duration, Instant};

use super::config::ClientConfig;
use super::inbox::{Inbox, Mode};
use crate::proto::Message;

// large enough for any udp payload, peers may use a bigger chunk size than ours
const RECV_BUF_SIZE: usize = 65535;
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// State shared with the receive loop.
struct Shared {
    running: AtomicBool,
    // set once, first pairing reply wins
    peer: OnceLock<SocketAddr>,
    inbox: Mutex<Inbox>,
}

impl Shared {
    fn inbox(&self) -> MutexGuard<'_, Inbox> {
        // the lock guards plain buffers, a panicking holder leaves nothing half updated
        self.inbox.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Udp hole punching session
///
/// One socket is used for the rendezvous server and the peer, so the NAT
/// mapping observed by the server is the one the peer punches through.
///
/// # example
/// ```no_run
/// use natpunch::udp::Client;
///
/// let mut c = Client::new("rendezvous.example.org:3478", "c1", None).unwrap();
/// if c.start().unwrap().is_some() {
///     c.enter_data_mode();
///     c.send(b"hello").unwrap();
/// }
/// ```
pub struct Client {
    config: ClientConfig,
    server_addr: SocketAddr,
    socket: Option<UdpSocket>,
    recv_loop: Option<JoinHandle<()>>,
    started: bool,
    shared: Arc<Shared>,
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shared.running.store(false, Relaxed);
    }
}

impl Client {
    /// set rendezvous server, peer identity, local bind address, other settings default.
    /// if no local address set, choose according server address type(ipv4 or ipv6).
    pub fn new(server_addr: &str, id: &str, local_addr: Option<SocketAddr>) -> Result<Self> {
        let mut config = ClientConfig::new(server_addr, id);
        config.local_addr = local_addr;
        Self::with_config(config)
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let server_addr = config
            .server_addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::new(Other, "no addr"))?;

        Ok(Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                peer: OnceLock::new(),
                inbox: Mutex::new(Inbox::new(config.buffer_limit)),
            }),
            config,
            server_addr,
            socket: None,
            recv_loop: None,
            started: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// local address, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// peer address learned from the rendezvous server
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.peer.get().copied()
    }

    pub fn mode(&self) -> Mode {
        self.shared.inbox().mode()
    }

    /// datagrams dropped because the data buffer or signal queue was full
    pub fn dropped_datagrams(&self) -> u64 {
        self.shared.inbox().dropped()
    }

    fn bind(&self) -> Result<UdpSocket> {
        let local_addr = match self.config.local_addr {
            Some(addr) => addr,
            None => match self.server_addr {
                SocketAddr::V4(_) => ([0, 0, 0, 0], 0).into(),
                SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
            },
        };

        let socket = Socket::new(Domain::for_address(local_addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.bind(&local_addr.into())?;
        socket.set_read_timeout(Some(self.config.recv_timeout))?;

        Ok(socket.into())
    }

    fn socket(&self) -> Result<&UdpSocket> {
        self.socket
            .as_ref()
            .ok_or_else(|| Error::new(NotConnected, "session not started"))
    }

    /// Open the socket, start the receive loop, register at the rendezvous
    /// server, wait for the peer and punch towards it.
    ///
    /// Not finding a peer is not an error, `Ok(None)` is returned and the session
    /// stays usable for signaling.
    pub fn start(&mut self) -> Result<Option<SocketAddr>> {
        if self.started {
            return Err(Error::new(AlreadyExists, "session already started"));
        }
        self.started = true;

        let socket = self.bind()?;
        let recv_sk = socket.try_clone()?;
        log::info!(
            "{} bound {}, rendezvous {}",
            self.config.id,
            socket.local_addr()?,
            self.server_addr
        );
        self.socket = Some(socket);

        self.shared.running.store(true, Relaxed);
        let shared = self.shared.clone();
        let id = self.config.id.clone();
        self.recv_loop = Some(spawn(move || Self::recv_loop(recv_sk, shared, id)));

        self.signal()?;

        match self.wait_peer(self.config.peer_wait) {
            Some(peer) => {
                self.punch()?;
                Ok(Some(peer))
            }
            None => {
                log::warn!("{} no peer after {:?}", self.config.id, self.config.peer_wait);
                Ok(None)
            }
        }
    }

    fn recv_loop(socket: UdpSocket, shared: Arc<Shared>, id: String) {
        let mut buf = vec![0; RECV_BUF_SIZE];

        while shared.running.load(Relaxed) {
            let (n, addr) = match socket.recv_from(&mut buf) {
                Ok(r) => r,
                Err(e) if e.kind() == WouldBlock || e.kind() == TimedOut => continue,
                Err(e) => {
                    log::debug!("{} recv fail, {}", id, e);
                    continue;
                }
            };

            let peer = shared.inbox().accept(&buf[..n], addr);

            if let Some(peer) = peer {
                match shared.peer.set(peer) {
                    Ok(()) => log::info!("{} peer {}", id, peer),
                    Err(_) => log::trace!("{} ignore peer {}", id, peer),
                }
            }
        }

        log::debug!("{} receive loop exit", id);
    }

    /// Send `HELLO` to the rendezvous server `signal_count` times.
    ///
    /// Best effort, nothing acknowledges a registration.
    pub fn signal(&self) -> Result<()> {
        let socket = self.socket()?;
        let hello = Message::Hello {
            id: self.config.id.clone(),
        }
        .encode();
        let interval = self.config.recv_timeout / 10;

        for _ in 0..self.config.signal_count {
            socket.send_to(&hello, self.server_addr)?;
            log::trace!("{} hello -> {}", self.config.id, self.server_addr);
            sleep(interval);
        }

        Ok(())
    }

    /// Wait up to `timeout` for a pairing reply, polling at receive timeout steps.
    pub fn wait_peer(&self, timeout: Duration) -> Option<SocketAddr> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(peer) = self.peer_addr() {
                return Some(peer);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            sleep(self.config.recv_timeout.min(deadline - now));
        }
    }

    /// Send `punch_count` probes to the peer so our NAT accepts its traffic.
    ///
    /// Nothing confirms the hole is open, later data exchange tells.
    pub fn punch(&self) -> Result<u32> {
        let peer = self
            .peer_addr()
            .ok_or_else(|| Error::new(NotConnected, "peer not defined"))?;
        let socket = self.socket()?;

        log::debug!("{} punch {}", self.config.id, peer);

        for seq in 0..self.config.punch_count {
            let probe = Message::Punch {
                id: self.config.id.clone(),
                seq,
            };
            socket.send_to(&probe.encode(), peer)?;

            if seq + 1 < self.config.punch_count {
                sleep(self.config.recv_timeout);
            }
        }

        Ok(self.config.punch_count)
    }

    /// Treat every following datagram as payload. One way, returns false if
    /// the session already was in data mode.
    pub fn enter_data_mode(&self) -> bool {
        let changed = self.shared.inbox().enter_data_mode();
        if changed {
            log::debug!("{} data mode", self.config.id);
        }
        changed
    }

    /// Send `data` to the peer, split into datagrams of at most `chunk_size`
    /// bytes. Returns the number of datagrams.
    ///
    /// Chunks carry no header, the receiver only sees concatenated bytes.
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        let peer = self
            .peer_addr()
            .ok_or_else(|| Error::new(NotConnected, "peer not defined"))?;
        let socket = self.socket()?;

        let mut count = 0;
        for chunk in data.chunks(self.config.chunk_size) {
            socket.send_to(chunk, peer)?;
            count += 1;
        }

        log::trace!("{} sent {} bytes in {} datagrams", self.config.id, data.len(), count);
        Ok(count)
    }

    /// Take everything buffered so far, then sleep `pause` if given.
    ///
    /// An empty result just means nothing arrived yet.
    pub fn recv(&self, pause: Option<Duration>) -> Vec<u8> {
        let data = self.shared.inbox().take_data();

        if let Some(pause) = pause {
            sleep(pause);
        }

        data
    }

    /// Wait until some data is buffered and take it, or fail with `TimedOut`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;

        loop {
            {
                let mut inbox = self.shared.inbox();
                if inbox.has_data() {
                    return Ok(inbox.take_data());
                }
            }

            if Instant::now() >= deadline {
                return Err(Error::new(TimedOut, "recv timeout"));
            }
            sleep(DRAIN_POLL);
        }
    }

    /// Signaling datagrams that were not a pairing reply, in arrival order.
    pub fn take_signals(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.shared.inbox().take_signals()
    }

    /// Stop the receive loop and close the socket.
    ///
    /// The loop notices on its next read timeout, so this blocks for at most
    /// about `recv_timeout`.
    pub fn stop(&mut self) -> Result<()> {
        self.shared.running.store(false, Relaxed);

        if let Some(h) = self.recv_loop.take() {
            h.join()
                .map_err(|_| Error::new(Other, "receive loop panicked"))?;
        }

        if self.socket.take().is_some() {
            log::info!("{} stopped", self.config.id);
        }

        Ok(())
    }
}
