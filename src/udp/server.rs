use std::io::Result;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use super::registry::Registry;

/// Udp rendezvous server
///
/// records the observed address of every registering client, and once two
/// clients are known tells each one where the other is.
pub struct Server {
    socket: UdpSocket,
    registry: Registry,
    next_gc: Instant,
}

impl Server {
    pub fn new<A: ToSocketAddrs>(listen_addr: A) -> Result<Self> {
        let socket = UdpSocket::bind(listen_addr)?;

        Ok(Self {
            socket,
            registry: Registry::new(),
            next_gc: Instant::now(),
        })
    }

    /// forget clients not heard from within `expiry`.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.registry = self.registry.with_expiry(expiry);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn run(mut self) -> Result<()> {
        let mut buf = [0; 2048];

        self.socket.set_read_timeout(Some(Self::gc_interval(
            self.registry.expiry(),
        )))?;

        log::info!("rendezvous server on {}", self.socket.local_addr()?);

        loop {
            if let Ok((size, addr)) = self.socket.recv_from(&mut buf) {
                self.handle_datagram(&buf[..size], addr);
            }

            if Instant::now() > self.next_gc {
                self.gc();
            }
        }
    }

    fn handle_datagram(&mut self, buf: &[u8], addr: SocketAddr) {
        for (reply, to) in self.registry.handle_datagram(buf, addr, Instant::now()) {
            if let Err(e) = self.socket.send_to(&reply, to) {
                log::debug!("send peer to {} fail, {}", to, e);
            }
        }
    }

    fn gc_interval(expiry: Option<Duration>) -> Duration {
        match expiry {
            Some(expiry) => (expiry / 2).clamp(Duration::from_millis(100), Duration::from_secs(30)),
            None => Duration::from_secs(30),
        }
    }

    fn gc(&mut self) {
        let n = self.registry.expire(Instant::now());
        if n > 0 {
            log::debug!("expired {} clients, {} left", n, self.registry.len());
        }

        self.next_gc = Instant::now() + Self::gc_interval(self.registry.expiry());
    }
}
