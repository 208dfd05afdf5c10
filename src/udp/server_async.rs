use std::io::Result;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::{
    net::{ToSocketAddrs, UdpSocket},
    select,
    time::{interval, MissedTickBehavior},
};

use super::registry::Registry;

/// Udp rendezvous server running on tokio
///
/// same protocol as [`super::Server`], for embedding into an async application.
pub struct Server {
    socket: UdpSocket,
    registry: Registry,
}

impl Server {
    pub async fn new<A: ToSocketAddrs>(listen_addr: A) -> Result<Self> {
        let socket = UdpSocket::bind(listen_addr).await?;

        Ok(Self {
            socket,
            registry: Registry::new(),
        })
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.registry = self.registry.with_expiry(expiry);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn run(mut self) -> Result<()> {
        let mut buf = [0; 2048];

        let period = match self.registry.expiry() {
            Some(expiry) => (expiry / 2).max(Duration::from_millis(100)),
            None => Duration::from_secs(30),
        };
        let mut gc = interval(period);
        gc.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!("rendezvous server on {}", self.socket.local_addr()?);

        loop {
            let received = select! {
                r = self.socket.recv_from(&mut buf) => r.ok(),
                _ = gc.tick() => None,
            };

            match received {
                Some((size, addr)) => self.handle_datagram(&buf[..size], addr).await,
                None => {
                    let n = self.registry.expire(Instant::now());
                    if n > 0 {
                        log::debug!("expired {} clients, {} left", n, self.registry.len());
                    }
                }
            }
        }
    }

    async fn handle_datagram(&mut self, buf: &[u8], addr: SocketAddr) {
        for (reply, to) in self.registry.handle_datagram(buf, addr, Instant::now()) {
            if let Err(e) = self.socket.send_to(&reply, to).await {
                log::debug!("send peer to {} fail, {}", to, e);
            }
        }
    }
}
