use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::proto::{self, Message};

#[derive(Copy, Clone, Debug)]
struct Client {
    addr: SocketAddr,
    last_seen: Instant,
}

/// One pairing reply: advertise `peer` to the client at `to`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pairing {
    pub to: SocketAddr,
    pub peer: SocketAddr,
}

impl Pairing {
    /// `PEER` datagram to send to `self.to`
    pub fn reply(&self, timestamp: f64) -> Vec<u8> {
        Message::Peer {
            addr: self.peer,
            timestamp: Some(timestamp),
        }
        .encode()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Registration {
    /// first client, nobody to pair with yet
    Waiting,
    /// known id, endpoint overwritten, no new pairing
    Refreshed,
    /// the registry just reached two clients
    Paired([Pairing; 2]),
    /// a third distinct id, not recorded
    Rejected,
}

/// Rendezvous registry for exactly two clients.
///
/// Pairing fires once, when an insertion makes the registry size exactly two.
/// Re-registering a known id only refreshes its endpoint. A third distinct id is
/// rejected instead of being paired with either side.
///
/// Entries never expire unless an expiry is configured.
#[derive(Debug, Default)]
pub struct Registry {
    clients: HashMap<String, Client>,
    // insertion order, so pairings come out deterministic
    order: Vec<String>,
    expiry: Option<Duration>,
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }

    /// drop entries not seen for `expiry`
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn expiry(&self) -> Option<Duration> {
        self.expiry
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn addr(&self, id: &str) -> Option<SocketAddr> {
        self.clients.get(id).map(|c| c.addr)
    }

    pub fn last_seen(&self, id: &str) -> Option<Instant> {
        self.clients.get(id).map(|c| c.last_seen)
    }

    pub fn register(&mut self, id: &str, addr: SocketAddr, now: Instant) -> Registration {
        if let Some(c) = self.clients.get_mut(id) {
            if c.addr != addr {
                log::debug!("{} moved {} -> {}", id, c.addr, addr);
            }
            c.addr = addr;
            c.last_seen = now;
            return Registration::Refreshed;
        }

        if self.clients.len() >= 2 {
            log::warn!("reject {} from {}, registry already holds a pair", id, addr);
            return Registration::Rejected;
        }

        log::debug!("new client {} {}", id, addr);
        self.clients.insert(
            id.to_string(),
            Client {
                addr,
                last_seen: now,
            },
        );
        self.order.push(id.to_string());

        if self.clients.len() < 2 {
            return Registration::Waiting;
        }

        let a = self.clients[&self.order[0]].addr;
        let b = self.clients[&self.order[1]].addr;
        log::info!("pair {} {} <-> {} {}", self.order[0], a, self.order[1], b);

        Registration::Paired([Pairing { to: a, peer: b }, Pairing { to: b, peer: a }])
    }

    /// Register the sender of a raw datagram. Returns the `PEER` replies to send,
    /// empty unless this datagram completed the pair. Malformed datagrams are
    /// ignored.
    pub fn handle_datagram(
        &mut self,
        buf: &[u8],
        from: SocketAddr,
        now: Instant,
    ) -> Vec<(Vec<u8>, SocketAddr)> {
        let (cmd, id) = match proto::registration(buf) {
            Some(r) => r,
            None => return Vec::new(),
        };
        log::trace!("{} {} from {}", cmd, id, from);

        match self.register(&id, from, now) {
            Registration::Paired(pairings) => {
                let ts = proto::timestamp();
                pairings.iter().map(|p| (p.reply(ts), p.to)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Evict stale entries, returns how many were removed. A no-op without expiry.
    pub fn expire(&mut self, now: Instant) -> usize {
        let expiry = match self.expiry {
            Some(expiry) => expiry,
            None => return 0,
        };

        let before = self.clients.len();
        self.clients.retain(|id, c| {
            let alive = now.saturating_duration_since(c.last_seen) <= expiry;
            if !alive {
                log::debug!("expired {}", id);
            }
            alive
        });
        let clients = &self.clients;
        self.order.retain(|id| clients.contains_key(id));

        before - self.clients.len()
    }
}
