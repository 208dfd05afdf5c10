use std::collections::VecDeque;
use std::mem;
use std::net::SocketAddr;

use crate::proto::{self, Message};

/// How the receive loop interprets incoming datagrams.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// text control messages, `PEER` replies are picked up
    Signaling,
    /// every datagram is payload
    Data,
}

/// Everything the receive loop hands over to the caller.
///
/// The mode lives under the same lock as the buffers, so a datagram is
/// interpreted either entirely before or entirely after a switch to data mode.
#[derive(Debug)]
pub(crate) struct Inbox {
    mode: Mode,
    signals: VecDeque<(Vec<u8>, SocketAddr)>,
    signal_bytes: usize,
    data: Vec<u8>,
    limit: Option<usize>,
    dropped: u64,
}

impl Inbox {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            mode: Mode::Signaling,
            signals: VecDeque::new(),
            signal_bytes: 0,
            data: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch to data mode. There is no way back.
    pub fn enter_data_mode(&mut self) -> bool {
        let changed = self.mode == Mode::Signaling;
        self.mode = Mode::Data;
        changed
    }

    /// Take one datagram from the socket. Returns the advertised peer when it is
    /// a pairing reply received in signaling mode.
    pub fn accept(&mut self, buf: &[u8], from: SocketAddr) -> Option<SocketAddr> {
        match self.mode {
            Mode::Signaling => {
                if proto::is_peer(buf) {
                    if let Some(Message::Peer { addr, .. }) = Message::parse(buf) {
                        return Some(addr);
                    }
                    log::debug!("malformed peer reply from {}", from);
                }
                if self.over_limit(self.signal_bytes, buf.len()) {
                    self.drop_datagram("signal queue", self.signal_bytes, buf.len(), from);
                    return None;
                }
                self.signal_bytes += buf.len();
                self.signals.push_back((buf.to_vec(), from));
                None
            }
            Mode::Data => {
                if self.over_limit(self.data.len(), buf.len()) {
                    self.drop_datagram("data buffer", self.data.len(), buf.len(), from);
                    return None;
                }
                self.data.extend_from_slice(buf);
                None
            }
        }
    }

    fn over_limit(&self, held: usize, incoming: usize) -> bool {
        matches!(self.limit, Some(limit) if held + incoming > limit)
    }

    fn drop_datagram(&mut self, what: &str, held: usize, len: usize, from: SocketAddr) {
        self.dropped += 1;
        log::warn!("{} full ({} bytes), drop {} bytes from {}", what, held, len, from);
    }

    pub fn take_data(&mut self) -> Vec<u8> {
        mem::take(&mut self.data)
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn take_signals(&mut self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.signal_bytes = 0;
        self.signals.drain(..).collect()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from() -> SocketAddr {
        "192.0.2.10:4000".parse().unwrap()
    }

    #[test]
    fn test_signaling() {
        let mut inbox = Inbox::new(None);

        assert_eq!(
            inbox.accept(b"PEER 192.0.2.20 5000 1.5", from()),
            Some("192.0.2.20:5000".parse().unwrap())
        );
        assert_eq!(inbox.accept(b"P2P c2 0", from()), None);
        assert_eq!(inbox.accept(b"PEER bogus", from()), None);

        let signals = inbox.take_signals();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].0, b"P2P c2 0");
        assert_eq!(signals[1].0, b"PEER bogus");
        assert_eq!(signals[1].1, from());
        assert!(inbox.take_signals().is_empty());
        assert!(!inbox.has_data());
    }

    #[test]
    fn test_data_mode_is_final() {
        let mut inbox = Inbox::new(None);
        assert_eq!(inbox.mode(), Mode::Signaling);
        assert!(inbox.enter_data_mode());
        assert!(!inbox.enter_data_mode());
        assert_eq!(inbox.mode(), Mode::Data);

        // control text is payload now
        assert_eq!(inbox.accept(b"PEER 192.0.2.20 5000 1.5", from()), None);
        assert_eq!(inbox.accept(b"HELLO c1", from()), None);

        assert_eq!(inbox.take_data(), b"PEER 192.0.2.20 5000 1.5HELLO c1");
        assert!(inbox.take_signals().is_empty());
        assert_eq!(inbox.mode(), Mode::Data);
    }

    #[test]
    fn test_drain() {
        let mut inbox = Inbox::new(None);
        inbox.enter_data_mode();

        inbox.accept(&[1, 2, 3], from());
        inbox.accept(&[4], from());
        assert!(inbox.has_data());
        assert_eq!(inbox.take_data(), vec![1, 2, 3, 4]);
        assert!(inbox.take_data().is_empty());

        inbox.accept(&[5], from());
        assert_eq!(inbox.take_data(), vec![5]);
    }

    #[test]
    fn test_limit() {
        let mut inbox = Inbox::new(Some(4));
        inbox.enter_data_mode();

        inbox.accept(&[1, 2, 3], from());
        inbox.accept(&[4, 5], from());
        inbox.accept(&[6], from());
        assert_eq!(inbox.dropped(), 1);
        assert_eq!(inbox.take_data(), vec![1, 2, 3, 6]);

        inbox.accept(&[7, 8], from());
        assert_eq!(inbox.take_data(), vec![7, 8]);
    }

    #[test]
    fn test_signal_limit() {
        let mut inbox = Inbox::new(Some(16));

        inbox.accept(b"P2P c2 0", from());
        inbox.accept(b"P2P c2 1", from());
        inbox.accept(b"P2P c2 2", from());
        assert_eq!(inbox.dropped(), 1);

        let signals = inbox.take_signals();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[1].0, b"P2P c2 1");

        // draining frees the room again, pairing replies are never queued
        inbox.accept(b"P2P c2 3", from());
        assert_eq!(
            inbox.accept(b"PEER 192.0.2.20 5000 1.5", from()),
            Some("192.0.2.20:5000".parse().unwrap())
        );
        assert_eq!(inbox.take_signals().len(), 1);
        assert_eq!(inbox.dropped(), 1);
    }
}
