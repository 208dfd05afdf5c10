use std::io::{Error, ErrorKind::InvalidInput, Result};
use std::net::SocketAddr;
use std::time::Duration;

/// Path MTU assumed for payload datagrams.
pub const PATH_MTU: usize = 1472;
/// Margin kept free for ip/udp headers so chunks are never fragmented.
pub const HEADER_MARGIN: usize = 50;
pub const DEFAULT_CHUNK_SIZE: usize = PATH_MTU - HEADER_MARGIN;
/// Largest payload a single udp datagram can carry over ipv4.
pub const MAX_CHUNK_SIZE: usize = 65507;

pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_PEER_WAIT: Duration = Duration::from_secs(20);
pub const DEFAULT_PUNCH_COUNT: u32 = 5;
pub const DEFAULT_SIGNAL_COUNT: u32 = 10;

/// Client session settings.
///
/// ```
/// use natpunch::udp::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("rendezvous.example.org:3478", "c1")
///     .with_recv_timeout(Duration::from_millis(200))
///     .with_chunk_size(1200);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// registration key at the rendezvous server
    pub id: String,
    /// rendezvous server, `host:port`
    pub server_addr: String,
    /// local bind address, follows the server address family if unset
    pub local_addr: Option<SocketAddr>,
    /// socket read timeout, also the receive loop's shutdown latency and the
    /// spacing of hole punch probes
    pub recv_timeout: Duration,
    pub chunk_size: usize,
    /// how long `start` waits for a pairing reply
    pub peer_wait: Duration,
    pub punch_count: u32,
    pub signal_count: u32,
    /// cap in bytes, applied separately to the data buffer and the signal
    /// queue, unbounded if unset
    pub buffer_limit: Option<usize>,
}

impl ClientConfig {
    pub fn new(server_addr: &str, id: &str) -> Self {
        Self {
            id: id.into(),
            server_addr: server_addr.into(),
            local_addr: None,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            peer_wait: DEFAULT_PEER_WAIT,
            punch_count: DEFAULT_PUNCH_COUNT,
            signal_count: DEFAULT_SIGNAL_COUNT,
            buffer_limit: None,
        }
    }

    pub fn with_local_addr(mut self, local_addr: SocketAddr) -> Self {
        self.local_addr = Some(local_addr);
        self
    }

    pub fn with_recv_timeout(mut self, recv_timeout: Duration) -> Self {
        self.recv_timeout = recv_timeout;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_peer_wait(mut self, peer_wait: Duration) -> Self {
        self.peer_wait = peer_wait;
        self
    }

    pub fn with_punch_count(mut self, punch_count: u32) -> Self {
        self.punch_count = punch_count;
        self
    }

    pub fn with_signal_count(mut self, signal_count: u32) -> Self {
        self.signal_count = signal_count;
        self
    }

    pub fn with_buffer_limit(mut self, buffer_limit: usize) -> Self {
        self.buffer_limit = Some(buffer_limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() || self.id.contains(char::is_whitespace) {
            return Err(Error::new(InvalidInput, "id must be a single non-empty token"));
        }

        // a zero read timeout means blocking forever, the receive loop would never exit
        if self.recv_timeout.is_zero() {
            return Err(Error::new(InvalidInput, "recv timeout must be positive"));
        }

        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::new(
                InvalidInput,
                format!("chunk size must be within 1..={}", MAX_CHUNK_SIZE),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = ClientConfig::new("127.0.0.1:3478", "c1");
        assert_eq!(c.chunk_size, 1422);
        assert_eq!(c.recv_timeout, Duration::from_millis(500));
        assert_eq!(c.peer_wait, Duration::from_secs(20));
        assert_eq!(c.punch_count, 5);
        assert_eq!(c.signal_count, 10);
        assert_eq!(c.buffer_limit, None);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_invalid() {
        let c = ClientConfig::new("127.0.0.1:3478", "");
        assert_eq!(c.validate().unwrap_err().kind(), InvalidInput);

        let c = ClientConfig::new("127.0.0.1:3478", "two words");
        assert_eq!(c.validate().unwrap_err().kind(), InvalidInput);

        let c = ClientConfig::new("127.0.0.1:3478", "c1").with_chunk_size(0);
        assert_eq!(c.validate().unwrap_err().kind(), InvalidInput);

        let c = ClientConfig::new("127.0.0.1:3478", "c1").with_chunk_size(MAX_CHUNK_SIZE + 1);
        assert_eq!(c.validate().unwrap_err().kind(), InvalidInput);

        let c = ClientConfig::new("127.0.0.1:3478", "c1").with_recv_timeout(Duration::ZERO);
        assert_eq!(c.validate().unwrap_err().kind(), InvalidInput);
    }
}
