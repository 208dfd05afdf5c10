//! Text wire messages.
//!
//! Every control message is a single utf-8 datagram of whitespace separated
//! tokens, first token is the command:
//!
//! - `HELLO <id>` client -> server, registration and keepalive
//! - `PEER <ip> <port> <timestamp>` server -> client, pairing reply
//! - `P2P <id> <seq>` client -> peer, hole punch probe
//!
//! Data channel payload is raw bytes without any header and is never parsed here.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

pub const HELLO: &str = "HELLO";
pub const PEER: &str = "PEER";
pub const P2P: &str = "P2P";

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Hello { id: String },
    Peer { addr: SocketAddr, timestamp: Option<f64> },
    Punch { id: String, seq: u32 },
}

impl Message {
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Parse a control message. Unknown commands, missing tokens or invalid
    /// addresses yield `None`.
    pub fn parse(buf: &[u8]) -> Option<Message> {
        let text = String::from_utf8_lossy(buf);
        let mut tokens = text.split_whitespace();

        match tokens.next()? {
            HELLO => Some(Message::Hello {
                id: tokens.next()?.to_string(),
            }),
            PEER => {
                let ip: IpAddr = tokens.next()?.parse().ok()?;
                let port: u16 = tokens.next()?.parse().ok()?;
                // informational only
                let timestamp = tokens.next().and_then(|t| t.parse().ok());
                Some(Message::Peer {
                    addr: SocketAddr::new(ip, port),
                    timestamp,
                })
            }
            P2P => Some(Message::Punch {
                id: tokens.next()?.to_string(),
                seq: tokens.next()?.parse().ok()?,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Hello { id } => write!(f, "{} {}", HELLO, id),
            Message::Peer { addr, timestamp } => {
                write!(f, "{} {} {}", PEER, addr.ip(), addr.port())?;
                if let Some(ts) = timestamp {
                    write!(f, " {}", ts)?;
                }
                Ok(())
            }
            Message::Punch { id, seq } => write!(f, "{} {} {}", P2P, id, seq),
        }
    }
}

/// Does the datagram look like a pairing reply? Only the leading text matters,
/// the body may still fail to parse.
pub fn is_peer(buf: &[u8]) -> bool {
    String::from_utf8_lossy(buf).trim_start().starts_with(PEER)
}

/// Split a datagram received by the rendezvous server into `(command, id)`.
///
/// Any command registers its sender, fewer than two tokens is malformed.
pub fn registration(buf: &[u8]) -> Option<(String, String)> {
    let text = String::from_utf8_lossy(buf);
    let mut tokens = text.split_whitespace();
    let cmd = tokens.next()?;
    let id = tokens.next()?;
    Some((cmd.to_string(), id.to_string()))
}

/// Seconds since unix epoch, as carried in `PEER` replies.
pub fn timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
