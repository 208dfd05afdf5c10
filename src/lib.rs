//!Rendezvous and udp hole punching for two peers, each behind its own NAT.
//!
//!A node behind NAT only receives traffic from addresses it has sent to first,
//!and nobody outside knows which public port its router picked.
//!
//!## How it works
//!Both peers send `HELLO <id>` to a publicly reachable rendezvous server from
//!the socket they will later use for data. The server records the address it
//!observes for each identifier, and as soon as it knows two of them it sends each
//!peer a `PEER <ip> <port> <timestamp>` with the other's address.
//!
//!Each peer then fires a few `P2P <id> <seq>` probes straight at the other. The
//!outbound probes open a mapping on the local NAT, so the other side's probes
//!and data are let in. From there on the rendezvous server is out of the path.
//!
//!After punching the caller switches the session to data mode. Every datagram
//!arriving from then on is raw payload and is appended to a buffer the caller
//!drains. Payloads are split into datagrams of at most
//!`udp::DEFAULT_CHUNK_SIZE` bytes (path MTU 1472 minus 50 bytes of headroom).
//!
//!There is no framing, no acknowledgment and no reordering. Datagrams may be lost
//!or arrive out of order, and the receiver only ever sees concatenated bytes.
//!Anything that needs message boundaries or reliability has to add its own
//!framing on top.
//!
//!## Feature flags
//!- `client`: `udp::Client` session
//!- `server`: blocking rendezvous server `udp::Server`
//!- `async`: tokio rendezvous server `udp::AsyncServer`
//!
//!`demos/demo.rs` runs a server and two clients in one process.

pub mod checksum;
pub mod proto;
pub mod udp;
