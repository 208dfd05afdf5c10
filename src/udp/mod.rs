//! UDP rendezvous and hole punching.
//!
//! use `Client` to register, learn the peer address, punch and exchange data.
//!
//! use `Server` (or `AsyncServer` with the `async` feature) to run the rendezvous point.

mod registry;
pub use registry::{Pairing, Registration, Registry};

#[cfg(feature = "client")]
mod client;
#[cfg(feature = "client")]
mod config;
#[cfg(feature = "client")]
mod inbox;
#[cfg(feature = "client")]
pub use client::Client;
#[cfg(feature = "client")]
pub use config::{
    ClientConfig, DEFAULT_CHUNK_SIZE, DEFAULT_PEER_WAIT, DEFAULT_PUNCH_COUNT,
    DEFAULT_RECV_TIMEOUT, DEFAULT_SIGNAL_COUNT, HEADER_MARGIN, MAX_CHUNK_SIZE, PATH_MTU,
};
#[cfg(feature = "client")]
pub use inbox::Mode;

#[cfg(feature = "server")]
mod server;
#[cfg(feature = "server")]
pub use server::Server;

#[cfg(feature = "async")]
mod server_async;
#[cfg(feature = "async")]
pub use server_async::Server as AsyncServer;
