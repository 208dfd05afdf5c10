use std::io::{Error, ErrorKind::Other, Result};
use std::net::SocketAddr;
use std::time::Duration;
use structopt::StructOpt;

use natpunch::checksum::crc64;
use natpunch::udp::{Client, ClientConfig, Server};

#[derive(StructOpt, Debug)]
#[structopt(name = "natpunch")]
enum Opt {
    Client(ClientOpt),
    Server(ServerOpt),
}

#[derive(StructOpt, Debug)]
struct ClientOpt {
    #[structopt(long = "id")]
    id: String,

    #[structopt(long = "server-addr")]
    server_addr: String,

    #[structopt(long = "timeout-ms", default_value = "500")]
    timeout_ms: u64,

    #[structopt(long = "chunk-size", default_value = "1422")]
    chunk_size: usize,

    #[structopt(long = "peer-wait-secs", default_value = "20")]
    peer_wait_secs: u64,

    #[structopt(long = "punch-count", default_value = "5")]
    punch_count: u32,

    #[structopt(long = "signal-count", default_value = "10")]
    signal_count: u32,

    /// send this once the hole is punched
    #[structopt(long = "message")]
    message: Option<String>,
}

#[derive(StructOpt, Debug)]
struct ServerOpt {
    #[structopt(long = "listen-addr", default_value = "0.0.0.0:34780")]
    listen_addr: SocketAddr,

    /// forget clients silent for this long, never by default
    #[structopt(long = "expire-secs")]
    expire_secs: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();

    let opt: Opt = StructOpt::from_args();

    match opt {
        Opt::Server(opt) => run_server(opt),
        Opt::Client(opt) => run_client(opt),
    }
}

fn run_server(opt: ServerOpt) -> Result<()> {
    let mut s = Server::new(opt.listen_addr)?;
    if let Some(secs) = opt.expire_secs {
        s = s.with_expiry(Duration::from_secs(secs));
    }
    s.run()
}

fn run_client(opt: ClientOpt) -> Result<()> {
    let config = ClientConfig::new(&opt.server_addr, &opt.id)
        .with_recv_timeout(Duration::from_millis(opt.timeout_ms))
        .with_chunk_size(opt.chunk_size)
        .with_peer_wait(Duration::from_secs(opt.peer_wait_secs))
        .with_punch_count(opt.punch_count)
        .with_signal_count(opt.signal_count);

    let mut c = Client::with_config(config)?;

    let peer = match c.start()? {
        Some(peer) => peer,
        None => {
            c.stop()?;
            return Err(Error::new(Other, "no peer"));
        }
    };

    log::info!("{} ready, peer {}", opt.id, peer);
    c.enter_data_mode();

    if let Some(msg) = opt.message {
        let n = c.send(msg.as_bytes())?;
        log::info!(
            "sent {} bytes in {} datagrams, crc64 {:016x}",
            msg.len(),
            n,
            crc64(msg.as_bytes())
        );
    }

    loop {
        let data = c.recv(Some(Duration::from_millis(100)));
        if !data.is_empty() {
            log::info!("received {} bytes, crc64 {:016x}", data.len(), crc64(&data));
        }
    }
}
