use natpunch::checksum::crc64;
use natpunch::udp::{Client, ClientConfig, Server};
use std::error::Error;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn Error>> {
    let server_addr = "127.0.0.1:34780";

    {
        thread::spawn(move || Server::new(server_addr).unwrap().run().unwrap());
    }

    let config = |id: &str| {
        ClientConfig::new(server_addr, id).with_recv_timeout(Duration::from_millis(100))
    };

    let t = {
        let config = config("c1");
        thread::spawn(move || {
            let mut c = Client::with_config(config).unwrap();
            c.start().unwrap().expect("no peer");
            thread::sleep(Duration::from_millis(200));
            c.enter_data_mode();

            let mut data = Vec::new();
            while data.len() < 5000 {
                data.extend(c.recv_timeout(Duration::from_secs(10)).unwrap());
            }
            println!("c1 received {} bytes, crc64 {:016x}", data.len(), crc64(&data));
            c.stop().unwrap();
        })
    };

    let mut c = Client::with_config(config("c2"))?;
    c.start()?.ok_or("no peer")?;
    c.enter_data_mode();
    // let c1 switch to data mode before the payload lands
    thread::sleep(Duration::from_millis(500));

    let payload: Vec<u8> = (0..5000u32).map(|i| i as u8).collect();
    let n = c.send(&payload)?;
    println!("c2 sent {} bytes in {} datagrams, crc64 {:016x}", payload.len(), n, crc64(&payload));

    t.join().unwrap();
    c.stop()?;

    Ok(())
}
