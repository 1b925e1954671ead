//! CCM multicast monitor
//!
//! Joins the UECS multicast group and prints every decoded packet, one
//! line each, until interrupted. Useful for checking what field devices
//! are actually broadcasting.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use uecs_ccm_bridge::protocol::{parse_ccm_xml, RECV_BUFFER_SIZE};
use uecs_ccm_bridge::receiver::bind_multicast_socket;

#[derive(Parser, Debug)]
#[command(name = "ccm-watch")]
#[command(about = "Print decoded UECS-CCM multicast packets")]
struct Cli {
    /// Also print the raw XML of each datagram
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let socket = bind_multicast_socket()?;
    println!("listening for CCM packets (ctrl-c to stop)...");

    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            result = socket.recv_from(&mut buf) => {
                let (len, addr) = result?;
                if cli.raw {
                    println!("--- {} bytes from {} ---", len, addr.ip());
                    println!("{}", String::from_utf8_lossy(&buf[..len]).trim_end());
                }
                let source_ip = addr.ip().to_string();
                for packet in parse_ccm_xml(&buf[..len], &source_ip) {
                    println!(
                        "{} {:15} {:20} {}={} priority={} lv={}",
                        packet.timestamp.format("%H:%M:%S"),
                        packet.source_ip,
                        packet.raw_type,
                        packet.house_id(),
                        packet.value,
                        packet.priority,
                        packet.level,
                    );
                }
            }
        }
    }

    println!("stopped");
    Ok(())
}
