//! One-shot CCM test sender
//!
//! Builds a single control packet and transmits it on the multicast group.
//! Bypasses the bridge's allowlist and rate limit on purpose: this is an
//! operator tool for protocol-level testing against real hardware, so
//! keep the values sane.

use clap::Parser;

use uecs_ccm_bridge::protocol::{build_ccm_xml, ControlParams};
use uecs_ccm_bridge::sender::{MulticastTransport, PacketTransport};

#[derive(Parser, Debug)]
#[command(name = "ccm-send")]
#[command(about = "Send a single UECS-CCM control packet")]
struct Cli {
    /// CCM type to send (e.g. "Irri", "VenFan")
    ccm_type: String,

    /// Control value (typically 0 or 1, or 0-100 for positions)
    value: f64,

    #[arg(short, long, default_value_t = 1)]
    room: u32,

    #[arg(long, default_value_t = 1)]
    region: u32,

    #[arg(long, default_value_t = 1)]
    order: u32,

    /// CCM priority (1 = emergency, 10 = normal control, 30 = low)
    #[arg(short, long, default_value_t = 10)]
    priority: u32,

    /// Print the packet without sending it
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let params = ControlParams {
        room: cli.room,
        region: cli.region,
        order: cli.order,
        priority: cli.priority,
        ..ControlParams::default()
    };
    let payload = build_ccm_xml(&cli.ccm_type, cli.value, &params, None);

    print!("{}", String::from_utf8_lossy(&payload));
    if cli.dry_run {
        println!("(dry run, nothing sent)");
        return Ok(());
    }

    MulticastTransport.transmit(&payload)?;
    println!("sent {}={} to room {}", cli.ccm_type, cli.value, cli.room);
    Ok(())
}
