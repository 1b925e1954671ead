//! UECS-CCM bridge - main entry point
//!
//! Joins the CCM multicast group, caches inbound telemetry, and serves the
//! HTTP/JSON query/command surface until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use uecs_ccm_bridge::{http_api, BridgeConfig, BridgeService, CcmReceiver, CcmSender, SensorCache};

/// UECS-CCM greenhouse bridge configuration
#[derive(Parser, Debug)]
#[command(name = "uecs-ccm-bridge")]
#[command(about = "UECS-CCM multicast bridge with cached telemetry and guarded actuator control")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, env = "UECS_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port (overrides the config file)
    #[arg(short, long, env = "UECS_BRIDGE_PORT")]
    port: Option<u16>,

    /// HTTP bind address (overrides the config file)
    #[arg(long, env = "UECS_BRIDGE_BIND")]
    bind: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn initialize_logging(&self) {
        let filter = if self.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.initialize_logging();

    let mut config = BridgeConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.http.port = port;
    }
    if let Some(bind) = cli.bind.clone() {
        config.http.bind = bind;
    }

    let cache = Arc::new(SensorCache::new());
    let sender = CcmSender::new(config.safety.to_limits());

    let mut receiver = CcmReceiver::new(Arc::clone(&cache));
    receiver.start()?;

    let service = Arc::new(BridgeService::new(
        cache,
        sender.clone(),
        config.nodes.timeout_seconds,
    ));
    let app = http_api::router(service);

    let addr = format!("{}:{}", config.http.bind, config.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP bridge listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    receiver.stop().await;
    sender.cancel_all_timers().await;
    info!("UECS-CCM bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
