//! Haptic web gateway — standalone entry point.
//!
//! Runs the gateway outside a host application: the catalog is registered
//! against a logging event sink, the TLS control server listens on loopback,
//! and Ctrl+C unloads everything gracefully.
//!
//! # Usage
//!
//! ```text
//! haptic-gateway [OPTIONS]
//!
//! Options:
//!   --port <PORT>            TLS control server port [default: 41443]
//!   --data-dir <DIR>         Data directory (certificate cache lives here)
//!   --poll-interval <SECS>   Device poll interval in seconds [default: 5]
//! ```
//!
//! Environment variable overrides: `HAPTIC_PORT`, `HAPTIC_DATA_DIR`,
//! `HAPTIC_POLL_INTERVAL`. CLI arguments take precedence. Log level comes
//! from `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use haptic_gateway::application::gateway::{
    HapticGateway, LoggingEventSink, LoggingStatusReporter,
};
use haptic_gateway::domain::config::GatewayConfig;
use haptic_gateway::infrastructure::detector::bluetooth::NativeBluetoothProbe;
use haptic_gateway::infrastructure::hid::HidapiBackend;

/// Secure control plane for web-triggered device feedback patterns.
#[derive(Debug, Parser)]
#[command(name = "haptic-gateway", about, version)]
struct Cli {
    /// TLS control server port on loopback.
    #[arg(long, default_value_t = 41443, env = "HAPTIC_PORT")]
    port: u16,

    /// Data directory; the certificate cache is created underneath it.
    /// Defaults to the platform-local data directory.
    #[arg(long, env = "HAPTIC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Device-detector poll interval in seconds.
    #[arg(long, default_value_t = 5, env = "HAPTIC_POLL_INTERVAL")]
    poll_interval: u64,
}

impl Cli {
    fn into_config(self) -> GatewayConfig {
        let data_dir = self.data_dir.unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("haptic-gateway")
        });
        GatewayConfig {
            listen_port: self.port,
            data_dir,
            poll_interval: Duration::from_secs(self.poll_interval.max(1)),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.into_config();
    info!(
        port = config.listen_port,
        data_dir = %config.data_dir.display(),
        "haptic gateway starting"
    );

    let backend = HidapiBackend::new(config.device.clone())
        .context("failed to initialize the HID subsystem")?;
    let probe = NativeBluetoothProbe::new(config.device.bluetooth_name_prefix.clone());

    let mut gateway = HapticGateway::new(
        config,
        Arc::new(backend),
        Arc::new(probe),
        Arc::new(LoggingEventSink),
        Arc::new(LoggingStatusReporter),
    );

    gateway.load().await;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("received Ctrl+C — shutting down");

    gateway.unload().await;
    info!("haptic gateway stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
