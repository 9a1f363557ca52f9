// src/main.rs - Relay entry point
use clap::Parser;
use print_relay::config;
use print_relay::identity::{IdentityProvider, InterfaceIdentity};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "print-relay", version, about = "MQTT to CUPS print relay")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "relay.toml")]
    config: String,

    /// Log level (overrides the configuration file; RUST_LOG overrides both)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();
    let loaded = config::load_config(&args.config);

    let level = args
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string());

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)))
        .init();

    tracing::info!("Starting print-relay");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Loading configuration from: {}", args.config);

    let config = loaded.map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", args.config, e);
        tracing::error!("Please ensure the configuration file exists and is properly formatted");
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    let identity = InterfaceIdentity::new(config.device.clone()).resolve();
    tracing::info!("Device: {} ({})", identity.mac_address, identity.ip_address);
    if !identity.is_resolved() {
        tracing::warn!("Device identity incomplete; set [device] overrides in the configuration");
    }
    tracing::info!("Broker: {}:{}", config.mqtt.host, config.mqtt.port);
    tracing::info!("Printer: {}", config.printer.name);

    if let Err(e) = print_relay::agent::run(config, identity).await {
        tracing::error!("Relay initialization failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}
