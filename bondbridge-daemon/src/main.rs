/*!
 * bondbridge Daemon
 * Bluetooth bonding requests from the presentation layer to BlueZ
 */

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

mod bluetooth;
mod channel;
mod config;
mod ipc;

use bluetooth::{BluezAdapter, BondingService};
use channel::BondChannel;
use config::DaemonConfig;
use ipc::IpcServer;

#[derive(Parser)]
#[command(name = "bondbridged")]
#[command(about = "Bluetooth bonding bridge daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "/etc/bondbridge/bondbridged.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon
    Run,
    /// Print the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("bondbridge_daemon={}", log_level))
        .init();

    // Load configuration
    let config = DaemonConfig::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(config).await,
        Commands::CheckConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run_daemon(config: DaemonConfig) -> Result<()> {
    info!("bondbridge daemon starting...");

    let adapter = BluezAdapter::new(&config.bluetooth);
    let bonding = BondingService::new(Arc::new(adapter));
    let channel = BondChannel::new(bonding, &config.channel);

    let ipc_server = IpcServer::bind(&config.socket_path, channel)?;
    info!("bondbridge daemon ready on socket: {}", config.socket_path);

    tokio::select! {
        result = ipc_server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    if let Err(e) = std::fs::remove_file(&config.socket_path) {
        tracing::debug!("Could not remove {}: {}", config.socket_path, e);
    }

    Ok(())
}
