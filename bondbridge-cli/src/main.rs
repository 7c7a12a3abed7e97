/*!
 * bondctl
 * Ask bondbridged to bond with a Bluetooth device
 */

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

mod client;

use client::{BondClient, MethodCall, MethodResponse};

#[derive(Parser)]
#[command(name = "bondctl")]
#[command(about = "Send bonding requests to bondbridged")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Daemon socket path
    #[arg(short, long, default_value = "/run/bondbridge/bondbridge.sock")]
    socket: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a bond with the device at ADDRESS
    Bond { address: String },
    /// Send a raw method call and print the response
    Call {
        method: String,
        /// Arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("bondbridge_cli={}", log_level))
        .with_writer(std::io::stderr)
        .init();

    let client = BondClient::new(&cli.socket);

    match cli.command {
        Commands::Bond { address } => match client.create_bond(&address).await? {
            MethodResponse::Success {
                result: Value::Bool(true),
            } => {
                println!("Bonding with {} initiated", address);
            }
            MethodResponse::Success { .. } => {
                println!("Bonding with {} not initiated", address);
                std::process::exit(1);
            }
            MethodResponse::Error { code, message, .. } => bail!("{}: {}", code, message),
            MethodResponse::NotImplemented => bail!("daemon does not support createBond"),
        },
        Commands::Call { method, args } => {
            let arguments = match args {
                Some(json) => serde_json::from_str(&json)?,
                None => Value::Null,
            };
            let response = client.call(&MethodCall { method, arguments }).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
