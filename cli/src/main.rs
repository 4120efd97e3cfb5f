//! AppConnect CLI - clipboard sync with a paired peer.

mod commands;
mod platform;
mod ui;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "appconnect")]
#[command(about = "Clipboard sync with a paired peer", long_about = None)]
struct Cli {
    /// Device name to present to peers
    #[arg(short, long, default_value_t = default_device_name())]
    name: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn default_device_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "appconnect-device".to_string())
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sync service (default)
    Run {
        /// Reconnect to a trusted device at this host
        #[arg(long)]
        host: Option<String>,
        /// Port of the peer (with --host)
        #[arg(long, default_value_t = appconnect_core::protocol::constants::DEFAULT_PORT)]
        port: u16,
        /// Trusted device id to reconnect to (with --host; defaults to the
        /// only trusted device)
        #[arg(long)]
        device: Option<String>,
    },
    /// Pair with a peer from its QR payload
    Pair {
        /// The QR payload JSON; read from stdin when omitted
        payload: Option<String>,
    },
    /// List paired devices
    Devices,
    /// Remove a paired device
    Unpair { device_id: String },
    /// Show device info
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("appconnect=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run {
        host: None,
        port: appconnect_core::protocol::constants::DEFAULT_PORT,
        device: None,
    }) {
        Commands::Run { host, port, device } => {
            commands::run_service(cli.name, host, port, device).await?
        }
        Commands::Pair { payload } => commands::pair(cli.name, payload).await?,
        Commands::Devices => commands::list_devices(cli.name)?,
        Commands::Unpair { device_id } => commands::unpair(cli.name, device_id).await?,
        Commands::Info => commands::show_info(cli.name)?,
    }

    Ok(())
}
