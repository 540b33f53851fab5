mod console;
mod guest;
mod host;
mod transport;

use std::{net::SocketAddr, time::Duration};

use arcana_core::config::SessionConfig;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arcana", version, about = "Two-player Arcana over UDP")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Host a table and play as P1.
    Host {
        #[arg(long, default_value_t = 6969)]
        port: u16,
        /// Seconds the guest gets to answer an Ace offer (1 to 3600).
        #[arg(
            long,
            default_value_t = 30,
            value_parser = clap::value_parser!(u64).range(1..=3600)
        )]
        ace_timeout_secs: u64,
    },
    /// Join a hosted table as P2.
    Join { addr: SocketAddr },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    match Cli::parse().mode {
        Mode::Host {
            port,
            ace_timeout_secs,
        } => {
            let config = SessionConfig {
                ace_reply_timeout: Duration::from_secs(ace_timeout_secs),
            };
            host::run(port, config).await
        }
        Mode::Join { addr } => guest::run(addr).await,
    }
}
