use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cargo_client::{Server, Transfer};

/// Reshape the bandwidth of a running transfer.
#[derive(Debug, Parser)]
#[command(name = "cargo-shaping", version, about = "Cargo shaping client")]
struct Cli {
    /// Server address, PROTOCOL://host:port
    #[arg(short, long, value_name = "ADDRESS", env = "CCP_SERVER")]
    server: String,

    /// Transfer id
    #[arg(short = 'i', long, value_name = "INTEGER")]
    tid: u64,

    /// Throttle delta; positive values slow the transfer down
    #[arg(short = 'b', long = "bw", value_name = "INTEGER")]
    shaping: i16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let server = Server::new(&cli.server)?;

    let transfer = Transfer::attach(cli.tid, server);
    transfer
        .bw_control(cli.shaping)
        .await
        .context("bw_control failed")?;

    println!("bw_control RPC was successful");
    Ok(())
}
