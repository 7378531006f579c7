use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cargo_client::{ftio_int, Server};

/// Arm FTIO deferred staging on a Cargo coordinator.
#[derive(Debug, Parser)]
#[command(name = "cargo-ftio", version, about = "Cargo ftio client")]
struct Cli {
    /// Server address, PROTOCOL://host:port
    #[arg(short, long, value_name = "ADDRESS", env = "CCP_SERVER")]
    server: String,

    /// Confidence of the FTIO prediction
    #[arg(short, long, value_name = "FLOAT", default_value_t = -1.0)]
    conf: f32,

    /// Probability of the FTIO prediction
    #[arg(short, long, value_name = "FLOAT", default_value_t = -1.0)]
    probability: f32,

    /// Staging period in seconds
    #[arg(short = 't', long, value_name = "FLOAT", default_value_t = -1.0)]
    period: f32,

    /// Trigger the stage operation to run now. Has no effect when period
    /// is set > 0
    #[arg(long)]
    run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let server = Server::new(&cli.server)?;

    ftio_int(&server, cli.conf, cli.probability, cli.period, cli.run)
        .await
        .context("ftio_int failed")?;

    println!("ftio_int RPC was successful");
    Ok(())
}
