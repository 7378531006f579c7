use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cargo_api::{Dataset, DatasetKind};
use cargo_client::{transfer_datasets, Server};

/// Copy datasets through a Cargo coordinator.
#[derive(Debug, Parser)]
#[command(name = "ccp", version, about = "Cargo copy client")]
struct Cli {
    /// Server address, PROTOCOL://host:port
    #[arg(short, long, value_name = "ADDRESS", env = "CCP_SERVER")]
    server: String,

    /// Input dataset paths
    #[arg(short, long, value_name = "PATH", required = true, num_args = 1..)]
    input: Vec<String>,

    /// Output dataset paths, one per input
    #[arg(short, long, value_name = "PATH", required = true, num_args = 1..)]
    output: Vec<String>,

    /// Input dataset kind
    #[arg(long = "if", value_name = "KIND", default_value = "posix")]
    input_kind: DatasetKind,

    /// Output dataset kind
    #[arg(long = "of", value_name = "KIND", default_value = "posix")]
    output_kind: DatasetKind,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(
        cli.input.len() == cli.output.len(),
        "the number of input datasets does not match the number of output datasets"
    );

    let server = Server::new(&cli.server)?;
    let sources: Vec<Dataset> = cli
        .input
        .iter()
        .map(|p| Dataset::new(p, cli.input_kind))
        .collect();
    let targets: Vec<Dataset> = cli
        .output
        .iter()
        .map(|p| Dataset::new(p, cli.output_kind))
        .collect();

    let transfer = transfer_datasets(&server, sources, targets)
        .await
        .context("transfer_datasets failed")?;
    println!("transfer accepted (tid: {})", transfer.tid());

    let status = transfer.wait().await.context("wait failed")?;
    if status.failed() {
        anyhow::bail!("transfer {} failed: {}", transfer.tid(), status.error());
    }

    println!("transfer {} completed", transfer.tid());
    Ok(())
}
