use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cargo_coordinator::handlers::CoordinatorHandler;
use cargo_coordinator::{ftio, CargoConfig, Coordinator};
use cargo_transport::{in_proc_cohort, split_address, RpcServer};
use cargo_worker::Worker;

/// The Cargo data-staging daemon.
#[derive(Debug, Parser)]
#[command(name = "cargod", version, about = "Parallel data-staging service")]
struct Cli {
    /// Address to listen on, PROTOCOL://host:port
    #[arg(short, long, value_name = "ADDRESS")]
    listen: Option<String>,

    /// Write logs to FILE instead of stderr
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Number of staging workers
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Transfer block size in KiB (power of two)
    #[arg(short, long, value_name = "KIB")]
    block_size: Option<u64>,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> anyhow::Result<CargoConfig> {
    let mut config = match &cli.config {
        Some(path) => CargoConfig::from_file(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => CargoConfig::default(),
    };
    if let Some(listen) = &cli.listen {
        config.listen = listen.clone();
    }
    if let Some(output) = &cli.output {
        config.output = Some(output.clone());
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(block_size) = cli.block_size {
        config.block_size_kib = block_size;
    }
    anyhow::ensure!(config.workers > 0, "at least one worker is required");
    anyhow::ensure!(
        (config.block_size_kib * 1024).is_power_of_two(),
        "block size must be a power of two"
    );
    Ok(config)
}

fn init_logging(config: &CargoConfig) -> anyhow::Result<()> {
    match &config.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
                .with(EnvFilter::from_default_env())
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(EnvFilter::from_default_env())
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config)?;

    let (protocol, host_port) = split_address(&config.listen)?;
    tracing::info!(
        listen = %config.listen,
        protocol,
        workers = config.workers,
        block_size_kib = config.block_size_kib,
        "cargod starting"
    );

    // Worker cohort: dedicated threads driving the staging loops.
    let (controller, endpoints) = in_proc_cohort(config.workers);
    let block_size = config.block_size_kib * 1024;
    let worker_threads: Vec<_> = endpoints
        .into_iter()
        .map(|endpoint| {
            let worker = Worker::new(endpoint, block_size);
            std::thread::Builder::new()
                .name(worker.name().to_string())
                .spawn(move || worker.run())
                .context("cannot spawn worker thread")
        })
        .collect::<anyhow::Result<_>>()?;

    let coordinator = Coordinator::new(controller, &config);

    let listener_task = tokio::spawn(coordinator.clone().listener_loop());
    let ftio_task = tokio::spawn(ftio::scheduler_loop(coordinator.clone()));

    let tcp = tokio::net::TcpListener::bind(host_port)
        .await
        .with_context(|| format!("cannot bind {host_port}"))?;
    let handler = Arc::new(CoordinatorHandler::new(coordinator.clone()));
    let server_task = tokio::spawn(RpcServer::serve(tcp, handler));
    tracing::info!("control transport ready");

    while !coordinator.is_shutting_down() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // Finalisation order: status listener (winds the cohort down), FTIO
    // scheduler, cohort threads, control transport.
    tracing::info!("shutting down");
    listener_task.await.ok();
    ftio_task.await.ok();
    for thread in worker_threads {
        if thread.join().is_err() {
            tracing::warn!("worker thread panicked during shutdown");
        }
    }
    server_task.abort();
    tracing::info!("cargod stopped");
    Ok(())
}
