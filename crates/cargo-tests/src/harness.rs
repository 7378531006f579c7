//! Test environment: a complete staging service inside the test process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tempfile::TempDir;

use cargo_client::Server;
use cargo_coordinator::handlers::CoordinatorHandler;
use cargo_coordinator::{ftio, CargoConfig, Coordinator};
use cargo_transport::{in_proc_cohort, RpcServer};
use cargo_worker::Worker;

/// Deterministic payload for round-trip comparisons.
pub fn seeded_payload(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

/// A temporary source/target directory pair.
pub struct TestTree {
    _tempdir: TempDir,
    pub source_root: PathBuf,
    pub target_root: PathBuf,
}

impl TestTree {
    pub fn new() -> Self {
        let tempdir = tempfile::tempdir().expect("failed to create temp dir");
        let source_root = tempdir.path().join("source");
        let target_root = tempdir.path().join("target");
        std::fs::create_dir_all(&source_root).unwrap();
        std::fs::create_dir_all(&target_root).unwrap();
        Self {
            _tempdir: tempdir,
            source_root,
            target_root,
        }
    }

    /// Writes `count` seeded files named `source-dataset-<i>` and returns
    /// their paths.
    pub fn populate_sources(&self, count: usize, size: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = self.source_root.join(format!("source-dataset-{i}"));
                std::fs::write(&path, seeded_payload(i as u64, size)).unwrap();
                path
            })
            .collect()
    }

    pub fn target_path(&self, i: usize) -> PathBuf {
        self.target_root.join(format!("target-dataset-{i}"))
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

/// The whole service in one process: worker threads, coordinator tasks and
/// a control endpoint on a loopback port.
pub struct TestDaemon {
    pub server: Server,
    pub coordinator: Arc<Coordinator>,
    listener_task: tokio::task::JoinHandle<()>,
    ftio_task: tokio::task::JoinHandle<()>,
    server_task: tokio::task::JoinHandle<cargo_transport::Result<()>>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl TestDaemon {
    /// Spawns a daemon with `nworkers` workers and small blocks.
    pub async fn spawn(nworkers: usize) -> Self {
        let config = CargoConfig {
            workers: nworkers,
            block_size_kib: 1,
            ..CargoConfig::default()
        };
        Self::spawn_with(config).await
    }

    /// Spawns a daemon from an explicit configuration; the listen address
    /// is always replaced by a fresh loopback port.
    pub async fn spawn_with(config: CargoConfig) -> Self {
        let (controller, endpoints) = in_proc_cohort(config.workers);
        let block_size = config.block_size_kib * 1024;
        let workers: Vec<_> = endpoints
            .into_iter()
            .map(|ep| {
                let worker = Worker::new(ep, block_size);
                std::thread::Builder::new()
                    .name(worker.name().to_string())
                    .spawn(move || worker.run())
                    .expect("failed to spawn worker thread")
            })
            .collect();

        let coordinator = Coordinator::new(controller, &config);
        let listener_task = tokio::spawn(coordinator.clone().listener_loop());
        let ftio_task = tokio::spawn(ftio::scheduler_loop(coordinator.clone()));

        let tcp = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind loopback");
        let addr = tcp.local_addr().unwrap();
        let handler = Arc::new(CoordinatorHandler::new(coordinator.clone()));
        let server_task = tokio::spawn(RpcServer::serve(tcp, handler));

        let server = Server::new(format!("tcp://{addr}")).unwrap();

        Self {
            server,
            coordinator,
            listener_task,
            ftio_task,
            server_task,
            workers,
        }
    }

    /// Graceful wind-down in the production finalisation order: status
    /// listener, FTIO scheduler, worker cohort, control transport.
    pub async fn shutdown(self) {
        self.coordinator.shutdown();
        self.listener_task.await.expect("listener task panicked");
        self.ftio_task.await.expect("ftio task panicked");
        let workers = self.workers;
        tokio::task::spawn_blocking(move || {
            for worker in workers {
                worker.join().expect("worker thread panicked");
            }
        })
        .await
        .expect("worker join task panicked");
        self.server_task.abort();
    }
}

/// Reads a file, or panics with its path for context.
pub fn read_file(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}
