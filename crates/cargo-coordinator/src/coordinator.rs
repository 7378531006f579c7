//! The coordinator core: intake, dispatch, status listening, shutdown.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use cargo_api::proto::RequestStatus;
use cargo_api::{Dataset, ErrorCode, TransferId};
use cargo_storage::backend_for;
use cargo_transport::{
    CohortController, ControlMessage, ShaperMessage, TransferKind, TransferMessage,
};

use crate::config::CargoConfig;
use crate::expansion::{expand_requests, expansion_error};
use crate::ftio::{FtioState, StagedTransfer};
use crate::request_manager::RequestManager;

/// Polling cadence of the status listener.
const LISTENER_IDLE: Duration = Duration::from_millis(10);
/// Polling cadence while the deferred-staging path waits for completion.
const STAGED_POLL: Duration = Duration::from_millis(150);

/// Long-lived coordinator state shared by the RPC handlers and the two
/// auxiliary tasks.
pub struct Coordinator {
    request_manager: RequestManager,
    controller: Arc<CohortController>,
    block_size: u64,
    quiescence: Duration,
    shutting_down: AtomicBool,
    ftio: FtioState,
    op_id: AtomicU64,
    /// tid → expanded file names, used to label status updates.
    names: RwLock<HashMap<TransferId, Vec<String>>>,
}

impl Coordinator {
    pub fn new(controller: CohortController, config: &CargoConfig) -> Arc<Self> {
        Arc::new(Self {
            request_manager: RequestManager::new(),
            controller: Arc::new(controller),
            block_size: config.block_size_kib * 1024,
            quiescence: Duration::from_secs_f32(config.ftio_quiescence_secs),
            shutting_down: AtomicBool::new(false),
            ftio: FtioState::default(),
            op_id: AtomicU64::new(0),
            names: RwLock::new(HashMap::new()),
        })
    }

    pub fn request_manager(&self) -> &RequestManager {
        &self.request_manager
    }

    pub(crate) fn ftio(&self) -> &FtioState {
        &self.ftio
    }

    /// Allocates the operation id reported back in RPC responses.
    pub fn next_op_id(&self) -> u64 {
        self.op_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn nworkers(&self) -> usize {
        self.controller.nworkers()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // RPC surface
    // ------------------------------------------------------------------

    pub fn ping(&self) -> ErrorCode {
        ErrorCode::SUCCESS
    }

    /// Handles a transfer submission: validate, expand, create the request
    /// record and dispatch (or store for deferred staging when FTIO mode is
    /// armed).
    pub fn transfer_datasets(
        &self,
        sources: Vec<Dataset>,
        targets: Vec<Dataset>,
    ) -> Result<TransferId, ErrorCode> {
        if sources.len() != targets.len() {
            error!(
                nsources = sources.len(),
                ntargets = targets.len(),
                "mismatched dataset vectors"
            );
            return Err(ErrorCode::SNAFU);
        }

        if self.ftio.is_armed() {
            let request = self
                .request_manager
                .create(sources.len(), self.nworkers())?;
            info!(tid = request.tid(), "ftio armed, storing transfer");
            self.ftio.store_pending(StagedTransfer {
                tid: request.tid(),
                sources,
                targets,
            });
            return Ok(request.tid());
        }

        let (sources, targets) =
            expand_requests(&sources, &targets).map_err(|e| expansion_error(&e))?;

        let request = self
            .request_manager
            .create(sources.len(), self.nworkers())?;
        self.register_names(request.tid(), &sources);
        self.dispatch(request.tid(), &sources, &targets)?;
        info!(
            tid = request.tid(),
            nfiles = sources.len(),
            nworkers = request.nworkers(),
            "transfer dispatched"
        );
        Ok(request.tid())
    }

    pub fn transfer_status(&self, tid: TransferId) -> Result<RequestStatus, ErrorCode> {
        self.request_manager.lookup(tid)
    }

    pub fn transfer_statuses(&self, tid: TransferId) -> Result<Vec<RequestStatus>, ErrorCode> {
        self.request_manager.lookup_all(tid)
    }

    /// Broadcasts a throttle delta to every worker of the cohort.
    pub fn bw_control(&self, tid: TransferId, shaping: i16) -> ErrorCode {
        match self
            .controller
            .broadcast(ControlMessage::BwShaping(ShaperMessage { tid, shaping }))
        {
            Ok(()) => ErrorCode::SUCCESS,
            Err(e) => {
                error!(tid, error = %e, "bandwidth shaping broadcast failed");
                ErrorCode::SNAFU
            }
        }
    }

    pub fn ftio_int(&self, confidence: f32, probability: f32, period: f32, run: bool) -> ErrorCode {
        self.ftio.arm(confidence, probability, period, run);
        ErrorCode::SUCCESS
    }

    /// Raises the process-wide shutting-down flag; the listener task picks
    /// it up and winds down the cohort.
    pub fn shutdown(&self) -> ErrorCode {
        info!("shutdown requested");
        self.shutting_down.store(true, Ordering::SeqCst);
        ErrorCode::SUCCESS
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn register_names(&self, tid: TransferId, sources: &[Dataset]) {
        let names = sources.iter().map(|d| d.path().to_string()).collect();
        self.names
            .write()
            .expect("name map poisoned")
            .insert(tid, names);
    }

    fn name_for(&self, tid: TransferId, seqno: u32) -> String {
        self.names
            .read()
            .expect("name map poisoned")
            .get(&tid)
            .and_then(|v| v.get(seqno as usize))
            .cloned()
            .unwrap_or_default()
    }

    /// Sends one per-file control message to every worker in the cohort.
    fn dispatch(
        &self,
        tid: TransferId,
        sources: &[Dataset],
        targets: &[Dataset],
    ) -> Result<(), ErrorCode> {
        for (seqno, (source, target)) in sources.iter().zip(targets).enumerate() {
            if target.supports_parallel_transfer() {
                if let Some(parent) = Path::new(target.path()).parent() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        error!(target = target.path(), error = %e, "cannot create target parents");
                        return Err(ErrorCode::from(e));
                    }
                }
            }

            let message = TransferMessage {
                tid,
                seqno: seqno as u32,
                kind: TransferKind::from_kinds(source.kind(), target.kind()),
                input_path: source.path().to_string(),
                input_kind: source.kind(),
                output_path: target.path().to_string(),
                output_kind: target.kind(),
            };
            debug!(message = %message, "dispatching file");
            self.controller
                .broadcast(ControlMessage::Transfer(message))
                .map_err(|e| {
                    error!(tid, seqno, error = %e, "dispatch failed");
                    ErrorCode::SNAFU
                })?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Status listener task
    // ------------------------------------------------------------------

    /// Applies worker status messages to the request manager; on shutdown,
    /// notifies the cohort and joins the exit barrier.
    pub async fn listener_loop(self: Arc<Self>) {
        loop {
            let drained = self.drain_statuses();

            if self.is_shutting_down() {
                info!("listener shutting down the cohort");
                if let Err(e) = self.controller.broadcast(ControlMessage::Shutdown) {
                    warn!(error = %e, "shutdown broadcast failed");
                }
                let controller = self.controller.clone();
                let _ = tokio::task::spawn_blocking(move || controller.exit_barrier()).await;
                // Terminal statuses emitted on the way out still count.
                self.drain_statuses();
                info!("cohort exited");
                break;
            }

            if !drained {
                sleep(LISTENER_IDLE).await;
            }
        }
    }

    fn drain_statuses(&self) -> bool {
        let mut drained = false;
        while let Ok(Some((wid, msg))) = self.controller.try_recv_status() {
            drained = true;
            let name = self.name_for(msg.tid, msg.seqno);
            debug!(wid, status = %msg, "worker status");
            if let Err(e) = self.request_manager.update(
                msg.tid,
                msg.seqno,
                wid,
                &name,
                msg.state,
                msg.bw,
                msg.error,
            ) {
                debug!(tid = msg.tid, %e, "dropping status for unknown transfer");
            }
        }
        drained
    }

    // ------------------------------------------------------------------
    // Deferred staging
    // ------------------------------------------------------------------

    /// Runs the stored FTIO transfer once: re-expand, keep only quiescent
    /// files, dispatch, wait for completion, then unlink the sources.
    pub(crate) async fn run_staged(&self) {
        let staged = match self.ftio.pending() {
            Some(s) => s,
            None => return,
        };
        info!(tid = staged.tid, "running deferred staging");

        let (sources, targets) = match expand_requests(&staged.sources, &staged.targets) {
            Ok(pair) => pair,
            Err(e) => {
                error!(tid = staged.tid, error = %e, "deferred expansion failed");
                return;
            }
        };

        // Skip files the producer may still be writing.
        let threshold = SystemTime::now() - self.quiescence;
        let mut quiescent_sources = Vec::new();
        let mut quiescent_targets = Vec::new();
        for (source, target) in sources.into_iter().zip(targets) {
            match backend_for(source.kind()).stat(source.path()) {
                Ok(md) if md.mtime < threshold => {
                    quiescent_sources.push(source);
                    quiescent_targets.push(target);
                }
                Ok(_) => debug!(source = source.path(), "skipping non-quiescent file"),
                Err(e) => warn!(source = source.path(), error = %e, "stat failed, skipping"),
            }
        }

        if quiescent_sources.is_empty() {
            debug!(tid = staged.tid, "nothing quiescent to stage");
            return;
        }

        if let Err(e) = self
            .request_manager
            .reset(staged.tid, quiescent_sources.len(), self.nworkers())
        {
            error!(tid = staged.tid, %e, "cannot reset staged request");
            return;
        }
        self.register_names(staged.tid, &quiescent_sources);
        if self
            .dispatch(staged.tid, &quiescent_sources, &quiescent_targets)
            .is_err()
        {
            return;
        }

        // Wait for the staged files to finish before unlinking anything.
        loop {
            if self.is_shutting_down() {
                return;
            }
            match self.request_manager.lookup(staged.tid) {
                Ok(status) if status.state == cargo_api::TransferState::Completed => break,
                Ok(status) if status.state == cargo_api::TransferState::Failed => {
                    error!(tid = staged.tid, error = ?status.error, "deferred staging failed");
                    return;
                }
                Ok(_) => sleep(STAGED_POLL).await,
                Err(_) => return,
            }
        }

        for source in &quiescent_sources {
            match backend_for(source.kind()).unlink(source.path()) {
                Ok(()) => debug!(source = source.path(), "staged source unlinked"),
                Err(e) => warn!(source = source.path(), error = %e, "unlink failed"),
            }
        }
        info!(
            tid = staged.tid,
            nfiles = quiescent_sources.len(),
            "deferred staging finished"
        );
    }
}
