//! Bookkeeping for in-flight transfer requests.
//!
//! A single transfer request may involve `N` files, and each file may be
//! served by `W` workers. The manager maps request ids to an `N × W` matrix
//! of part statuses:
//!
//! ```text
//! request 42 -> file 0 -> worker 0 -> pending
//!                         worker 1 -> pending
//!            -> file 1 -> worker 0 -> completed
//!                         worker 1 -> running
//! ```
//!
//! Readers (`lookup`, `lookup_all`) take the shared side of the lock and
//! never block each other; writers take the exclusive side. Hold times are
//! one map lookup plus one matrix scan.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tracing::error;

use cargo_api::proto::RequestStatus;
use cargo_api::{ErrorCode, TransferId, TransferState};

/// Status of one (file, worker) cell.
#[derive(Debug, Clone)]
pub struct PartStatus {
    name: String,
    state: TransferState,
    bw: f32,
    error: Option<ErrorCode>,
}

impl PartStatus {
    fn new() -> Self {
        Self {
            name: String::new(),
            state: TransferState::Pending,
            bw: 0.0,
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn bw(&self) -> f32 {
        self.bw
    }

    pub fn error(&self) -> Option<ErrorCode> {
        self.error
    }
}

type FileStatus = Vec<PartStatus>;

/// Handle describing a freshly created request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelRequest {
    tid: TransferId,
    nfiles: usize,
    nworkers: usize,
}

impl ParallelRequest {
    pub fn tid(&self) -> TransferId {
        self.tid
    }

    pub fn nfiles(&self) -> usize {
        self.nfiles
    }

    pub fn nworkers(&self) -> usize {
        self.nworkers
    }
}

/// Thread-safe map of transfer id → status matrix.
#[derive(Default)]
pub struct RequestManager {
    current_tid: AtomicU64,
    requests: RwLock<HashMap<TransferId, Vec<FileStatus>>>,
}

impl RequestManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh transfer id and installs an all-pending
    /// `nfiles × nworkers` matrix.
    pub fn create(&self, nfiles: usize, nworkers: usize) -> Result<ParallelRequest, ErrorCode> {
        let tid = self.current_tid.fetch_add(1, Ordering::Relaxed);
        let mut requests = self.requests.write().expect("request map poisoned");

        // The monotonic counter never hands out the same tid twice.
        if requests.contains_key(&tid) {
            error!(tid, "transfer id already present");
            return Err(ErrorCode::SNAFU);
        }
        requests.insert(tid, vec![vec![PartStatus::new(); nworkers]; nfiles]);

        Ok(ParallelRequest {
            tid,
            nfiles,
            nworkers,
        })
    }

    /// Replaces the matrix of an existing request with a fresh all-pending
    /// `nfiles × nworkers` one. Used by the deferred-staging path when the
    /// stored request is re-expanded at run time.
    pub fn reset(&self, tid: TransferId, nfiles: usize, nworkers: usize) -> Result<(), ErrorCode> {
        let mut requests = self.requests.write().expect("request map poisoned");
        match requests.get_mut(&tid) {
            Some(matrix) => {
                *matrix = vec![vec![PartStatus::new(); nworkers]; nfiles];
                Ok(())
            }
            None => {
                error!(tid, "request not found");
                Err(ErrorCode::NO_SUCH_TRANSFER)
            }
        }
    }

    /// Overwrites the `(seqno, wid)` cell of a request.
    pub fn update(
        &self,
        tid: TransferId,
        seqno: u32,
        wid: usize,
        name: &str,
        state: TransferState,
        bw: f32,
        error: Option<ErrorCode>,
    ) -> Result<(), ErrorCode> {
        let mut requests = self.requests.write().expect("request map poisoned");
        match requests.get_mut(&tid) {
            Some(matrix) => {
                assert!((seqno as usize) < matrix.len());
                assert!(wid < matrix[seqno as usize].len());
                matrix[seqno as usize][wid] = PartStatus {
                    name: name.to_string(),
                    state,
                    bw,
                    error,
                };
                Ok(())
            }
            None => {
                error!(tid, "request not found");
                Err(ErrorCode::NO_SUCH_TRANSFER)
            }
        }
    }

    /// Summary status: the first non-completed cell in row-major order, or
    /// a synthetic completed status when every cell completed.
    pub fn lookup(&self, tid: TransferId) -> Result<RequestStatus, ErrorCode> {
        let requests = self.requests.read().expect("request map poisoned");
        let matrix = requests.get(&tid).ok_or(ErrorCode::NO_SUCH_TRANSFER)?;

        for file in matrix {
            for part in file {
                if part.state == TransferState::Completed {
                    continue;
                }
                return Ok(RequestStatus {
                    name: part.name.clone(),
                    state: part.state,
                    bw: part.bw,
                    error: part.error,
                });
            }
        }

        Ok(RequestStatus::completed())
    }

    /// Per-file statuses: name/state/error come from the first
    /// non-completed worker (or the first worker once all completed);
    /// bandwidth is the arithmetic mean across the file's workers.
    pub fn lookup_all(&self, tid: TransferId) -> Result<Vec<RequestStatus>, ErrorCode> {
        let requests = self.requests.read().expect("request map poisoned");
        let matrix = requests.get(&tid).ok_or(ErrorCode::NO_SUCH_TRANSFER)?;

        let statuses = matrix
            .iter()
            .map(|file| {
                let mean_bw = if file.is_empty() {
                    0.0
                } else {
                    file.iter().map(|p| p.bw).sum::<f32>() / file.len() as f32
                };
                let pick = file
                    .iter()
                    .find(|p| p.state != TransferState::Completed)
                    .or_else(|| file.first());
                match pick {
                    Some(part) => RequestStatus {
                        name: part.name.clone(),
                        state: part.state,
                        bw: mean_bw,
                        error: part.error,
                    },
                    None => RequestStatus::completed(),
                }
            })
            .collect();

        Ok(statuses)
    }

    /// Erases a request.
    pub fn remove(&self, tid: TransferId) -> Result<(), ErrorCode> {
        let mut requests = self.requests.write().expect("request map poisoned");
        match requests.remove(&tid) {
            Some(_) => Ok(()),
            None => {
                error!(tid, "request not found");
                Err(ErrorCode::NO_SUCH_TRANSFER)
            }
        }
    }
}
