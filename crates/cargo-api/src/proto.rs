//! Serde payloads for the coordinator's RPC surface.
//!
//! Every response carries the coordinator-assigned `op_id` of the handled
//! call plus an [`ErrorCode`]; value-bearing responses add their payload as
//! an `Option` that is `Some` exactly when the error code is success.

use serde::{Deserialize, Serialize};

use crate::{Dataset, ErrorCode, TransferId, TransferState};

/// Summary of one file (or of a whole request) as reported by the
/// coordinator: the first non-completed part's state, name and error, with
/// the bandwidth aggregation rules of the request manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatus {
    /// Path of the file this status describes; empty for parts that never
    /// started and for the synthetic all-completed summary.
    pub name: String,
    pub state: TransferState,
    /// MiB/s as last reported (summary) or averaged across the file's
    /// workers (per-file view).
    pub bw: f32,
    pub error: Option<ErrorCode>,
}

impl RequestStatus {
    /// The synthetic status returned once every part of a request completed.
    pub fn completed() -> Self {
        Self {
            name: String::new(),
            state: TransferState::Completed,
            bw: 0.0,
            error: None,
        }
    }
}

/// Liveness probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingRequest {}

/// Response shared by every RPC that returns no value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericResponse {
    pub op_id: u64,
    pub error_code: ErrorCode,
}

/// Submit a transfer of `sources[i]` → `targets[i]` for every `i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDatasetsRequest {
    pub sources: Vec<Dataset>,
    pub targets: Vec<Dataset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDatasetsResponse {
    pub op_id: u64,
    pub error_code: ErrorCode,
    /// Allocated transfer id; `None` when the request was rejected before a
    /// tid could be allocated (e.g. mismatched vector lengths).
    pub tid: Option<TransferId>,
}

/// Summary status query across all files of a transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferStatusRequest {
    pub tid: TransferId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferStatusResponse {
    pub op_id: u64,
    pub error_code: ErrorCode,
    pub status: Option<RequestStatus>,
}

/// Per-file status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferStatusesRequest {
    pub tid: TransferId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferStatusesResponse {
    pub op_id: u64,
    pub error_code: ErrorCode,
    /// One entry per file, in seqno order.
    pub statuses: Vec<RequestStatus>,
}

/// Broadcast a throttle delta to every worker serving `tid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BwControlRequest {
    pub tid: TransferId,
    pub shaping: i16,
}

/// Arm FTIO deferred staging.
///
/// `confidence` and `probability` are stored for operators; only `period`
/// and `run` drive the scheduler. `period > 0` forces `run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtioRequest {
    pub confidence: f32,
    pub probability: f32,
    pub period: f32,
    pub run: bool,
}

/// Begin graceful shutdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownRequest {}
