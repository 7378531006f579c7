//! Messages exchanged between the coordinator and its worker cohort.

use serde::{Deserialize, Serialize};

use cargo_api::{DatasetKind, ErrorCode, TransferId, TransferState};

/// Tag space of the cohort transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tag {
    Pread,
    Pwrite,
    Sequential,
    BwShaping,
    Status,
    Shutdown,
}

/// How a single file moves between its two backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    /// Collective read from a parallel source, local writes to the target.
    ParallelRead,
    /// Local reads from the source, collective write to a parallel target.
    ParallelWrite,
    /// Block-by-block read/write through the byte-level interface.
    Sequential,
}

impl TransferKind {
    /// Derives the transfer kind from the endpoint backends: a parallel
    /// source wins, then a parallel target, then sequential.
    pub fn from_kinds(source: DatasetKind, target: DatasetKind) -> Self {
        if source == DatasetKind::Parallel {
            TransferKind::ParallelRead
        } else if target == DatasetKind::Parallel {
            TransferKind::ParallelWrite
        } else {
            TransferKind::Sequential
        }
    }

    pub fn tag(&self) -> Tag {
        match self {
            TransferKind::ParallelRead => Tag::Pread,
            TransferKind::ParallelWrite => Tag::Pwrite,
            TransferKind::Sequential => Tag::Sequential,
        }
    }
}

/// Per-file dispatch sent to every worker of the cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferMessage {
    pub tid: TransferId,
    /// Zero-based index of the file within the expanded request.
    pub seqno: u32,
    pub kind: TransferKind,
    pub input_path: String,
    pub input_kind: DatasetKind,
    pub output_path: String,
    pub output_kind: DatasetKind,
}

/// Progress/outcome report for one (tid, seqno) pair on one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub tid: TransferId,
    pub seqno: u32,
    pub state: TransferState,
    /// Instantaneous bandwidth in MiB/s for the last block step.
    pub bw: f32,
    pub error: Option<ErrorCode>,
}

/// Throttle delta broadcast for all operations of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaperMessage {
    pub tid: TransferId,
    pub shaping: i16,
}

/// Everything a worker can receive on its control inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlMessage {
    Transfer(TransferMessage),
    BwShaping(ShaperMessage),
    Shutdown,
}

impl ControlMessage {
    pub fn tag(&self) -> Tag {
        match self {
            ControlMessage::Transfer(m) => m.kind.tag(),
            ControlMessage::BwShaping(_) => Tag::BwShaping,
            ControlMessage::Shutdown => Tag::Shutdown,
        }
    }
}

impl std::fmt::Display for TransferMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{tid: {}, seqno: {}, input: {:?} ({}), output: {:?} ({})}}",
            self.tid,
            self.seqno,
            self.input_path,
            self.input_kind,
            self.output_path,
            self.output_kind
        )
    }
}

impl std::fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.error {
            Some(ec) => write!(
                f,
                "{{tid: {}, seqno: {}, state: {}, bw: {}, error: {}}}",
                self.tid, self.seqno, self.state, self.bw, ec
            ),
            None => write!(
                f,
                "{{tid: {}, seqno: {}, state: {}, bw: {}}}",
                self.tid, self.seqno, self.state, self.bw
            ),
        }
    }
}
