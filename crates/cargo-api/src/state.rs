//! Transfer lifecycle states.

use serde::{Deserialize, Serialize};

/// The lifecycle of a transfer (or of a single file/worker part of one).
///
/// Transitions are monotonic: `Pending` → `Running` → `Completed` or
/// `Failed`. `Completed` is terminal and never reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TransferState {
    /// Whether the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Failed)
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransferState::Pending => "pending",
            TransferState::Running => "running",
            TransferState::Completed => "completed",
            TransferState::Failed => "failed",
        };
        f.write_str(s)
    }
}
