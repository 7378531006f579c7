//! Transfer operations.
//!
//! One [`Operation`] exists per in-flight file on a worker. The three kinds
//! share a small surface: `setup()` runs once and either opens the transfer
//! (status becomes transfer-in-progress) or fails it; `progress(i)` moves
//! exactly one block and returns the next index, or `-1` once the operation
//! reached a terminal state, after which `status()` holds the outcome.

mod parallel_read;
mod parallel_write;
mod sequential;

pub use parallel_read::ParallelRead;
pub use parallel_write::ParallelWrite;
pub use sequential::SequentialTransfer;

use std::time::Duration;

use cargo_api::ErrorCode;
use cargo_transport::{TransferKind, TransferMessage, WorkerEndpoint};

/// Progress-accounting state shared by all operation kinds.
#[derive(Debug)]
pub(crate) struct OpState {
    pub status: ErrorCode,
    /// Instantaneous bandwidth of the last block step, MiB/s.
    pub bw: f32,
    /// Signed throttle; each positive unit adds 100 ms of sleep per step.
    pub throttle: i32,
}

impl OpState {
    pub fn new() -> Self {
        Self {
            status: ErrorCode::TRANSFER_IN_PROGRESS,
            bw: 0.0,
            throttle: 0,
        }
    }

    /// Records the bandwidth of one block step.
    pub fn update_bw(&mut self, block_size: u64, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bw = ((block_size as f64 / (1024.0 * 1024.0)) / secs) as f32;
        }
    }

    /// Sleep duration implied by the current throttle; zero when the
    /// throttle is zero or negative.
    pub fn sleep_value(&self) -> Duration {
        if self.throttle <= 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(100) * self.throttle as u32
        }
    }

    /// Applies one throttle step: sleeps if shaping is in effect.
    pub fn throttle_sleep(&self) {
        let d = self.sleep_value();
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }
}

/// One in-flight file transfer on a worker.
pub enum Operation {
    ParallelRead(ParallelRead),
    ParallelWrite(ParallelWrite),
    Sequential(SequentialTransfer),
}

impl Operation {
    /// Builds the operation matching the dispatch message. No I/O happens
    /// until [`Operation::setup`].
    pub fn from_message(msg: &TransferMessage, block_size: u64) -> Self {
        match msg.kind {
            TransferKind::ParallelRead => Operation::ParallelRead(ParallelRead::new(
                &msg.input_path,
                msg.input_kind,
                &msg.output_path,
                msg.output_kind,
                block_size,
            )),
            TransferKind::ParallelWrite => Operation::ParallelWrite(ParallelWrite::new(
                &msg.input_path,
                msg.input_kind,
                &msg.output_path,
                msg.output_kind,
                block_size,
            )),
            TransferKind::Sequential => Operation::Sequential(SequentialTransfer::new(
                &msg.input_path,
                msg.input_kind,
                &msg.output_path,
                msg.output_kind,
                block_size,
            )),
        }
    }

    /// Opens handles, sizes the transfer and allocates buffers. Returns the
    /// resulting status: transfer-in-progress on success, the mapped error
    /// otherwise.
    pub fn setup(&mut self, endpoint: &WorkerEndpoint) -> ErrorCode {
        match self {
            Operation::ParallelRead(op) => op.setup(endpoint),
            Operation::ParallelWrite(op) => op.setup(endpoint),
            Operation::Sequential(op) => op.setup(endpoint),
        }
    }

    /// Advances the transfer by one block. Returns the index to re-enter
    /// with, or `-1` when the operation is terminal.
    pub fn progress(&mut self, endpoint: &WorkerEndpoint, ongoing_index: i32) -> i32 {
        match self {
            Operation::ParallelRead(op) => op.progress(ongoing_index),
            Operation::ParallelWrite(op) => op.progress(endpoint, ongoing_index),
            Operation::Sequential(op) => op.progress(ongoing_index),
        }
    }

    /// Current status; the final outcome once `progress` returned `-1`.
    pub fn status(&self) -> ErrorCode {
        self.state().status
    }

    /// Instantaneous bandwidth of the last block step, MiB/s.
    pub fn bw(&self) -> f32 {
        self.state().bw
    }

    /// Adds a signed shaping delta to the throttle; takes effect on the next
    /// progress step.
    pub fn shape_bandwidth(&mut self, delta: i16) {
        self.state_mut().throttle += i32::from(delta);
    }

    /// Current throttle value (may be negative; only positive values sleep).
    pub fn throttle(&self) -> i32 {
        self.state().throttle
    }

    fn state(&self) -> &OpState {
        match self {
            Operation::ParallelRead(op) => op.state(),
            Operation::ParallelWrite(op) => op.state(),
            Operation::Sequential(op) => op.state(),
        }
    }

    fn state_mut(&mut self) -> &mut OpState {
        match self {
            Operation::ParallelRead(op) => op.state_mut(),
            Operation::ParallelWrite(op) => op.state_mut(),
            Operation::Sequential(op) => op.state_mut(),
        }
    }
}
