//! The cooperative worker loop.

use std::time::Duration;

use tracing::{debug, info, warn};

use cargo_api::{ErrorCode, TransferState};
use cargo_transport::{ControlMessage, StatusMessage, TransferMessage, WorkerEndpoint};

use crate::ops::Operation;

const IDLE_SLEEP: Duration = Duration::from_millis(150);

struct InFlight {
    key: (String, String),
    tid: u64,
    seqno: u32,
    op: Operation,
    ongoing_index: i32,
}

/// One member of the staging cohort.
///
/// The loop advances at most one operation per iteration (round-robin),
/// then drains at most one control message, and sleeps briefly when there
/// is nothing to do. Everything runs on the thread that calls
/// [`Worker::run`]; no other task observes the operation table.
pub struct Worker {
    name: String,
    endpoint: WorkerEndpoint,
    block_size: u64,
    ops: Vec<InFlight>,
    cursor: usize,
}

impl Worker {
    pub fn new(endpoint: WorkerEndpoint, block_size: u64) -> Self {
        Self {
            name: format!("worker_{:03}", endpoint.rank()),
            endpoint,
            block_size,
            ops: Vec::new(),
            cursor: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the staging loop until a shutdown message arrives, then joins
    /// the cohort exit barrier.
    pub fn run(mut self) {
        info!(
            worker = %self.name,
            rank = self.endpoint.rank(),
            cohort = self.endpoint.size(),
            "staging process initialized"
        );

        loop {
            let mut worked = false;

            if !self.ops.is_empty() {
                self.advance_one();
                worked = true;
            }

            match self.endpoint.try_recv() {
                Ok(Some(ControlMessage::Transfer(msg))) => {
                    self.start_transfer(msg);
                    worked = true;
                }
                Ok(Some(ControlMessage::BwShaping(msg))) => {
                    debug!(worker = %self.name, tid = msg.tid, delta = msg.shaping, "bandwidth shaping");
                    for slot in &mut self.ops {
                        slot.op.shape_bandwidth(msg.shaping);
                    }
                    worked = true;
                }
                Ok(Some(ControlMessage::Shutdown)) => {
                    self.drain_on_shutdown();
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(worker = %self.name, error = %e, "control channel lost, exiting");
                    return;
                }
            }

            if !worked {
                std::thread::sleep(IDLE_SLEEP);
            }
        }

        info!(worker = %self.name, "entering exit barrier");
        self.endpoint.exit_barrier();
    }

    /// Advances exactly one in-flight operation by one block step.
    fn advance_one(&mut self) {
        self.cursor %= self.ops.len();
        let slot = &mut self.ops[self.cursor];

        let next = slot.op.progress(&self.endpoint, slot.ongoing_index);
        if next < 0 {
            let status = slot.op.status();
            let (state, error) = if status.is_ok() {
                (TransferState::Completed, None)
            } else {
                (TransferState::Failed, Some(status))
            };
            debug!(worker = %self.name, tid = slot.tid, seqno = slot.seqno, %status, "transfer finished");
            let report = StatusMessage {
                tid: slot.tid,
                seqno: slot.seqno,
                state,
                bw: slot.op.bw(),
                error,
            };
            let _ = self.endpoint.send_status(report);
            self.ops.remove(self.cursor);
            return;
        }

        slot.ongoing_index = next;
        let bw = slot.op.bw();
        if bw > 0.0 {
            let report = StatusMessage {
                tid: slot.tid,
                seqno: slot.seqno,
                state: TransferState::Running,
                bw,
                error: None,
            };
            let _ = self.endpoint.send_status(report);
        }
        self.cursor += 1;
    }

    /// Builds and opens a new operation; failures are reported upstream
    /// immediately and the operation is discarded.
    fn start_transfer(&mut self, msg: TransferMessage) {
        info!(worker = %self.name, message = %msg, "transfer request received");

        let key = (msg.input_path.clone(), msg.output_path.clone());
        let mut op = Operation::from_message(&msg, self.block_size);
        let status = op.setup(&self.endpoint);

        if status != ErrorCode::TRANSFER_IN_PROGRESS {
            let report = StatusMessage {
                tid: msg.tid,
                seqno: msg.seqno,
                state: TransferState::Failed,
                bw: 0.0,
                error: Some(status),
            };
            let _ = self.endpoint.send_status(report);
            return;
        }

        self.ops.push(InFlight {
            key,
            tid: msg.tid,
            seqno: msg.seqno,
            op,
            ongoing_index: 0,
        });
    }

    /// Reports a terminal status for every still-running operation. Nothing
    /// new is started; the operations themselves are not advanced further.
    fn drain_on_shutdown(&mut self) {
        info!(worker = %self.name, in_flight = self.ops.len(), "shutdown received");
        for slot in self.ops.drain(..) {
            let report = StatusMessage {
                tid: slot.tid,
                seqno: slot.seqno,
                state: TransferState::Failed,
                bw: 0.0,
                error: Some(ErrorCode::OTHER),
            };
            let _ = self.endpoint.send_status(report);
            debug!(
                worker = %self.name,
                input = %slot.key.0,
                output = %slot.key.1,
                "operation aborted by shutdown"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cargo_api::DatasetKind;
    use cargo_transport::{in_proc_cohort, ShaperMessage, TransferKind};
    use tempfile::tempdir;

    fn transfer_msg(tid: u64, seqno: u32, src: &std::path::Path, dst: &std::path::Path) -> ControlMessage {
        ControlMessage::Transfer(TransferMessage {
            tid,
            seqno,
            kind: TransferKind::Sequential,
            input_path: src.to_string_lossy().into_owned(),
            input_kind: DatasetKind::Posix,
            output_path: dst.to_string_lossy().into_owned(),
            output_kind: DatasetKind::Posix,
        })
    }

    fn collect_statuses(
        controller: &cargo_transport::CohortController,
    ) -> Vec<(usize, StatusMessage)> {
        let mut out = Vec::new();
        while let Ok(Some(pair)) = controller.try_recv_status() {
            out.push(pair);
        }
        out
    }

    #[test]
    fn worker_stages_a_file_and_reports_completion() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        let payload: Vec<u8> = (0..4000u32).map(|i| (i % 250) as u8).collect();
        std::fs::write(&src, &payload).unwrap();

        let (controller, mut endpoints) = in_proc_cohort(1);
        let endpoint = endpoints.remove(0);

        let worker = Worker::new(endpoint, 512);
        let handle = std::thread::spawn(move || worker.run());

        controller.send(0, transfer_msg(5, 0, &src, &dst)).unwrap();

        // Wait for the terminal report before asking the worker to exit.
        let terminal = loop {
            match controller.try_recv_status().unwrap() {
                Some((_, msg)) if msg.state.is_terminal() => break msg,
                _ => std::thread::sleep(Duration::from_millis(10)),
            }
        };
        controller.broadcast(ControlMessage::Shutdown).unwrap();
        controller.exit_barrier();
        handle.join().unwrap();

        assert_eq!(std::fs::read(&dst).unwrap(), payload);
        assert_eq!(terminal.state, TransferState::Completed);
        assert_eq!(terminal.tid, 5);
        assert!(terminal.error.is_none());
    }

    #[test]
    fn failed_setup_reports_failed_and_drops_the_operation() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("does-not-exist");
        let dst = dir.path().join("dst");

        let (controller, mut endpoints) = in_proc_cohort(1);
        let endpoint = endpoints.remove(0);

        controller.send(0, transfer_msg(9, 2, &src, &dst)).unwrap();
        controller.broadcast(ControlMessage::Shutdown).unwrap();

        let worker = Worker::new(endpoint, 512);
        let handle = std::thread::spawn(move || worker.run());
        controller.exit_barrier();
        handle.join().unwrap();

        let statuses = collect_statuses(&controller);
        assert_eq!(statuses.len(), 1);
        let (wid, msg) = &statuses[0];
        assert_eq!(*wid, 0);
        assert_eq!(msg.seqno, 2);
        assert_eq!(msg.state, TransferState::Failed);
        assert_eq!(msg.error, Some(ErrorCode::system(libc::ENOENT as u32)));
    }

    #[test]
    fn shutdown_fails_still_running_operations() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        std::fs::write(&src, vec![1u8; 100_000]).unwrap();

        let (controller, mut endpoints) = in_proc_cohort(1);
        let endpoint = endpoints.remove(0);

        // Throttle hard so the operation cannot finish before shutdown.
        controller.send(0, transfer_msg(3, 0, &src, &dst)).unwrap();
        controller
            .send(
                0,
                ControlMessage::BwShaping(ShaperMessage {
                    tid: 3,
                    shaping: 10,
                }),
            )
            .unwrap();
        controller.broadcast(ControlMessage::Shutdown).unwrap();

        let worker = Worker::new(endpoint, 512);
        let handle = std::thread::spawn(move || worker.run());
        controller.exit_barrier();
        handle.join().unwrap();

        let statuses = collect_statuses(&controller);
        let last = &statuses.last().unwrap().1;
        assert_eq!(last.state, TransferState::Failed);
        assert_eq!(last.error, Some(ErrorCode::OTHER));
    }
}
