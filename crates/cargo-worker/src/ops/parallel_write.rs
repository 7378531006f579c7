//! Collective-write operation: local source, parallel target.

use std::time::Instant;

use tracing::{debug, error};

use cargo_api::{DatasetKind, ErrorCode};
use cargo_storage::{backend_for, flags, OpenFile, StorageError, StripedView};
use cargo_transport::WorkerEndpoint;

use super::OpState;
use crate::collective::collective_write;

/// Stages a file into a parallel filesystem: every worker first reads its
/// striped blocks from the local source into a contiguous buffer, then the
/// cohort issues one collective write to the target.
pub struct ParallelWrite {
    input_path: String,
    input_kind: DatasetKind,
    output_path: String,
    output_kind: DatasetKind,
    block_size: u64,
    view: Option<StripedView>,
    buffer: Vec<u8>,
    input: Option<OpenFile>,
    state: OpState,
}

impl ParallelWrite {
    pub fn new(
        input_path: &str,
        input_kind: DatasetKind,
        output_path: &str,
        output_kind: DatasetKind,
        block_size: u64,
    ) -> Self {
        Self {
            input_path: input_path.to_string(),
            input_kind,
            output_path: output_path.to_string(),
            output_kind,
            block_size,
            view: None,
            buffer: Vec::new(),
            input: None,
            state: OpState::new(),
        }
    }

    pub fn setup(&mut self, endpoint: &WorkerEndpoint) -> ErrorCode {
        match self.do_setup(endpoint) {
            Ok(()) => {
                self.state.status = ErrorCode::TRANSFER_IN_PROGRESS;
            }
            Err(e) => {
                error!(input = %self.input_path, error = %e, "parallel write setup failed");
                self.state.status = ErrorCode::from(&e);
            }
        }
        self.state.status
    }

    fn do_setup(&mut self, endpoint: &WorkerEndpoint) -> Result<(), StorageError> {
        let input_backend = backend_for(self.input_kind);
        let file_size = input_backend.size(&self.input_path)?;

        let view = StripedView::new(
            file_size,
            self.block_size,
            endpoint.size() as u64,
            endpoint.rank() as u64,
        );
        self.buffer = vec![0u8; (view.owned_blocks() * self.block_size) as usize];
        self.input = Some(OpenFile::open(
            input_backend,
            &self.input_path,
            flags::RDONLY,
            0,
        )?);
        self.view = Some(view);
        Ok(())
    }

    pub fn progress(&mut self, endpoint: &WorkerEndpoint, ongoing_index: i32) -> i32 {
        let (view, input) = match (&self.view, &self.input) {
            (Some(v), Some(i)) => (*v, i),
            _ => {
                self.state.status = ErrorCode::SNAFU;
                return -1;
            }
        };

        match view.get(ongoing_index as u64) {
            Some(range) => {
                let start = ongoing_index as u64 * self.block_size;
                let slice = &mut self.buffer[start as usize..(start + range.len) as usize];

                let begin = Instant::now();
                if let Err(e) = input.pread(slice, range.offset) {
                    error!(input = %self.input_path, error = %e, "block read failed");
                    self.state.status = ErrorCode::from(&e);
                    return -1;
                }
                self.state.update_bw(self.block_size, begin.elapsed());
                debug!(
                    input = %self.input_path,
                    index = ongoing_index,
                    bw = self.state.bw,
                    sleep_ms = self.state.sleep_value().as_millis() as u64,
                    "block read"
                );
                self.state.throttle_sleep();

                ongoing_index + 1
            }
            None => {
                // Local phase finished; run the collective phase before
                // reporting any outcome.
                let result = collective_write(
                    endpoint,
                    backend_for(self.output_kind),
                    &self.output_path,
                    &view,
                    self.block_size,
                    &self.buffer,
                );
                match result {
                    Ok(()) => self.state.status = ErrorCode::SUCCESS,
                    Err(e) => {
                        error!(output = %self.output_path, error = %e, "collective write failed");
                        self.state.status = ErrorCode::from(&e);
                    }
                }
                -1
            }
        }
    }

    pub(crate) fn state(&self) -> &OpState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cargo_transport::in_proc_cohort;
    use tempfile::tempdir;

    fn drive(op: &mut ParallelWrite, endpoint: &WorkerEndpoint) -> ErrorCode {
        assert_eq!(op.setup(endpoint), ErrorCode::TRANSFER_IN_PROGRESS);
        let mut index = 0;
        while index >= 0 {
            index = op.progress(endpoint, index);
        }
        op.state().status
    }

    #[test]
    fn single_worker_copies_the_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i * 13 % 256) as u8).collect();
        std::fs::write(&src, &payload).unwrap();

        let (_controller, endpoints) = in_proc_cohort(1);
        let mut op = ParallelWrite::new(
            src.to_str().unwrap(),
            DatasetKind::Posix,
            dst.to_str().unwrap(),
            DatasetKind::Parallel,
            1024,
        );
        assert_eq!(drive(&mut op, &endpoints[0]), ErrorCode::SUCCESS);
        assert_eq!(std::fs::read(&dst).unwrap(), payload);
    }

    #[test]
    fn cohort_reassembles_the_stripes_on_the_target() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        // Not a multiple of the block size, so the last block is short.
        let payload: Vec<u8> = (0..4600u32).map(|i| (i % 241) as u8).collect();
        std::fs::write(&src, &payload).unwrap();

        let (_controller, endpoints) = in_proc_cohort(3);
        let handles: Vec<_> = endpoints
            .into_iter()
            .map(|ep| {
                let src = src.to_str().unwrap().to_string();
                let dst = dst.to_str().unwrap().to_string();
                std::thread::spawn(move || {
                    let mut op = ParallelWrite::new(
                        &src,
                        DatasetKind::Posix,
                        &dst,
                        DatasetKind::Parallel,
                        512,
                    );
                    drive(&mut op, &ep)
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), ErrorCode::SUCCESS);
        }
        assert_eq!(std::fs::read(&dst).unwrap(), payload);
    }

    #[test]
    fn missing_source_fails_before_any_collective_phase() {
        let dir = tempdir().unwrap();
        let (_controller, endpoints) = in_proc_cohort(1);
        let mut op = ParallelWrite::new(
            dir.path().join("absent").to_str().unwrap(),
            DatasetKind::Posix,
            dir.path().join("dst").to_str().unwrap(),
            DatasetKind::Parallel,
            512,
        );
        let status = op.setup(&endpoints[0]);
        assert_eq!(status, ErrorCode::system(libc::ENOENT as u32));
    }
}
