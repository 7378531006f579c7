//! Collective-read operation: parallel source, local target.

use std::time::Instant;

use tracing::{debug, error};

use cargo_api::{DatasetKind, ErrorCode};
use cargo_storage::{backend_for, flags, OpenFile, StorageError, StripedView};
use cargo_transport::WorkerEndpoint;

use super::OpState;
use crate::collective::collective_read;

/// Stages a file out of a parallel filesystem: the cohort collectively
/// reads the striped source into per-worker buffers, then every worker
/// writes its blocks to the target through the byte-level interface.
pub struct ParallelRead {
    input_path: String,
    input_kind: DatasetKind,
    output_path: String,
    output_kind: DatasetKind,
    block_size: u64,
    view: Option<StripedView>,
    buffer: Vec<u8>,
    output: Option<OpenFile>,
    state: OpState,
}

impl ParallelRead {
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
            output: None,
            state: OpState::new(),
        }
    }

    pub fn setup(&mut self, endpoint: &WorkerEndpoint) -> ErrorCode {
        match self.do_setup(endpoint) {
            Ok(()) => {
                self.state.status = ErrorCode::TRANSFER_IN_PROGRESS;
            }
            Err(e) => {
                error!(input = %self.input_path, error = %e, "parallel read setup failed");
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

        collective_read(
            endpoint,
            input_backend,
            &self.input_path,
            &view,
            self.block_size,
            &mut self.buffer,
        )?;

        let output = OpenFile::open(
            backend_for(self.output_kind),
            &self.output_path,
            flags::WRONLY | flags::CREAT,
            0o644,
        )?;
        output.fallocate(0, 0, file_size)?;

        self.view = Some(view);
        self.output = Some(output);
        Ok(())
    }

    pub fn progress(&mut self, ongoing_index: i32) -> i32 {
        let (view, output) = match (&self.view, &self.output) {
            (Some(v), Some(o)) => (*v, o),
            _ => {
                self.state.status = ErrorCode::SNAFU;
                return -1;
            }
        };

        let range = match view.get(ongoing_index as u64) {
            Some(r) => r,
            None => {
                self.state.status = ErrorCode::SUCCESS;
                return -1;
            }
        };

        let start = ongoing_index as u64 * self.block_size;
        let slice = &self.buffer[start as usize..(start + range.len) as usize];

        let begin = Instant::now();
        if let Err(e) = output.pwrite(slice, range.offset) {
            error!(output = %self.output_path, error = %e, "block write failed");
            self.state.status = ErrorCode::from(&e);
            return -1;
        }
        self.state.update_bw(self.block_size, begin.elapsed());
        debug!(
            output = %self.output_path,
            index = ongoing_index,
            bw = self.state.bw,
            sleep_ms = self.state.sleep_value().as_millis() as u64,
            "block written"
        );
        self.state.throttle_sleep();

        ongoing_index + 1
    }

    pub(crate) fn state(&self) -> &OpState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }
}
