//! Sequential operation: both endpoints through the byte-level interface.

use std::time::Instant;

use tracing::{debug, error};

use cargo_api::{DatasetKind, ErrorCode};
use cargo_storage::{backend_for, flags, OpenFile, StorageError, StripedView};
use cargo_transport::WorkerEndpoint;

use super::OpState;

/// Copies a file block by block: one `pread` from the source, one `pwrite`
/// to the target per step, with the same striping and throttling as the
/// collective paths. A worker that owns no blocks of the file completes
/// without doing any work.
pub struct SequentialTransfer {
    input_path: String,
    input_kind: DatasetKind,
    output_path: String,
    output_kind: DatasetKind,
    block_size: u64,
    view: Option<StripedView>,
    block: Vec<u8>,
    input: Option<OpenFile>,
    output: Option<OpenFile>,
    state: OpState,
}

impl SequentialTransfer {
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
            block: Vec::new(),
            input: None,
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
                error!(input = %self.input_path, error = %e, "sequential setup failed");
                self.state.status = ErrorCode::from(&e);
            }
        }
        self.state.status
    }

    fn do_setup(&mut self, endpoint: &WorkerEndpoint) -> Result<(), StorageError> {
        let input_backend = backend_for(self.input_kind);
        let file_size = input_backend.size(&self.input_path)?;

        self.view = Some(StripedView::new(
            file_size,
            self.block_size,
            endpoint.size() as u64,
            endpoint.rank() as u64,
        ));
        self.block = vec![0u8; self.block_size as usize];
        self.input = Some(OpenFile::open(
            input_backend,
            &self.input_path,
            flags::RDONLY,
            0,
        )?);
        self.output = Some(OpenFile::open(
            backend_for(self.output_kind),
            &self.output_path,
            flags::WRONLY | flags::CREAT,
            0o644,
        )?);
        Ok(())
    }

    pub fn progress(&mut self, ongoing_index: i32) -> i32 {
        let (view, input, output) = match (&self.view, &self.input, &self.output) {
            (Some(v), Some(i), Some(o)) => (*v, i, o),
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

        let begin = Instant::now();
        let read = input.pread(&mut self.block[..range.len as usize], range.offset);
        let step = read.and_then(|_| output.pwrite(&self.block[..range.len as usize], range.offset));
        if let Err(e) = step {
            error!(
                input = %self.input_path,
                output = %self.output_path,
                error = %e,
                "sequential block step failed"
            );
            self.state.status = ErrorCode::from(&e);
            return -1;
        }
        self.state.update_bw(self.block_size, begin.elapsed());
        debug!(
            input = %self.input_path,
            index = ongoing_index,
            bw = self.state.bw,
            sleep_ms = self.state.sleep_value().as_millis() as u64,
            "block copied"
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
