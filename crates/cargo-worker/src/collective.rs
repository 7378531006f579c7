//! Cohort-collective read and write primitives.
//!
//! Both primitives bracket their I/O with the cohort barrier, which gives
//! every collective call the same total order on all workers. A worker that
//! fails mid-collective still joins the closing barrier so its peers are
//! never stranded.

use std::sync::Arc;

use cargo_storage::{flags, OpenFile, Result, StorageBackend, StripedView};
use cargo_transport::WorkerEndpoint;

/// Collectively reads this worker's striped blocks of `path` into `buf`.
///
/// `buf` must hold `owned_blocks × block_size` bytes; block `i` of the view
/// lands at `buf[i × block_size ..]`.
pub fn collective_read(
    endpoint: &WorkerEndpoint,
    backend: Arc<dyn StorageBackend>,
    path: &str,
    view: &StripedView,
    block_size: u64,
    buf: &mut [u8],
) -> Result<()> {
    endpoint.barrier();
    let result = (|| {
        let file = OpenFile::open(backend, path, flags::RDONLY, 0)?;
        for (i, range) in view.iter().enumerate() {
            let start = i as u64 * block_size;
            let slice = &mut buf[start as usize..(start + range.len) as usize];
            file.pread(slice, range.offset)?;
        }
        Ok(())
    })();
    endpoint.barrier();
    result
}

/// Collectively writes this worker's striped blocks of `buf` to `path`.
pub fn collective_write(
    endpoint: &WorkerEndpoint,
    backend: Arc<dyn StorageBackend>,
    path: &str,
    view: &StripedView,
    block_size: u64,
    buf: &[u8],
) -> Result<()> {
    endpoint.barrier();
    let result = (|| {
        let file = OpenFile::open(backend, path, flags::WRONLY | flags::CREAT, 0o644)?;
        for (i, range) in view.iter().enumerate() {
            let start = i as u64 * block_size;
            let slice = &buf[start as usize..(start + range.len) as usize];
            file.pwrite(slice, range.offset)?;
        }
        Ok(())
    })();
    endpoint.barrier();
    result
}
