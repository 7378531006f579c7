//! The polymorphic byte-level storage interface.

use std::time::SystemTime;

use crate::error::Result;

/// Open-flag constants accepted by [`StorageBackend::open`].
///
/// The values mirror the host's `O_*` space so backends that wrap the OS can
/// pass them through unchanged.
pub mod flags {
    pub const RDONLY: i32 = libc::O_RDONLY;
    pub const WRONLY: i32 = libc::O_WRONLY;
    pub const RDWR: i32 = libc::O_RDWR;
    pub const CREAT: i32 = libc::O_CREAT;
    pub const TRUNC: i32 = libc::O_TRUNC;
    pub const ACCMODE: i32 = libc::O_ACCMODE;
}

/// Subset of file metadata the staging engine needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub size: u64,
    pub is_dir: bool,
    pub mtime: SystemTime,
}

/// Uniform byte-level access to one storage system.
///
/// All paths are absolute; offsets and counts are 64-bit. Implementations
/// must be safe for concurrent `pread`/`pwrite` from the same process, and
/// `pread`/`pwrite` must loop internally until the full count is transferred
/// or a terminal error occurs, retrying `EINTR` transparently.
pub trait StorageBackend: Send + Sync {
    /// Short name of the backend, for logging.
    fn name(&self) -> &str;

    /// Opens `path` and returns a non-negative descriptor scoped to this
    /// backend instance.
    fn open(&self, path: &str, flags: i32, mode: u32) -> Result<i32>;

    /// Closes a descriptor returned by [`StorageBackend::open`].
    fn close(&self, fd: i32) -> Result<()>;

    /// Reads up to `buf.len()` bytes at `offset`. Returns the byte count;
    /// 0 means end of file.
    fn pread(&self, fd: i32, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Writes `buf` at `offset`. Returns the byte count written.
    fn pwrite(&self, fd: i32, buf: &[u8], offset: u64) -> Result<usize>;

    /// Creates a directory. A pre-existing directory is not an error.
    fn mkdir(&self, path: &str, mode: u32) -> Result<()>;

    /// Recursively enumerates the regular files below `path`.
    fn readdir(&self, path: &str) -> Result<Vec<String>>;

    /// Stats a path.
    fn stat(&self, path: &str) -> Result<Metadata>;

    /// Removes a file.
    fn unlink(&self, path: &str) -> Result<()>;

    /// Reserves space for `[offset, offset + len)`. May be a no-op for
    /// backends where space reservation is implicit.
    fn fallocate(&self, fd: i32, mode: i32, offset: u64, len: u64) -> Result<()>;

    /// Size of the file at `path`, in bytes.
    fn size(&self, path: &str) -> Result<u64> {
        Ok(self.stat(path)?.size)
    }
}
