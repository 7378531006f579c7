//! RAII wrapper tying a backend descriptor to its backend.

use std::sync::Arc;

use crate::backend::StorageBackend;
use crate::error::Result;

/// An open file on some backend; the descriptor is released on drop.
pub struct OpenFile {
    backend: Arc<dyn StorageBackend>,
    fd: i32,
    path: String,
}

impl OpenFile {
    /// Opens `path` on `backend`.
    pub fn open(
        backend: Arc<dyn StorageBackend>,
        path: &str,
        flags: i32,
        mode: u32,
    ) -> Result<Self> {
        let fd = backend.open(path, flags, mode)?;
        Ok(Self {
            backend,
            fd,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn pread(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.backend.pread(self.fd, buf, offset)
    }

    pub fn pwrite(&self, buf: &[u8], offset: u64) -> Result<usize> {
        self.backend.pwrite(self.fd, buf, offset)
    }

    pub fn fallocate(&self, mode: i32, offset: u64, len: u64) -> Result<()> {
        self.backend.fallocate(self.fd, mode, offset, len)
    }
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        let _ = self.backend.close(self.fd);
    }
}
