//! POSIX storage backend.
//!
//! Also serves the ad-hoc and object-store kinds as a passthrough when no
//! vendor client library is linked in; the registry hands out one named
//! instance per kind.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::backend::{flags, Metadata, StorageBackend};
use crate::error::{Result, StorageError};

/// Backend for local POSIX filesystems.
///
/// Descriptors are backend-scoped handles into an internal table, not raw OS
/// fds; the table lock is only held to look a handle up, so concurrent
/// `pread`/`pwrite` on different (or the same) descriptor do not serialize
/// on each other.
pub struct PosixBackend {
    name: String,
    next_fd: AtomicI32,
    table: Mutex<HashMap<i32, Arc<File>>>,
}

impl PosixBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_fd: AtomicI32::new(0),
            table: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, fd: i32) -> Result<Arc<File>> {
        self.table
            .lock()
            .expect("descriptor table poisoned")
            .get(&fd)
            .cloned()
            .ok_or(StorageError::BadDescriptor(fd))
    }

    fn walk(dir: &Path, out: &mut Vec<String>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let ftype = entry.file_type()?;
            let path = entry.path();
            if ftype.is_dir() {
                Self::walk(&path, out)?;
            } else if ftype.is_file() {
                out.push(path.to_string_lossy().into_owned());
            }
        }
        Ok(())
    }
}

impl StorageBackend for PosixBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, path: &str, oflags: i32, mode: u32) -> Result<i32> {
        let access = oflags & flags::ACCMODE;
        let file = OpenOptions::new()
            .read(access == flags::RDONLY || access == flags::RDWR)
            .write(access == flags::WRONLY || access == flags::RDWR)
            .create(oflags & flags::CREAT != 0)
            .truncate(oflags & flags::TRUNC != 0)
            .mode(mode)
            .open(path)?;

        let fd = self.next_fd.fetch_add(1, Ordering::Relaxed);
        self.table
            .lock()
            .expect("descriptor table poisoned")
            .insert(fd, Arc::new(file));
        trace!(backend = %self.name, path, fd, "open");
        Ok(fd)
    }

    fn close(&self, fd: i32) -> Result<()> {
        self.table
            .lock()
            .expect("descriptor table poisoned")
            .remove(&fd)
            .map(|_| ())
            .ok_or(StorageError::BadDescriptor(fd))
    }

    fn pread(&self, fd: i32, buf: &mut [u8], offset: u64) -> Result<usize> {
        let file = self.lookup(fd)?;

        let mut bytes_read = 0usize;
        while bytes_read < buf.len() {
            match file.read_at(&mut buf[bytes_read..], offset + bytes_read as u64) {
                // EOF
                Ok(0) => break,
                Ok(n) => bytes_read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(bytes_read)
    }

    fn pwrite(&self, fd: i32, buf: &[u8], offset: u64) -> Result<usize> {
        let file = self.lookup(fd)?;

        let mut bytes_written = 0usize;
        while bytes_written < buf.len() {
            match file.write_at(&buf[bytes_written..], offset + bytes_written as u64) {
                Ok(0) => {
                    return Err(StorageError::Io(std::io::Error::new(
                        ErrorKind::WriteZero,
                        "pwrite returned 0",
                    )))
                }
                Ok(n) => bytes_written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(bytes_written)
    }

    fn mkdir(&self, path: &str, _mode: u32) -> Result<()> {
        match std::fs::create_dir(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && Path::new(path).is_dir() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let root = Path::new(path);
        if !root.is_dir() {
            return Err(StorageError::NotADirectory(path.to_string()));
        }
        let mut files = Vec::new();
        Self::walk(root, &mut files)?;
        // Deterministic order keeps seqno assignment stable across runs.
        files.sort();
        Ok(files)
    }

    fn stat(&self, path: &str) -> Result<Metadata> {
        let md = std::fs::metadata(path)?;
        Ok(Metadata {
            size: md.len(),
            is_dir: md.is_dir(),
            mtime: md.modified()?,
        })
    }

    fn unlink(&self, path: &str) -> Result<()> {
        std::fs::remove_file(path)?;
        Ok(())
    }

    fn fallocate(&self, fd: i32, mode: i32, offset: u64, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let file = self.lookup(fd)?;
        let ret = unsafe {
            libc::fallocate(
                file.as_raw_fd(),
                mode,
                offset as libc::off_t,
                len as libc::off_t,
            )
        };
        if ret == -1 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }
}
