//! Byte-level storage access for Cargo.
//!
//! One polymorphic interface ([`StorageBackend`]) lets the staging engine
//! treat POSIX filesystems, parallel filesystems, ad-hoc burst buffers and
//! object stores uniformly. Instances come from a process-wide registry
//! keyed by dataset kind, one shared instance per kind.
//!
//! The crate also provides the striped block view used to partition a file
//! round-robin across a worker cohort.

pub mod backend;
pub mod error;
pub mod file;
pub mod posix;
pub mod registry;
pub mod stripe;

pub use backend::{flags, Metadata, StorageBackend};
pub use error::{Result, StorageError};
pub use file::OpenFile;
pub use posix::PosixBackend;
pub use registry::backend_for;
pub use stripe::{FileRange, StripedView};
