//! The Cargo coordinator.
//!
//! The coordinator owns the control RPC surface, expands transfer requests
//! into per-file dispatches for the worker cohort, tracks their progress in
//! the request manager, and runs two auxiliary cooperative tasks: the
//! status listener that applies worker reports, and the FTIO scheduler that
//! defers staging until a period elapses or a run trigger arrives.

pub mod config;
pub mod coordinator;
pub mod expansion;
pub mod ftio;
pub mod handlers;
pub mod request_manager;

pub use config::CargoConfig;
pub use coordinator::Coordinator;
pub use request_manager::{ParallelRequest, PartStatus, RequestManager};
