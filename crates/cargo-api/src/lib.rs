//! Shared vocabulary for the Cargo data-staging service.
//!
//! This crate defines the types every other Cargo crate speaks: datasets and
//! their backend kinds, transfer states, the categorized wire-level error
//! code, and the serde payloads of the coordinator's RPC surface.

pub mod dataset;
pub mod error;
pub mod proto;
pub mod state;

pub use dataset::{Dataset, DatasetKind, ParseKindError};
pub use error::{ErrorCategory, ErrorCode};
pub use state::TransferState;

/// Monotonic 64-bit transfer identifier, allocated by the coordinator and
/// never reused within its lifetime.
pub type TransferId = u64;
