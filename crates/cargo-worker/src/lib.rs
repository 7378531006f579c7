//! The Cargo worker runtime.
//!
//! A worker is one member of the staging cohort. It drains its control
//! inbox, keeps a table of in-flight transfer operations, advances them
//! round-robin one block at a time, and reports progress and outcomes back
//! to the coordinator. The three operation kinds (collective read,
//! collective write, sequential) live in [`ops`]; the collective read/write
//! primitives they share live in [`collective`].

pub mod collective;
pub mod ops;
pub mod runtime;

pub use ops::Operation;
pub use runtime::Worker;
