//! Cargo transport layer: framed TCP RPC plus the cohort control plane.
//!
//! The RPC side carries client ⇄ coordinator calls as binary frames with a
//! fixed header and a bincode payload. The cohort side carries coordinator ⇄
//! worker control messages (transfer dispatch, bandwidth shaping, status
//! reports, shutdown) and provides the barrier used by collective
//! operations. Both sides are abstract about the medium: the frame codec
//! runs over any byte stream and the cohort ships with an in-process
//! channel implementation.

pub mod addr;
pub mod cohort;
pub mod error;
pub mod message;
pub mod protocol;
pub mod rpc;
pub mod tcp;

pub use addr::split_address;
pub use cohort::{in_proc_cohort, CohortController, WorkerEndpoint};
pub use error::{Result, TransportError};
pub use message::{
    ControlMessage, ShaperMessage, StatusMessage, Tag, TransferKind, TransferMessage,
};
pub use protocol::{Frame, FrameFlags, FrameHeader, Opcode};
pub use rpc::{RpcClient, RpcClientConfig, RpcHandler, RpcServer};
pub use tcp::TcpConnection;
