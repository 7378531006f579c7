use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid address {0:?}: expected PROTOCOL://host[:port]")]
    InvalidAddress(String),

    #[error("invalid magic number: expected 0x{expected:08X}, got 0x{got:08X}")]
    InvalidMagic { expected: u32, got: u32 },

    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u8, got: u8 },

    #[error("unknown opcode: 0x{0:04X}")]
    UnknownOpcode(u16),

    #[error("payload too large: {size} bytes (max {max_size})")]
    PayloadTooLarge { size: u32, max_size: u32 },

    #[error("request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout { request_id: u64, timeout_ms: u64 },

    #[error("connection reset by peer")]
    ConnectionReset,

    #[error("cohort endpoint closed")]
    CohortClosed,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
