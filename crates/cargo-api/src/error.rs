//! Categorized error codes shared between clients, coordinator and workers.

use serde::{Deserialize, Serialize};

/// The three error namespaces Cargo reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Cargo-defined protocol errors.
    Generic,
    /// Operating-system errors; the value mirrors the syscall errno.
    System,
    /// Errors from the collective transport; the value mirrors its native
    /// error space.
    Transport,
}

/// A `(category, value)` error code with a stable name.
///
/// Equality is structural on both fields, so a system `EIO` never compares
/// equal to a transport error that happens to share the numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode {
    category: ErrorCategory,
    value: u32,
}

impl ErrorCode {
    /// Operation finished without error.
    pub const SUCCESS: ErrorCode = ErrorCode::generic(0);
    /// Internal invariant violation.
    pub const SNAFU: ErrorCode = ErrorCode::generic(1);
    /// Requested operation is not implemented.
    pub const NOT_IMPLEMENTED: ErrorCode = ErrorCode::generic(2);
    /// The transfer id is unknown to the coordinator.
    pub const NO_SUCH_TRANSFER: ErrorCode = ErrorCode::generic(3);
    /// The transfer has not reached a terminal state yet.
    pub const TRANSFER_IN_PROGRESS: ErrorCode = ErrorCode::generic(4);
    /// Any failure that does not fit another generic value.
    pub const OTHER: ErrorCode = ErrorCode::generic(5);

    const fn generic(value: u32) -> Self {
        Self {
            category: ErrorCategory::Generic,
            value,
        }
    }

    /// An error in the OS errno space.
    pub const fn system(errno: u32) -> Self {
        Self {
            category: ErrorCategory::System,
            value: errno,
        }
    }

    /// An error in the collective transport's native space.
    pub const fn transport(value: u32) -> Self {
        Self {
            category: ErrorCategory::Transport,
            value,
        }
    }

    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Whether this code means success.
    pub const fn is_ok(&self) -> bool {
        matches!(self.category, ErrorCategory::Generic) && self.value == 0
    }

    /// Stable name suitable for logging.
    pub const fn name(&self) -> &'static str {
        match self.category {
            ErrorCategory::System => return "CARGO_SYSTEM_ERROR",
            ErrorCategory::Transport => return "CARGO_TRANSPORT_ERROR",
            ErrorCategory::Generic => {}
        }

        match self.value {
            0 => "CARGO_SUCCESS",
            1 => "CARGO_SNAFU",
            2 => "CARGO_NOT_IMPLEMENTED",
            3 => "CARGO_NO_SUCH_TRANSFER",
            4 => "CARGO_TRANSFER_IN_PROGRESS",
            5 => "CARGO_OTHER",
            _ => "CARGO_UNKNOWN_ERROR",
        }
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.category {
            ErrorCategory::Generic => write!(f, "{}", self.name()),
            _ => write!(f, "{}({})", self.name(), self.value),
        }
    }
}

impl From<std::io::Error> for ErrorCode {
    fn from(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(errno) => ErrorCode::system(errno as u32),
            None => ErrorCode::OTHER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_names_are_stable() {
        assert_eq!(ErrorCode::SUCCESS.name(), "CARGO_SUCCESS");
        assert_eq!(ErrorCode::SNAFU.name(), "CARGO_SNAFU");
        assert_eq!(ErrorCode::NOT_IMPLEMENTED.name(), "CARGO_NOT_IMPLEMENTED");
        assert_eq!(ErrorCode::NO_SUCH_TRANSFER.name(), "CARGO_NO_SUCH_TRANSFER");
        assert_eq!(
            ErrorCode::TRANSFER_IN_PROGRESS.name(),
            "CARGO_TRANSFER_IN_PROGRESS"
        );
        assert_eq!(ErrorCode::OTHER.name(), "CARGO_OTHER");
    }

    #[test]
    fn equality_is_structural_on_both_fields() {
        assert_eq!(ErrorCode::system(5), ErrorCode::system(5));
        assert_ne!(ErrorCode::system(5), ErrorCode::transport(5));
        assert_ne!(ErrorCode::system(5), ErrorCode::generic(5));
    }

    #[test]
    fn success_is_ok_and_nothing_else_is() {
        assert!(ErrorCode::SUCCESS.is_ok());
        assert!(!ErrorCode::SNAFU.is_ok());
        assert!(!ErrorCode::system(0).is_ok());
    }

    #[test]
    fn io_error_maps_to_errno() {
        // ENOENT
        let err = std::io::Error::from_raw_os_error(2);
        assert_eq!(ErrorCode::from(err), ErrorCode::system(2));

        let err = std::io::Error::new(std::io::ErrorKind::Other, "no errno");
        assert_eq!(ErrorCode::from(err), ErrorCode::OTHER);
    }

    #[test]
    fn display_includes_value_for_system_errors() {
        assert_eq!(ErrorCode::system(13).to_string(), "CARGO_SYSTEM_ERROR(13)");
        assert_eq!(ErrorCode::SUCCESS.to_string(), "CARGO_SUCCESS");
    }

    #[test]
    fn serde_round_trip() {
        let ec = ErrorCode::transport(17);
        let bytes = bincode::serialize(&ec).unwrap();
        let back: ErrorCode = bincode::deserialize(&bytes).unwrap();
        assert_eq!(ec, back);
    }
}
