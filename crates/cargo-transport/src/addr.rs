//! Server address parsing.

use crate::error::{Result, TransportError};

/// Splits `PROTOCOL://host[:port]` into `(protocol, host_and_port)`.
///
/// The split happens on the first `://`; the protocol token is whatever the
/// configured transport accepts. An address without `://` is invalid.
pub fn split_address(address: &str) -> Result<(&str, &str)> {
    match address.split_once("://") {
        Some((protocol, rest)) if !protocol.is_empty() && !rest.is_empty() => {
            Ok((protocol, rest))
        }
        _ => Err(TransportError::InvalidAddress(address.to_string())),
    }
}
