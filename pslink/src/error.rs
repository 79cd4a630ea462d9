//! Error types for pslink.

use std::io;
use thiserror::Error;

/// Result type for pslink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pslink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port could not be opened or configured.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No endpoint answered the version query with a recognized marker.
    #[error("Device not found")]
    DeviceNotFound,

    /// The transport is not open.
    #[error("Not connected")]
    NotConnected,

    /// A read returned fewer bytes than requested.
    #[error("Short read: requested {expected} bytes, got {actual}")]
    ShortRead {
        /// Number of bytes requested.
        expected: usize,
        /// Number of bytes received before the timeout.
        actual: usize,
    },

    /// Flash read-back did not match the data that was written.
    #[error("Verification by readback failed on page {page} at offset {offset}")]
    Verification {
        /// Flash page that was written.
        page: u8,
        /// Offset of the first differing byte.
        offset: usize,
    },

    /// Unsupported integer width.
    #[error("Invalid width: {0} bytes")]
    InvalidWidth(usize),

    /// Value does not fit into the requested width.
    #[error("Value {value:#x} does not fit in {width} byte(s)")]
    ValueTooLarge {
        /// Value that was to be packed.
        value: u32,
        /// Requested width in bytes.
        width: usize,
    },

    /// Integer outside the unsigned 32-bit range of the wire codec.
    #[error("Integer {0} cannot be sent as an unsigned 32-bit value")]
    IntOutOfRange(i64),

    /// Slice length differs from the width being unpacked.
    #[error("Length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        actual: usize,
    },

    /// Flash address or payload length out of range.
    #[error("Invalid flash address: {0}")]
    InvalidAddress(String),

    /// Operation needs an immediate read but burst mode is on.
    #[error("Operation not allowed while burst mode is active")]
    BurstActive,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
