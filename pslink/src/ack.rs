//! Acknowledgment codes returned by the device after each command.

use std::fmt;

/// Status byte the device sends after processing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Command executed (1).
    Success,
    /// Command rejected its arguments (2).
    ArgumentError,
    /// Command failed, or no status byte arrived before the timeout (3).
    Failed,
    /// Any other status byte.
    Unknown(u8),
}

impl Ack {
    /// Wire value for [`Ack::Success`].
    pub const SUCCESS: u8 = 1;
    /// Wire value for [`Ack::ArgumentError`].
    pub const ARGUMENT_ERROR: u8 = 2;
    /// Wire value for [`Ack::Failed`].
    pub const FAILED: u8 = 3;

    /// Decode a status byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            Self::SUCCESS => Self::Success,
            Self::ARGUMENT_ERROR => Self::ArgumentError,
            Self::FAILED => Self::Failed,
            other => Self::Unknown(other),
        }
    }

    /// Encode back to the status byte.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Success => Self::SUCCESS,
            Self::ArgumentError => Self::ARGUMENT_ERROR,
            Self::Failed => Self::FAILED,
            Self::Unknown(b) => b,
        }
    }

    /// Check if the command succeeded.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<u8> for Ack {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("SUCCESS"),
            Self::ArgumentError => f.write_str("ARGUMENT_ERROR"),
            Self::Failed => f.write_str("FAILED"),
            Self::Unknown(b) => write!(f, "UNKNOWN({b:#04x})"),
        }
    }
}
