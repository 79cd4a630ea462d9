//! Command byte sequences used by the link layer.
//!
//! The link layer never interprets these bytes; it only writes them in the
//! right order. Keeping them in a table lets callers target a different
//! firmware revision through configuration instead of code changes.

use serde::{Deserialize, Serialize};

/// Table of opaque command sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCatalog {
    /// Sequence that makes the device print its version line.
    pub version_query: Vec<u8>,
    /// Selects the flash subsystem.
    pub flash_select: Vec<u8>,
    /// Reads one 16-byte slot.
    pub read_slot: Vec<u8>,
    /// Reads a run of bytes from the start of a page.
    pub read_bulk: Vec<u8>,
    /// Writes one 16-byte slot.
    pub write_slot: Vec<u8>,
    /// Writes a run of bytes to the start of a page.
    pub write_bulk: Vec<u8>,
}

impl CommandCatalog {
    /// Sequences understood by PSLab v5/v6 firmware.
    pub fn pslab() -> Self {
        // COMMON, GET_VERSION
        const VERSION_QUERY: [u8; 2] = [0x0B, 0x05];

        Self {
            version_query: VERSION_QUERY.to_vec(),
            flash_select: vec![0x02],
            read_slot: vec![0x04],
            read_bulk: vec![0x05],
            write_slot: vec![0x01],
            write_bulk: vec![0x02],
        }
    }
}

impl Default for CommandCatalog {
    fn default() -> Self {
        Self::pslab()
    }
}
