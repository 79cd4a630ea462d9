//! Flash memory access.
//!
//! The device's flash is split into pages of 2 KiB. A page holds 64 slots of
//! 16 bytes for slot access, or is addressed from its start for bulk access:
//!
//! ```text
//! page p:  +---------+---------+-----+----------+
//!          | slot 0  | slot 1  | ... | slot 63  |   16 bytes each
//!          +---------+---------+-----+----------+
//!          |<-------------- 2048 bytes -------->|
//! ```
//!
//! Bulk transfers move whole 16-bit words, so odd lengths are padded by one
//! byte on the wire.
//!
//! Writes are destructive and unguarded. Some pages hold factory calibration
//! data; overwriting them requires recalibrating the device.

use {
    super::Handler,
    crate::{
        ack::Ack,
        error::{Error, Result},
        port::{Connector, Port},
    },
    log::{debug, trace, warn},
    std::time::Duration,
};

/// Bytes per flash page.
pub const PAGE_SIZE: usize = 2048;

/// Number of flash pages.
pub const PAGE_COUNT: u8 = 20;

/// Bytes per slot.
pub const SLOT_SIZE: usize = 16;

/// Slots per page.
pub const SLOTS_PER_PAGE: u8 = 64;

/// Byte used to pad short slot writes.
pub const SLOT_FILLER: u8 = b'.';

/// How long to wait for the device to commit a slot write.
const SLOT_COMMIT_TIMEOUT: Duration = Duration::from_millis(200);

/// Data read from flash together with the acknowledgment that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashRead {
    /// Bytes read.
    pub data: Vec<u8>,
    /// Acknowledgment for the read command; the data is only meaningful if
    /// this is [`Ack::Success`].
    pub ack: Ack,
}

impl<C: Connector> Handler<C> {
    /// Read the 16-byte slot at `location` (0-63) of `page`.
    pub fn read_slot(&mut self, page: u8, location: u8) -> Result<FlashRead> {
        check_location(location)?;
        self.ensure_direct()?;

        let op = self.settings.catalog.read_slot.clone();
        self.send_flash_command(&op)?;
        self.send_byte(page)?;
        self.send_byte(location)?;

        let data = self.read_exact_raw(SLOT_SIZE)?;
        let ack = self.get_ack()?;
        debug!("Read slot {location} of page {page} ({ack})");

        Ok(FlashRead { data, ack })
    }

    /// Read the first `numbytes` bytes of `page`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_bulk(&mut self, page: u8, numbytes: usize) -> Result<FlashRead> {
        check_bulk_len(numbytes)?;
        self.ensure_direct()?;

        let to_read = numbytes + numbytes % 2;
        let op = self.settings.catalog.read_bulk.clone();
        self.send_flash_command(&op)?;
        // Bounded by PAGE_SIZE above.
        self.send_int(to_read as u16)?;
        self.send_byte(page)?;

        let mut data = self.read_exact_raw(to_read)?;
        let ack = self.get_ack()?;
        debug!("Read {to_read} bytes from page {page} ({ack})");
        trace!("Page {page}: {data:02X?}");

        data.truncate(numbytes);
        Ok(FlashRead { data, ack })
    }

    /// Write up to 16 bytes to slot `location` (0-63) of `page`.
    ///
    /// Shorter input is padded with [`SLOT_FILLER`]. Overwrites the slot.
    pub fn write_slot(&mut self, page: u8, location: u8, text: impl AsRef<[u8]>) -> Result<Ack> {
        let text = text.as_ref();
        check_location(location)?;
        if text.len() > SLOT_SIZE {
            return Err(Error::InvalidAddress(format!(
                "slot data is {} bytes, at most {SLOT_SIZE} fit",
                text.len()
            )));
        }
        self.ensure_direct()?;

        let mut padded = text.to_vec();
        padded.resize(SLOT_SIZE, SLOT_FILLER);

        let op = self.settings.catalog.write_slot.clone();
        self.send_flash_command(&op)?;
        self.send_byte(page)?;
        self.send_byte(location)?;
        self.send(&padded, None)?;

        self.wait_for_data(1, SLOT_COMMIT_TIMEOUT)?;
        let ack = self.get_ack()?;
        debug!("Wrote slot {location} of page {page} ({ack})");
        Ok(ack)
    }

    /// Write `data` to the start of `page`, then read it back and compare.
    ///
    /// Odd-length data is padded with one zero byte on the wire. Fails with
    /// [`Error::Verification`] if the read-back differs.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_bulk(&mut self, page: u8, data: impl AsRef<[u8]>) -> Result<Ack> {
        let data = data.as_ref();
        check_bulk_len(data.len())?;
        self.ensure_direct()?;

        let mut padded = data.to_vec();
        if padded.len() % 2 == 1 {
            padded.push(0);
        }
        debug!("Writing {} bytes to page {page}", padded.len());
        trace!("Page {page}: {padded:02X?}");

        let op = self.settings.catalog.write_bulk.clone();
        self.send_flash_command(&op)?;
        // Bounded by PAGE_SIZE above.
        self.send_int(padded.len() as u16)?;
        self.send_byte(page)?;
        self.send(&padded, None)?;
        let ack = self.get_ack()?;

        let readback = self.read_bulk(page, data.len())?;
        if !readback.ack.is_success() {
            warn!("Read-back of page {page} acknowledged with {}", readback.ack);
        }
        if let Some(offset) = first_mismatch(&readback.data, data) {
            return Err(Error::Verification { page, offset });
        }

        Ok(ack)
    }

    fn send_flash_command(&mut self, op: &[u8]) -> Result<()> {
        let select = self.settings.catalog.flash_select.clone();
        self.send(&select, None)?;
        self.send(op, None)
    }

    /// Read exactly `n` raw bytes; flash data has no sentinel, so a short
    /// read is always an error.
    fn read_exact_raw(&mut self, n: usize) -> Result<Vec<u8>> {
        let data = self.port_mut()?.read_up_to(n)?;
        if data.len() != n {
            return Err(Error::ShortRead {
                expected: n,
                actual: data.len(),
            });
        }
        Ok(data)
    }

    fn ensure_direct(&self) -> Result<()> {
        if self.sink.is_burst() {
            Err(Error::BurstActive)
        } else {
            Ok(())
        }
    }
}

fn check_location(location: u8) -> Result<()> {
    if location >= SLOTS_PER_PAGE {
        return Err(Error::InvalidAddress(format!(
            "slot {location} out of range 0-{}",
            SLOTS_PER_PAGE - 1
        )));
    }
    Ok(())
}

fn check_bulk_len(len: usize) -> Result<()> {
    if len > PAGE_SIZE {
        return Err(Error::InvalidAddress(format!(
            "{len} bytes exceed the {PAGE_SIZE}-byte page"
        )));
    }
    Ok(())
}

fn first_mismatch(actual: &[u8], expected: &[u8]) -> Option<usize> {
    actual
        .iter()
        .zip(expected)
        .position(|(a, e)| a != e)
        .or_else(|| (actual.len() != expected.len()).then_some(actual.len().min(expected.len())))
}
