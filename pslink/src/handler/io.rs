//! Integer send/receive, acknowledgments, and input polling.

use {
    super::{Handler, burst::Sink},
    crate::{
        ack::Ack,
        codec::{self, Width},
        config::ReadPolicy,
        error::{Error, Result},
        port::{Connector, Port},
    },
    log::{error, trace},
    std::{
        thread,
        time::{Duration, Instant},
    },
};

/// Interval between input buffer checks in [`Handler::wait_for_data`].
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Largest field [`Handler::receive`] decodes; the result must fit in an `i128`
/// next to the `-1` sentinel.
pub const MAX_RECEIVE_SIZE: usize = 15;

/// Something to send: raw bytes, or an integer to pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    /// Sent verbatim.
    Bytes(&'a [u8]),
    /// Packed little-endian; must be within `0..=u32::MAX`.
    Int(i64),
}

impl Value<'_> {
    /// Wire bytes for this value.
    ///
    /// `size` applies to integers only; without it the smallest of 1, 2, or
    /// 4 bytes that holds the value is used.
    pub fn encode(self, size: Option<usize>) -> Result<Vec<u8>> {
        match (self, size) {
            (Self::Bytes(bytes), _) => Ok(bytes.to_vec()),
            (Self::Int(value), size) => {
                let value = u32::try_from(value).map_err(|_| Error::IntOutOfRange(value))?;
                match size {
                    Some(width) => codec::pack(value, width),
                    None => codec::pack_auto(value),
                }
            },
        }
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::Bytes(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Value<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Self::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for Value<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<u8> for Value<'_> {
    fn from(value: u8) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u16> for Value<'_> {
    fn from(value: u16) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value<'_> {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

/// Lets unsuffixed literals through; negative values fail at encode time.
impl From<i32> for Value<'_> {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl<C: Connector> Handler<C> {
    /// Send a value to the device.
    ///
    /// In burst mode the bytes are queued instead of written.
    pub fn send<'a>(&mut self, value: impl Into<Value<'a>>, size: Option<usize>) -> Result<()> {
        let packet = value.into().encode(size)?;
        self.transmit(&packet)
    }

    /// Send one byte.
    pub fn send_byte(&mut self, value: u8) -> Result<()> {
        self.send(value, Some(Width::Byte.bytes()))
    }

    /// Send a two-byte integer.
    pub fn send_int(&mut self, value: u16) -> Result<()> {
        self.send(value, Some(Width::Short.bytes()))
    }

    /// Read and decode a `size`-byte little-endian unsigned integer.
    ///
    /// Sizes 1, 2 and 4 go through the fixed-width codec; any other size up to
    /// [`MAX_RECEIVE_SIZE`] is decoded as a plain little-endian integer of that
    /// length. A size of 0 reads nothing and returns 0.
    ///
    /// If fewer than `size` bytes arrive before the timeout, returns `-1`
    /// under [`ReadPolicy::Lenient`] and [`Error::ShortRead`] under
    /// [`ReadPolicy::Strict`].
    #[allow(clippy::cast_possible_wrap)]
    pub fn receive(&mut self, size: usize) -> Result<i128> {
        if size > MAX_RECEIVE_SIZE {
            return Err(Error::InvalidWidth(size));
        }

        let received = self.port_mut()?.read_up_to(size)?;
        trace!("Received {received:02X?}");

        if received.len() != size {
            self.short_read(size, received.len())?;
            return Ok(-1);
        }

        let value = match size {
            1 | 2 | 4 => u128::from(codec::unpack(&received, size)?),
            _ => codec::unpack_le(&received)?,
        };
        // At most 120 bits, never wraps.
        Ok(value as i128)
    }

    /// Read one byte; `-1` on short read.
    pub fn get_byte(&mut self) -> Result<i128> {
        self.receive(Width::Byte.bytes())
    }

    /// Read a two-byte integer; `-1` on short read.
    pub fn get_int(&mut self) -> Result<i128> {
        self.receive(Width::Short.bytes())
    }

    /// Read a four-byte integer; `-1` on short read.
    pub fn get_long(&mut self) -> Result<i128> {
        self.receive(Width::Word.bytes())
    }

    /// Read the status byte that follows every command.
    ///
    /// In burst mode nothing is read: the acknowledgment is counted, collected
    /// by [`Handler::send_burst`], and `Success` is returned.
    ///
    /// Under [`ReadPolicy::Lenient`] a missing byte or a read error yields
    /// [`Ack::Failed`], which is indistinguishable from the device reporting
    /// failure.
    pub fn get_ack(&mut self) -> Result<Ack> {
        if let Sink::Burst(buffer) = &mut self.sink {
            buffer.pending_acks += 1;
            return Ok(Ack::Success);
        }

        let strict = self.settings.read_policy == ReadPolicy::Strict;
        let response = match self.port_mut()?.read_up_to(1) {
            Ok(response) => response,
            Err(e) if !strict => {
                error!("Failed to read acknowledgment: {e}");
                return Ok(Ack::Failed);
            },
            Err(e) => return Err(e),
        };

        match response.first() {
            Some(&byte) => {
                trace!("Ack {byte:#04x}");
                Ok(Ack::from_byte(byte))
            },
            None => {
                self.short_read(1, 0)?;
                Ok(Ack::Failed)
            },
        }
    }

    /// Wait until at least `numbytes` bytes are buffered or `timeout` passes.
    ///
    /// Returns the number of bytes buffered at the end, which may be fewer
    /// than requested.
    pub fn wait_for_data(&mut self, numbytes: usize, timeout: Duration) -> Result<usize> {
        let port = self.port_mut()?;
        let start = Instant::now();

        while start.elapsed() < timeout {
            if port.bytes_available()? >= numbytes {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        port.bytes_available()
    }

    /// Write bytes to the port, or queue them in burst mode.
    pub(super) fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        if let Sink::Burst(buffer) = &mut self.sink {
            buffer.data.extend_from_slice(bytes);
            return Ok(());
        }

        let port = self.port_mut()?;
        trace!("Sending {bytes:02X?}");
        port.write_all_bytes(bytes)
    }
}
