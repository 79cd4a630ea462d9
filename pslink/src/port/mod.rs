//! Port abstraction for the byte channel to the device.
//!
//! The link layer is written against the [`Port`] and [`Connector`] traits so
//! the protocol logic stays I/O-agnostic:
//!
//! ```text
//! +--------------------------+
//! |  Handler (link layer)    |
//! |  codec / ack / burst /   |
//! |  flash                   |
//! +------------+-------------+
//!              |
//!              v
//! +------------+-------------+
//! |  Connector + Port traits |
//! +------------+-------------+
//!              |
//!              v
//! +------------+-------------+
//! |  NativePort (serialport) |
//! +--------------------------+
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use pslink::port::Port;
//!
//! fn probe<P: Port>(port: &mut P) -> pslink::Result<Vec<u8>> {
//!     port.write_all_bytes(&[0x0B, 0x05])?;
//!     port.read_line(256)
//! }
//! ```

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use crate::error::Result;

/// Default baud rate of the PSLab USB-UART link.
pub const DEFAULT_BAUD: u32 = 1_000_000;

/// Default read/write timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Parameters for opening one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyACM0", "COM5").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read/write timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Endpoint information reported by enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// Check if the endpoint reports the given USB VID/PID.
    pub fn matches(&self, vid: u16, pid: u16) -> bool {
        self.vid == Some(vid) && self.pid == Some(pid)
    }
}

/// An open, bidirectional byte channel with a read timeout.
///
/// Reads that hit the timeout return what arrived so far instead of failing;
/// callers compare the returned length against what they asked for.
pub trait Port: Read + Write + Send {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Get the read timeout.
    fn timeout(&self) -> Duration;

    /// Number of bytes waiting in the input buffer.
    fn bytes_available(&self) -> Result<usize>;

    /// Check whether the port is still open.
    fn is_open(&self) -> bool;

    /// Close the port and release resources.
    ///
    /// Closing an already closed port is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        Write::write_all(self, buf)?;
        Write::flush(self)?;
        Ok(())
    }

    /// Read up to `n` bytes, stopping early when the timeout expires.
    fn read_up_to(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        let start = Instant::now();

        while filled < n {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(k) => {
                    filled += k;
                    if filled < n && start.elapsed() >= self.timeout() {
                        break;
                    }
                },
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) => return Err(e.into()),
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }

    /// Read one `\n`-terminated line, keeping the terminator.
    ///
    /// Stops early on timeout or after `max_len` bytes.
    fn read_line(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        while line.len() < max_len {
            match self.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                },
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) => return Err(e.into()),
            }
        }

        Ok(line)
    }
}

/// Opens ports and enumerates endpoints.
pub trait Connector {
    /// Port type produced by [`Connector::open`].
    type Port: Port;

    /// Open a port.
    fn open(&self, config: &SerialConfig) -> Result<Self::Port>;

    /// List all available endpoints in enumeration order.
    fn list_ports(&self) -> Result<Vec<PortInfo>>;

    /// Find endpoints matching the given VID/PID, in enumeration order.
    fn find_by_vid_pid(&self, vid: u16, pid: u16) -> Result<Vec<PortInfo>> {
        Ok(self
            .list_ports()?
            .into_iter()
            .filter(|p| p.matches(vid, pid))
            .collect())
    }
}

// Re-export the appropriate implementation based on features
#[cfg(feature = "native")]
pub use native::{NativeConnector, NativePort};
