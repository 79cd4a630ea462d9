//! Connection management for PSLab devices.
//!
//! [`Handler`] owns the open port and everything layered on it: the version
//! handshake, integer send/receive, acknowledgments, burst buffering, and
//! flash access.
//!
//! ## Generic Connector Support
//!
//! The handler is generic over a [`Connector`], which opens ports and lists
//! endpoints. With the `native` feature this is `NativeConnector`.
//!
//! ## Example
//!
//! ```rust,no_run
//! fn main() -> pslink::Result<()> {
//!     #[cfg(feature = "native")]
//!     {
//!         use pslink::{Handler, LinkSettings, NativeConnector};
//!
//!         // Autodetect the device by USB VID/PID
//!         let mut handler = Handler::open(NativeConnector, LinkSettings::default())?;
//!         println!("Connected to {}", handler.version());
//!
//!         let data = handler.read_bulk(3, 16)?;
//!         println!("Page 3: {:?} ({})", data.data, data.ack);
//!
//!         handler.disconnect()?;
//!     }
//!     Ok(())
//! }
//! ```

mod burst;
mod flash;
mod io;

pub use flash::{FlashRead, PAGE_COUNT, PAGE_SIZE, SLOT_FILLER, SLOT_SIZE, SLOTS_PER_PAGE};
pub use io::Value;

use {
    crate::{
        catalog::CommandCatalog,
        config::{LinkSettings, ReadPolicy},
        error::{Error, Result},
        port::{Connector, Port, PortInfo},
    },
    burst::Sink,
    log::{debug, error, info, trace, warn},
    std::time::Duration,
};

/// Maximum length of the version line.
pub const MAX_VERSION_LEN: usize = 256;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No port is open.
    Disconnected,
    /// Probing endpoints.
    Connecting,
    /// Handshake succeeded; the port is open.
    Connected,
}

/// Link to one PSLab device.
///
/// Dropping the handler closes the port.
pub struct Handler<C: Connector> {
    connector: C,
    port: Option<C::Port>,
    settings: LinkSettings,
    state: ConnectionState,
    version: String,
    last_port: Option<String>,
    sink: Sink,
}

impl<C: Connector> Handler<C> {
    /// Create a disconnected handler.
    pub fn new(connector: C, settings: LinkSettings) -> Self {
        Self {
            connector,
            port: None,
            settings,
            state: ConnectionState::Disconnected,
            version: String::new(),
            last_port: None,
            sink: Sink::default(),
        }
    }

    /// Create a handler and connect with the given settings.
    pub fn open(connector: C, settings: LinkSettings) -> Result<Self> {
        let mut handler = Self::new(connector, settings);
        handler.establish()?;
        Ok(handler)
    }

    /// Connect to the device.
    ///
    /// With `port` set, only that endpoint is opened and queried. Without it,
    /// every endpoint matching the configured USB VID/PID is tried in
    /// enumeration order and the first one that identifies as a supported
    /// device is kept.
    ///
    /// Any existing connection is closed first.
    pub fn connect(&mut self, port: Option<&str>, baud_rate: u32, timeout: Duration) -> Result<()> {
        self.settings.port = port.map(str::to_string);
        self.settings.baud_rate = baud_rate;
        self.settings.timeout = timeout;
        self.establish()
    }

    /// Disconnect, then connect again.
    ///
    /// Unset parameters reuse the previous port, baud rate, and timeout.
    pub fn reconnect(
        &mut self,
        port: Option<&str>,
        baud_rate: Option<u32>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let port = port
            .map(str::to_string)
            .or_else(|| self.last_port.clone())
            .or_else(|| self.settings.port.clone());
        let baud_rate = baud_rate.unwrap_or(self.settings.baud_rate);
        let timeout = timeout.unwrap_or(self.settings.timeout);

        self.disconnect()?;
        self.connect(port.as_deref(), baud_rate, timeout)
    }

    /// Close the port. Calling this when already disconnected is a no-op.
    ///
    /// Pending burst data is discarded.
    pub fn disconnect(&mut self) -> Result<()> {
        self.version.clear();
        self.state = ConnectionState::Disconnected;
        self.sink.reset();

        if let Some(mut port) = self.port.take() {
            debug!("Disconnecting from {}", port.name());
            port.close()?;
        }
        Ok(())
    }

    /// Query the connected device for its version line.
    ///
    /// Unlike the connect handshake, the result is not checked against the
    /// accepted markers.
    pub fn get_version(&mut self) -> Result<String> {
        let catalog = &self.settings.catalog;
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        query_version(port, catalog)
    }

    /// List the endpoints autodetection would probe, in order.
    pub fn candidate_ports(&self) -> Result<Vec<PortInfo>> {
        let id = self.settings.usb_id;
        self.connector.find_by_vid_pid(id.vid, id.pid)
    }

    /// Version line reported at connect; empty when disconnected.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check whether the handler holds an open, verified connection.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.port.as_ref().is_some_and(Port::is_open)
    }

    /// Name of the connected port.
    pub fn port_name(&self) -> Option<&str> {
        self.port.as_ref().map(Port::name)
    }

    /// Current settings.
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Get a reference to the connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn establish(&mut self) -> Result<()> {
        self.disconnect()?;
        self.state = ConnectionState::Connecting;

        let found = match self.settings.port.clone() {
            Some(name) => self
                .probe(&name)
                .and_then(|found| found.ok_or(Error::DeviceNotFound)),
            None => self.autodetect(),
        };

        match found {
            Ok((port, version)) => {
                info!("Connected to {} on {}.", version, port.name());
                self.last_port = Some(port.name().to_string());
                self.port = Some(port);
                self.version = version;
                self.state = ConnectionState::Connected;
                Ok(())
            },
            Err(e) => {
                self.version.clear();
                self.state = ConnectionState::Disconnected;
                Err(e)
            },
        }
    }

    fn autodetect(&self) -> Result<(C::Port, String)> {
        let candidates = self.candidate_ports()?;
        if candidates.is_empty() {
            let id = self.settings.usb_id;
            warn!("No port with VID {:04X} PID {:04X} found", id.vid, id.pid);
            return Err(Error::DeviceNotFound);
        }

        for candidate in candidates {
            if let Some(found) = self.probe(&candidate.name)? {
                return Ok(found);
            }
        }

        Err(Error::DeviceNotFound)
    }

    /// Open one endpoint and run the handshake; the port is closed unless it
    /// identifies as a supported device.
    fn probe(&self, name: &str) -> Result<Option<(C::Port, String)>> {
        debug!("Probing {name}");
        let mut guard = PortGuard::new(self.connector.open(&self.settings.serial_config(name))?);
        let version = query_version(guard.get_mut()?, &self.settings.catalog)?;

        if self.settings.is_recognized(&version) {
            Ok(Some((guard.release()?, version)))
        } else {
            warn!("{name} answered {version:?}, not a supported device");
            Ok(None)
        }
    }

    fn port_mut(&mut self) -> Result<&mut C::Port> {
        self.port.as_mut().ok_or(Error::NotConnected)
    }

    /// Apply the read policy to a short read.
    fn short_read(&self, expected: usize, actual: usize) -> Result<()> {
        match self.settings.read_policy {
            ReadPolicy::Strict => Err(Error::ShortRead { expected, actual }),
            ReadPolicy::Lenient => {
                error!("Requested {expected} bytes, got {actual}.");
                Ok(())
            },
        }
    }
}

#[cfg(feature = "native")]
impl Handler<crate::port::NativeConnector> {
    /// Connect over a native serial port.
    pub fn native(settings: LinkSettings) -> Result<Self> {
        Self::open(crate::port::NativeConnector, settings)
    }
}

impl<C: Connector> Drop for Handler<C> {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            debug!("Error closing port on drop: {e}");
        }
    }
}

/// Closes the wrapped port on drop unless released.
struct PortGuard<P: Port> {
    port: Option<P>,
}

impl<P: Port> PortGuard<P> {
    fn new(port: P) -> Self {
        Self { port: Some(port) }
    }

    fn get_mut(&mut self) -> Result<&mut P> {
        self.port.as_mut().ok_or(Error::NotConnected)
    }

    fn release(mut self) -> Result<P> {
        self.port.take().ok_or(Error::NotConnected)
    }
}

impl<P: Port> Drop for PortGuard<P> {
    fn drop(&mut self) {
        if let Some(mut port) = self.port.take() {
            trace!("Closing {}", port.name());
            if let Err(e) = port.close() {
                debug!("Error closing {}: {e}", port.name());
            }
        }
    }
}

/// Write the version query and read back one line.
fn query_version<P: Port>(port: &mut P, catalog: &CommandCatalog) -> Result<String> {
    port.write_all_bytes(&catalog.version_query)?;
    let line = port.read_line(MAX_VERSION_LEN)?;
    trace!("Version response: {line:02X?}");

    Ok(String::from_utf8_lossy(&line)
        .trim_end_matches(['\r', '\n'])
        .to_string())
}
