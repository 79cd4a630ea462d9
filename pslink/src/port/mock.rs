//! Scripted in-memory port for unit tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::port::{Connector, Port, PortInfo, SerialConfig};

/// Shared state of one simulated endpoint.
#[derive(Debug, Default)]
pub(crate) struct Wire {
    /// Bytes the device will send, in order.
    pub inbound: VecDeque<u8>,
    /// Every `write` call, in order.
    pub writes: Vec<Vec<u8>>,
    /// Buffer length of every `read` call, in order.
    pub reads: Vec<usize>,
    /// Whether a port on this endpoint is currently open.
    pub open: bool,
    /// Number of times the endpoint was opened.
    pub opens: usize,
}

impl Wire {
    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// All written bytes, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.writes.concat()
    }

    /// Forget the write/read log, keeping pending inbound bytes.
    pub fn clear_log(&mut self) {
        self.writes.clear();
        self.reads.clear();
    }
}

pub(crate) type SharedWire = Arc<Mutex<Wire>>;

pub(crate) fn lock(wire: &SharedWire) -> MutexGuard<'_, Wire> {
    wire.lock().unwrap()
}

/// Port backed by a [`Wire`].
pub(crate) struct MockPort {
    name: String,
    wire: SharedWire,
    timeout: Duration,
}

impl MockPort {
    pub fn with_inbound(name: &str, inbound: &[u8]) -> (Self, SharedWire) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        {
            let mut w = lock(&wire);
            w.push_inbound(inbound);
            w.open = true;
            w.opens = 1;
        }
        let port = Self {
            name: name.to_string(),
            wire: Arc::clone(&wire),
            timeout: Duration::from_millis(10),
        };
        (port, wire)
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut w = lock(&self.wire);
        if !w.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        w.reads.push(buf.len());
        if w.inbound.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(w.inbound.len());
        for b in buf.iter_mut().take(n) {
            *b = w.inbound.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut w = lock(&self.wire);
        if !w.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        w.writes.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for MockPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn bytes_available(&self) -> Result<usize> {
        Ok(lock(&self.wire).inbound.len())
    }

    fn is_open(&self) -> bool {
        lock(&self.wire).open
    }

    fn close(&mut self) -> Result<()> {
        lock(&self.wire).open = false;
        Ok(())
    }
}

/// Connector over a fixed list of simulated endpoints.
#[derive(Default)]
pub(crate) struct MockConnector {
    endpoints: Vec<(PortInfo, SharedWire)>,
    /// Every configuration passed to `open`, in order.
    pub opened: Arc<Mutex<Vec<SerialConfig>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a USB endpoint whose device will send `inbound`.
    pub fn add_usb(&mut self, name: &str, vid: u16, pid: u16, inbound: &[u8]) -> SharedWire {
        let info = PortInfo {
            name: name.to_string(),
            vid: Some(vid),
            pid: Some(pid),
            ..PortInfo::default()
        };
        self.add(info, inbound)
    }

    /// Add a non-USB endpoint.
    pub fn add_plain(&mut self, name: &str, inbound: &[u8]) -> SharedWire {
        let info = PortInfo {
            name: name.to_string(),
            ..PortInfo::default()
        };
        self.add(info, inbound)
    }

    fn add(&mut self, info: PortInfo, inbound: &[u8]) -> SharedWire {
        let wire = Arc::new(Mutex::new(Wire::default()));
        lock(&wire).push_inbound(inbound);
        self.endpoints.push((info, Arc::clone(&wire)));
        wire
    }

    pub fn opened_names(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.port_name.clone())
            .collect()
    }
}

impl Connector for MockConnector {
    type Port = MockPort;

    fn open(&self, config: &SerialConfig) -> Result<MockPort> {
        self.opened.lock().unwrap().push(config.clone());

        let (_, wire) = self
            .endpoints
            .iter()
            .find(|(info, _)| info.name == config.port_name)
            .ok_or_else(|| {
                Error::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no such port: {}", config.port_name),
                ))
            })?;

        {
            let mut w = lock(wire);
            w.open = true;
            w.opens += 1;
        }

        Ok(MockPort {
            name: config.port_name.clone(),
            wire: Arc::clone(wire),
            timeout: config.timeout,
        })
    }

    fn list_ports(&self) -> Result<Vec<PortInfo>> {
        Ok(self.endpoints.iter().map(|(info, _)| info.clone()).collect())
    }
}
