//! Burst mode: queue several commands and send them in one write.
//!
//! While burst mode is on, [`Handler::send`] appends to a buffer and
//! [`Handler::get_ack`] only counts. [`Handler::send_burst`] writes the buffer
//! in one call and then reads all counted acknowledgments in one read.
//!
//! ```rust,no_run
//! # fn demo<C: pslink::Connector>(handler: &mut pslink::Handler<C>) -> pslink::Result<()> {
//! handler.set_burst(true);
//! handler.send(&[0x05u8, 0x01], None)?; // start capture
//! handler.get_ack()?;
//! handler.send(&[0x07u8, 0x02], None)?; // set output
//! handler.get_ack()?;
//! let acks = handler.send_burst()?;
//! assert_eq!(acks.len(), 2);
//! # Ok(())
//! # }
//! ```

use {
    super::Handler,
    crate::{
        config::ReadPolicy,
        error::{Error, Result},
        port::{Connector, Port},
    },
    log::{debug, error, trace},
};

/// Bytes and acknowledgments deferred by burst mode.
#[derive(Debug, Default)]
pub(super) struct BurstBuffer {
    pub data: Vec<u8>,
    pub pending_acks: usize,
}

/// Where outgoing bytes go.
#[derive(Debug, Default)]
pub(super) enum Sink {
    /// Straight to the port.
    #[default]
    Direct,
    /// Into a burst buffer.
    Burst(BurstBuffer),
}

impl Sink {
    pub fn is_burst(&self) -> bool {
        matches!(self, Self::Burst(_))
    }

    /// Leave burst mode, dropping anything queued.
    pub fn reset(&mut self) {
        if let Self::Burst(buffer) = std::mem::take(self) {
            if !buffer.data.is_empty() || buffer.pending_acks > 0 {
                debug!(
                    "Discarding burst of {} bytes and {} acks",
                    buffer.data.len(),
                    buffer.pending_acks
                );
            }
        }
    }
}

impl<C: Connector> Handler<C> {
    /// Turn burst mode on or off.
    ///
    /// Turning it off without [`Handler::send_burst`] discards everything
    /// queued so far.
    pub fn set_burst(&mut self, enabled: bool) {
        match (enabled, self.sink.is_burst()) {
            (true, false) => self.sink = Sink::Burst(BurstBuffer::default()),
            (false, true) => self.sink.reset(),
            _ => {},
        }
    }

    /// Check whether burst mode is on.
    pub fn is_burst(&self) -> bool {
        self.sink.is_burst()
    }

    /// Transmit the queued burst and collect its acknowledgments.
    ///
    /// Writes the whole buffer in one call, leaves burst mode, then reads one
    /// byte per deferred acknowledgment. The raw bytes are returned in order;
    /// under [`ReadPolicy::Lenient`] the result is shorter than the number of
    /// queued commands if the device stopped answering.
    ///
    /// Without burst mode this does nothing and returns an empty list.
    pub fn send_burst(&mut self) -> Result<Vec<u8>> {
        if !self.sink.is_burst() {
            return Ok(Vec::new());
        }
        if self.port.is_none() {
            return Err(Error::NotConnected);
        }

        let Sink::Burst(buffer) = std::mem::take(&mut self.sink) else {
            return Ok(Vec::new());
        };

        let port = self.port_mut()?;
        trace!(
            "Sending burst of {} bytes, expecting {} acks",
            buffer.data.len(),
            buffer.pending_acks
        );
        port.write_all_bytes(&buffer.data)?;
        let acks = port.read_up_to(buffer.pending_acks)?;

        if acks.len() < buffer.pending_acks {
            if self.settings.read_policy == ReadPolicy::Strict {
                return Err(Error::ShortRead {
                    expected: buffer.pending_acks,
                    actual: acks.len(),
                });
            }
            error!(
                "Burst expected {} acks, got {}.",
                buffer.pending_acks,
                acks.len()
            );
        }

        Ok(acks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::Ack;
    use crate::config::LinkSettings;
    use crate::port::mock::{MockConnector, SharedWire, lock};
    use std::time::Duration;

    fn connected(policy: ReadPolicy) -> (Handler<MockConnector>, SharedWire) {
        let mut connector = MockConnector::new();
        let wire = connector.add_plain("/dev/ttyACM0", b"PSLab V6\n");
        let settings = LinkSettings::for_port("/dev/ttyACM0")
            .with_timeout(Duration::from_millis(10))
            .with_read_policy(policy);
        let handler = Handler::open(connector, settings).unwrap();
        lock(&wire).clear_log();
        (handler, wire)
    }

    #[test]
    fn test_burst_single_write_single_read() {
        let (mut handler, wire) = connected(ReadPolicy::Lenient);
        lock(&wire).push_inbound(&[1, 1, 2]);

        handler.set_burst(true);
        handler.send(5u32, None).unwrap();
        assert_eq!(handler.get_ack().unwrap(), Ack::Success);
        handler.send(300u32, None).unwrap();
        assert_eq!(handler.get_ack().unwrap(), Ack::Success);
        handler.send(70000u32, None).unwrap();
        assert_eq!(handler.get_ack().unwrap(), Ack::Success);

        {
            let w = lock(&wire);
            assert!(w.writes.is_empty());
            assert!(w.reads.is_empty());
        }

        let acks = handler.send_burst().unwrap();

        assert_eq!(acks, vec![1, 1, 2]);
        assert!(!handler.is_burst());
        let w = lock(&wire);
        assert_eq!(
            w.writes,
            vec![vec![0x05, 0x2C, 0x01, 0x70, 0x11, 0x01, 0x00]]
        );
        assert_eq!(w.reads, vec![3]);
    }

    #[test]
    fn test_burst_resets_after_flush() {
        let (mut handler, wire) = connected(ReadPolicy::Lenient);
        lock(&wire).push_inbound(&[1, 1]);

        handler.set_burst(true);
        handler.send_byte(1).unwrap();
        handler.get_ack().unwrap();
        handler.send_burst().unwrap();

        // Direct mode again: the next ack is read immediately.
        assert_eq!(handler.get_ack().unwrap(), Ack::Success);

        handler.set_burst(true);
        handler.send_byte(2).unwrap();
        lock(&wire).clear_log();
        assert!(handler.send_burst().unwrap().is_empty());
        assert_eq!(lock(&wire).writes, vec![vec![2]]);
    }

    #[test]
    fn test_burst_short_ack_read_lenient() {
        let (mut handler, wire) = connected(ReadPolicy::Lenient);
        lock(&wire).push_inbound(&[1]);

        handler.set_burst(true);
        for _ in 0..3 {
            handler.send_byte(0).unwrap();
            handler.get_ack().unwrap();
        }

        assert_eq!(handler.send_burst().unwrap(), vec![1]);
    }

    #[test]
    fn test_burst_short_ack_read_strict() {
        let (mut handler, wire) = connected(ReadPolicy::Strict);
        lock(&wire).push_inbound(&[1]);

        handler.set_burst(true);
        handler.get_ack().unwrap();
        handler.get_ack().unwrap();

        assert!(matches!(
            handler.send_burst(),
            Err(Error::ShortRead {
                expected: 2,
                actual: 1
            })
        ));
        assert!(!handler.is_burst());
    }

    #[test]
    fn test_burst_off_discards_queue() {
        let (mut handler, wire) = connected(ReadPolicy::Lenient);

        handler.set_burst(true);
        handler.send_byte(9).unwrap();
        handler.get_ack().unwrap();
        handler.set_burst(false);

        assert!(handler.send_burst().unwrap().is_empty());
        handler.send_byte(7).unwrap();
        assert_eq!(lock(&wire).writes, vec![vec![7]]);
    }

    #[test]
    fn test_send_burst_without_burst_mode() {
        let (mut handler, wire) = connected(ReadPolicy::Lenient);
        assert!(handler.send_burst().unwrap().is_empty());
        assert!(lock(&wire).writes.is_empty());
    }

    #[test]
    fn test_burst_survives_when_disconnected() {
        let mut handler = Handler::new(MockConnector::new(), LinkSettings::default());
        handler.set_burst(true);
        handler.send_byte(1).unwrap();
        handler.get_ack().unwrap();

        assert!(matches!(handler.send_burst(), Err(Error::NotConnected)));
        assert!(handler.is_burst());
    }

    #[test]
    fn test_set_burst_twice_keeps_queue() {
        let (mut handler, wire) = connected(ReadPolicy::Lenient);
        lock(&wire).push_inbound(&[1]);

        handler.set_burst(true);
        handler.send_byte(3).unwrap();
        handler.get_ack().unwrap();
        handler.set_burst(true);

        assert_eq!(handler.send_burst().unwrap(), vec![1]);
        assert_eq!(lock(&wire).writes, vec![vec![3]]);
    }
}
