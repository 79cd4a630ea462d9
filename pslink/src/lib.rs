//! # pslink
//!
//! Serial link layer for PSLab measurement hardware.
//!
//! This crate owns the byte channel to a PSLab device and provides:
//!
//! - Connection management with USB VID/PID autodetection and a version
//!   handshake
//! - Little-endian integer packing for command arguments
//! - Acknowledgment handling
//! - Burst mode, which batches commands into one write
//! - Slot and bulk access to the device's flash pages
//!
//! Higher-level instrument drivers build on [`Handler`].
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via the `serialport` crate
//!
//! ## Configuration
//!
//! [`Config::load`] reads `pslink.toml` from the user configuration directory
//! and the working directory, then applies `PSLINK_*` environment overrides.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pslink::{Config, Handler};
//!
//! fn main() -> pslink::Result<()> {
//!     let settings = Config::load().into_settings();
//!
//!     #[cfg(feature = "native")]
//!     {
//!         let mut handler = Handler::native(settings)?;
//!         println!("Connected to {}", handler.version());
//!
//!         let slot = handler.read_slot(0, 0)?;
//!         println!("{:?} ({})", slot.data, slot.ack);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ack;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod port;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativeConnector, NativePort};
pub use {
    ack::Ack,
    catalog::CommandCatalog,
    codec::Width,
    config::{Config, LinkSettings, ReadPolicy, UsbId},
    error::{Error, Result},
    handler::{
        ConnectionState, FlashRead, Handler, PAGE_COUNT, PAGE_SIZE, SLOT_FILLER, SLOT_SIZE,
        SLOTS_PER_PAGE, Value,
    },
    port::{Connector, Port, PortInfo, SerialConfig},
};
