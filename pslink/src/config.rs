//! Link settings and configuration file support.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Environment variables (PSLINK_*)
//! 2. Local config file (./pslink.toml)
//! 3. Global config file (~/.config/pslink/config.toml)
//!
//! ```toml
//! [connection]
//! port = "/dev/ttyACM0"
//! baud = 1000000
//! timeout_ms = 1000
//! strict = false
//!
//! [device]
//! vid = 0x04D8
//! pid = 0x00DF
//! version_markers = ["PSLab", "CSpark"]
//! ```

use {
    crate::{
        catalog::CommandCatalog,
        error::{Error, Result},
        port::{DEFAULT_BAUD, DEFAULT_TIMEOUT, SerialConfig},
    },
    directories::ProjectDirs,
    log::{debug, warn},
    serde::{Deserialize, Serialize},
    std::{
        fs,
        path::{Path, PathBuf},
        time::Duration,
    },
};

/// USB vendor ID of the PSLab.
pub const PSLAB_VID: u16 = 0x04D8;

/// USB product ID of the PSLab.
pub const PSLAB_PID: u16 = 0x00DF;

/// Version markers that identify a supported device.
pub const DEFAULT_VERSION_MARKERS: [&str; 2] = ["PSLab", "CSpark"];

/// Local config file name.
pub const LOCAL_CONFIG_FILE: &str = "pslink.toml";

/// What a read that times out short should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadPolicy {
    /// Log the short read and return a sentinel (`-1` for integers,
    /// `FAILED` for acknowledgments).
    #[default]
    Lenient,
    /// Return [`Error::ShortRead`].
    Strict,
}

/// USB identification used for autodetection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbId {
    /// USB Vendor ID.
    pub vid: u16,
    /// USB Product ID.
    pub pid: u16,
}

impl Default for UsbId {
    fn default() -> Self {
        Self {
            vid: PSLAB_VID,
            pid: PSLAB_PID,
        }
    }
}

/// Resolved settings of a [`Handler`](crate::Handler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Explicit port; `None` means autodetect.
    pub port: Option<String>,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read/write timeout.
    pub timeout: Duration,
    /// USB identification of candidate endpoints.
    pub usb_id: UsbId,
    /// A version line containing any of these identifies the device.
    pub version_markers: Vec<String>,
    /// Short-read handling.
    pub read_policy: ReadPolicy,
    /// Command byte sequences.
    pub catalog: CommandCatalog,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD,
            timeout: DEFAULT_TIMEOUT,
            usb_id: UsbId::default(),
            version_markers: DEFAULT_VERSION_MARKERS
                .iter()
                .map(ToString::to_string)
                .collect(),
            read_policy: ReadPolicy::default(),
            catalog: CommandCatalog::default(),
        }
    }
}

impl LinkSettings {
    /// Settings for an explicit port.
    pub fn for_port(port: impl Into<String>) -> Self {
        Self {
            port: Some(port.into()),
            ..Self::default()
        }
    }

    /// Set the baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the read policy.
    #[must_use]
    pub fn with_read_policy(mut self, read_policy: ReadPolicy) -> Self {
        self.read_policy = read_policy;
        self
    }

    /// Set the command catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: CommandCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Serial parameters for opening `port_name`.
    pub fn serial_config(&self, port_name: &str) -> SerialConfig {
        SerialConfig::new(port_name, self.baud_rate).with_timeout(self.timeout)
    }

    /// Check whether a version line identifies a supported device.
    pub fn is_recognized(&self, version: &str) -> bool {
        self.version_markers
            .iter()
            .any(|marker| version.contains(marker.as_str()))
    }
}

/// Connection section of a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyACM0" or "COM5").
    pub port: Option<String>,
    /// Baud rate.
    pub baud: Option<u32>,
    /// Read/write timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Raise on short reads instead of returning sentinels.
    pub strict: Option<bool>,
}

/// Device section of a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// USB Vendor ID.
    pub vid: Option<u16>,
    /// USB Product ID.
    pub pid: Option<u16>,
    /// Accepted version markers.
    #[serde(default)]
    pub version_markers: Vec<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Device identification.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Command catalog override.
    pub commands: Option<CommandCatalog>,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load configuration from a specific file path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a specific file, skipping it on any error.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match Self::load_from_path(path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Skipping config file {}: {e}", path.display());
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "pslink").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one; set fields in `other` win.
    pub fn merge(&mut self, other: Self) {
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
        if other.connection.baud.is_some() {
            self.connection.baud = other.connection.baud;
        }
        if other.connection.timeout_ms.is_some() {
            self.connection.timeout_ms = other.connection.timeout_ms;
        }
        if other.connection.strict.is_some() {
            self.connection.strict = other.connection.strict;
        }

        if other.device.vid.is_some() {
            self.device.vid = other.device.vid;
        }
        if other.device.pid.is_some() {
            self.device.pid = other.device.pid;
        }
        if !other.device.version_markers.is_empty() {
            self.device.version_markers = other.device.version_markers;
        }

        if other.commands.is_some() {
            self.commands = other.commands;
        }
    }

    /// Apply `PSLINK_PORT`, `PSLINK_BAUD`, `PSLINK_TIMEOUT_MS` and `PSLINK_STRICT`.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PSLINK_PORT").filter(|p| !p.is_empty()) {
            self.connection.port = Some(port);
        }
        if let Some(baud) = parse_env(&lookup, "PSLINK_BAUD") {
            self.connection.baud = Some(baud);
        }
        if let Some(timeout_ms) = parse_env(&lookup, "PSLINK_TIMEOUT_MS") {
            self.connection.timeout_ms = Some(timeout_ms);
        }
        if let Some(strict) = lookup("PSLINK_STRICT") {
            match strict.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.connection.strict = Some(true),
                "0" | "false" | "no" | "off" => self.connection.strict = Some(false),
                other => warn!("Ignoring PSLINK_STRICT={other}"),
            }
        }
    }

    /// Resolve into link settings, filling unset fields with defaults.
    pub fn into_settings(self) -> LinkSettings {
        let defaults = LinkSettings::default();
        let defaults_usb = defaults.usb_id;

        LinkSettings {
            port: self.connection.port,
            baud_rate: self.connection.baud.unwrap_or(defaults.baud_rate),
            timeout: self
                .connection
                .timeout_ms
                .map_or(defaults.timeout, Duration::from_millis),
            usb_id: UsbId {
                vid: self.device.vid.unwrap_or(defaults_usb.vid),
                pid: self.device.pid.unwrap_or(defaults_usb.pid),
            },
            version_markers: if self.device.version_markers.is_empty() {
                defaults.version_markers
            } else {
                self.device.version_markers
            },
            read_policy: match self.connection.strict {
                Some(true) => ReadPolicy::Strict,
                _ => ReadPolicy::Lenient,
            },
            catalog: self.commands.unwrap_or(defaults.catalog),
        }
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {key}={raw}: not a number");
            None
        },
    }
}
