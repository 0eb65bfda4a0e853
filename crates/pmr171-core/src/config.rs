//! Bridge configuration
//!
//! Stored as JSON. Every field has a default, so a partial file (or none at
//! all) is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::protocol::{ChannelConfig, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS, STATUS_READ_WINDOW};
use crate::rigctl::DEFAULT_LISTEN_ADDR;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Radio link settings
    pub serial: SerialSettings,

    /// rigctl listener settings
    pub server: ServerSettings,
}

/// Radio link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Serial port name or `tcp://host:port`; prompt interactively when unset
    pub port: Option<String>,

    /// Baud rate
    pub baud_rate: u32,

    /// Status reply timeout in milliseconds
    pub timeout_ms: u64,

    /// Maximum bytes read back per status query
    pub read_window: usize,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            read_window: STATUS_READ_WINDOW,
        }
    }
}

/// rigctl listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address
    pub listen: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    DEFAULT_LISTEN_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 4532)))
}

impl BridgeConfig {
    /// Load and validate a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: BridgeConfig = serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    /// Reject values the device channel cannot work with
    pub fn validate(&self) -> io::Result<()> {
        let invalid = |msg: &str| -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::InvalidInput, msg.to_string()))
        };
        if self.serial.baud_rate == 0 {
            return invalid("serial.baud_rate must be non-zero");
        }
        if self.serial.timeout_ms == 0 {
            return invalid("serial.timeout_ms must be non-zero");
        }
        if self.serial.read_window == 0 {
            return invalid("serial.read_window must be non-zero");
        }
        Ok(())
    }

    /// Device channel timing derived from the serial settings
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            read_timeout: Duration::from_millis(self.serial.timeout_ms),
            read_window: self.serial.read_window,
        }
    }
}
