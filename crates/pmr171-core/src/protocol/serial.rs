//! Serial port handling
//!
//! Enumerates and opens the USB serial interface of the radio.

use serialport::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType, StopBits,
};
use std::collections::HashMap;
use std::fmt;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;

use super::{ProtocolError, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};

/// A serial endpoint the radio may be attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`
    pub name: String,
    /// USB vendor id
    pub vid: Option<u16>,
    /// USB product id
    pub pid: Option<u16>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl PortInfo {
    /// Port known only by name
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }

    /// Human-readable description, product name first
    pub fn description(&self) -> String {
        match (&self.product, &self.manufacturer, self.vid, self.pid) {
            (Some(product), _, _, _) => product.clone(),
            (None, Some(manufacturer), _, _) => manufacturer.clone(),
            (None, None, Some(vid), Some(pid)) => format!("USB {vid:04x}:{pid:04x}"),
            _ => "n/a".to_string(),
        }
    }
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.description())
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Ordering rank: CDC-ACM adapters, then USB-serial bridges, then anything else
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name).to_string();
    let numbered = ["ttyACM", "ttyUSB"]
        .iter()
        .zip(0u8..)
        .find_map(|(prefix, rank)| {
            basename
                .strip_prefix(*prefix)
                .map(|n| (rank, n.parse::<usize>().ok()))
        });
    match numbered {
        Some((rank, index)) => (rank, index.unwrap_or(usize::MAX), basename),
        None => (2, 0, basename),
    }
}

#[cfg(target_os = "linux")]
fn is_usb_tty(name: &str) -> bool {
    name.starts_with("ttyACM") || name.starts_with("ttyUSB")
}

/// Serial ports visible on this host, de-duplicated and in a stable order.
///
/// On Linux the enumeration is topped up from `/dev`, since udev does not
/// always report USB adapters.
pub fn list_ports() -> Vec<PortInfo> {
    let mut found: HashMap<String, PortInfo> = match serialport::available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|info| {
                let port = PortInfo::from(info);
                (port.name.clone(), port)
            })
            .collect(),
        Err(e) => {
            tracing::warn!("serial port enumeration failed: {e}");
            HashMap::new()
        }
    };

    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        let extra = entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|fname| is_usb_tty(fname))
            .map(|fname| format!("/dev/{fname}"));
        for path in extra {
            found
                .entry(path.clone())
                .or_insert_with(|| PortInfo::bare(path));
        }
    }

    let mut ports: Vec<PortInfo> = found.into_values().collect();
    ports.sort_by_key(|p| port_sort_key(&p.name));
    ports
}

fn serial_err(e: serialport::Error) -> ProtocolError {
    ProtocolError::SerialError(e.to_string())
}

/// Open a serial port at `baud_rate` (115200 when `None`), configured 8N1
pub fn open_port(name: &str, baud_rate: Option<u32>) -> Result<Box<dyn SerialPort>, ProtocolError> {
    let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
    tracing::debug!(port = name, baud, "opening serial port");

    let mut port = serialport::new(name, baud)
        .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
        .open()
        .map_err(|e| match e.kind() {
            serialport::ErrorKind::NoDevice => ProtocolError::PortNotFound(name.to_string()),
            _ => serial_err(e),
        })?;
    configure_port(port.as_mut())?;
    Ok(port)
}

/// 8 data bits, no parity, one stop bit, no flow control
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.set_data_bits(DataBits::Eight).map_err(serial_err)?;
    port.set_parity(Parity::None).map_err(serial_err)?;
    port.set_stop_bits(StopBits::One).map_err(serial_err)?;
    port.set_flow_control(FlowControl::None).map_err(serial_err)
}

/// Drop anything pending in either direction
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(ClearBuffer::All).map_err(serial_err)
}
