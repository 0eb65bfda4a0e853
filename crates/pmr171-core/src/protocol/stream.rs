//! Device links
//!
//! The byte stream a [`DeviceChannel`](super::DeviceChannel) owns: the USB
//! serial port, or a TCP socket for serial-over-IP adapters.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use super::{clear_buffers, open_port, ProtocolError};

/// Abstraction for the channel to the radio (Serial or TCP)
pub trait DeviceLink: Read + Write + Send {
    /// Set timeout for read/write operations
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discard any unread input
    fn clear_input_buffer(&mut self) -> io::Result<()>;
}

/// Serial port wrapper implementing DeviceLink
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Wrap an opened, configured port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl DeviceLink for SerialChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::other)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }
}

/// TCP stream wrapper implementing DeviceLink
pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    /// Wrap a connected socket
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Read for TcpChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl DeviceLink for TcpChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))?;
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        // No kernel-level flush for sockets: drain without blocking, then restore
        self.stream.set_nonblocking(true)?;
        let mut buf = [0u8; 256];
        let result = loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.stream.set_nonblocking(false)?;
        result
    }
}

/// Open a device link from an endpoint string.
///
/// `tcp://host:port` connects to a serial-over-IP adapter; anything else is
/// treated as a serial port name opened at `baud_rate`.
pub fn open_link(endpoint: &str, baud_rate: u32) -> Result<Box<dyn DeviceLink>, ProtocolError> {
    if let Some(addr) = endpoint.strip_prefix("tcp://") {
        if addr.is_empty() {
            return Err(ProtocolError::InvalidEndpoint(endpoint.to_string()));
        }
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        tracing::info!(%addr, "connected to network serial adapter");
        return Ok(Box::new(TcpChannel::new(stream)));
    }

    if endpoint.is_empty() {
        return Err(ProtocolError::InvalidEndpoint(endpoint.to_string()));
    }
    let mut port = open_port(endpoint, Some(baud_rate))?;
    // Whatever the radio sent before we attached is not a reply to us
    clear_buffers(port.as_mut())?;
    tracing::info!(port = endpoint, baud = baud_rate, "opened serial port");
    Ok(Box::new(SerialChannel::new(port)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_empty_endpoint_rejected() {
        assert!(matches!(
            open_link("", 115200),
            Err(ProtocolError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            open_link("tcp://", 115200),
            Err(ProtocolError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_tcp_link_roundtrip_and_drain() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut link = open_link(&format!("tcp://{addr}"), 115200).unwrap();
        let (mut peer, _) = listener.accept().unwrap();

        link.write_all(&[0xA5, 0x01]).unwrap();
        link.flush().unwrap();
        let mut got = [0u8; 2];
        peer.read_exact(&mut got).unwrap();
        assert_eq!(got, [0xA5, 0x01]);

        // Stale bytes are dropped by clear_input_buffer
        peer.write_all(b"stale").unwrap();
        peer.flush().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        link.clear_input_buffer().unwrap();

        peer.write_all(b"ok").unwrap();
        link.set_timeout(Duration::from_millis(500)).unwrap();
        let mut fresh = [0u8; 2];
        link.read_exact(&mut fresh).unwrap();
        assert_eq!(&fresh, b"ok");
    }
}
