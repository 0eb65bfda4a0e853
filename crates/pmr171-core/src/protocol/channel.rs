//! Device channel
//!
//! Owns the single link to the radio. Every frame exchange (a write and an
//! optional read) happens while holding one mutex, so concurrent rigctl
//! sessions can never interleave bytes on the wire.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use byteorder::{BigEndian, ByteOrder};

use super::{
    commands::transmit_byte,
    frame::{frame_len, FrameBuilder},
    open_link, DeviceLink, Frame, Mode, Opcode, ProtocolError, DEFAULT_TIMEOUT_MS,
    STATUS_READ_WINDOW,
};

/// Passband reported with every mode; the radio does not expose filter width
pub const DEFAULT_PASSBAND_HZ: u32 = 2400;

/// Channel timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// How long a status query waits for the reply
    pub read_timeout: Duration,
    /// Maximum bytes read back for one status query
    pub read_window: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            read_window: STATUS_READ_WINDOW,
        }
    }
}

/// Decoded status snapshot (VFO A)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReply {
    /// Operating mode
    pub mode: Mode,
    /// Dial frequency in Hz
    pub frequency_hz: u32,
    /// Reported passband; the radio does not send one, so this is fixed
    pub passband_hz: u32,
}

impl StatusReply {
    /// Reported when the radio's reply is missing or malformed
    pub const FALLBACK: StatusReply = StatusReply {
        mode: Mode::Usb,
        frequency_hz: 0,
        passband_hz: DEFAULT_PASSBAND_HZ,
    };

    /// Parse a raw status reply.
    ///
    /// Payload layout: VFO A mode, VFO B mode, VFO A frequency (u32 BE), ...
    /// A reply carrying the mode but not the frequency reports 0 Hz.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        let frame = Frame::from_bytes(data)?;
        Self::from_frame(&frame)
    }

    /// Extract the status fields from an already validated frame
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        let mode_id = *frame.payload.first().ok_or(ProtocolError::Truncated {
            needed: 1,
            available: 0,
        })?;
        let frequency_hz = frame
            .payload
            .get(2..6)
            .map(BigEndian::read_u32)
            .unwrap_or(0);

        Ok(Self {
            mode: Mode::from_id(mode_id),
            frequency_hz,
            passband_hz: DEFAULT_PASSBAND_HZ,
        })
    }

    /// rigctl `m` reply body, e.g. `USB 2400`
    pub fn rigctl_mode(&self) -> String {
        format!("{} {}", self.mode, self.passband_hz)
    }
}

/// Cumulative link traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Bytes written to the radio
    pub tx_bytes: u64,
    /// Bytes read from the radio
    pub rx_bytes: u64,
    /// Frames written to the radio
    pub tx_frames: u64,
    /// Replies that decoded into a valid frame
    pub rx_frames: u64,
}

impl fmt::Display for LinkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tx {} frames / {} bytes, rx {} frames / {} bytes",
            self.tx_frames, self.tx_bytes, self.rx_frames, self.rx_bytes
        )
    }
}

/// Link plus traffic counters, only reachable through the gate
struct Inner {
    link: Box<dyn DeviceLink>,
    /// Timeout the link is left with between exchanges
    io_timeout: Duration,
    stats: LinkStats,
}

impl Inner {
    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        tracing::debug!("tx {} bytes: {:02x?}", bytes.len(), bytes);
        self.link.write_all(bytes).map_err(io_error)?;
        self.link.flush().map_err(io_error)?;
        self.stats.tx_bytes = self.stats.tx_bytes.saturating_add(bytes.len() as u64);
        self.stats.tx_frames = self.stats.tx_frames.saturating_add(1);
        Ok(())
    }

    /// Read until `max_bytes` arrive, `timeout` elapses, the link reports
    /// end of stream, or `complete` accepts the buffer.
    fn read_until(
        &mut self,
        max_bytes: usize,
        timeout: Duration,
        complete: impl Fn(&[u8]) -> bool,
    ) -> Result<Vec<u8>, ProtocolError> {
        let response = self.read_loop(max_bytes, timeout, complete);
        // Writes share the link timeout; never leave it at a shrunken remainder
        let restored = self.link.set_timeout(self.io_timeout).map_err(io_error);
        let response = response?;
        restored?;

        if !response.is_empty() {
            tracing::debug!("rx {} bytes: {:02x?}", response.len(), response);
            self.stats.rx_bytes = self.stats.rx_bytes.saturating_add(response.len() as u64);
        }
        Ok(response)
    }

    fn read_loop(
        &mut self,
        max_bytes: usize,
        timeout: Duration,
        complete: impl Fn(&[u8]) -> bool,
    ) -> Result<Vec<u8>, ProtocolError> {
        let mut response = Vec::with_capacity(max_bytes);
        let mut buffer = [0u8; 256];
        let deadline = Instant::now() + timeout;

        while response.len() < max_bytes {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.link.set_timeout(remaining).map_err(io_error)?;

            let want = (max_bytes - response.len()).min(buffer.len());
            match self.link.read(&mut buffer[..want]) {
                Ok(0) => break,
                Ok(n) => {
                    response.extend_from_slice(&buffer[..n]);
                    if complete(&response) {
                        break;
                    }
                }
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    break
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ProtocolError::IoError(e)),
            }
        }
        Ok(response)
    }

    /// Write `frame` and, for opcodes the radio answers, collect the reply
    /// within `config`'s window and timeout. Stale input is dropped first.
    fn exchange(
        &mut self,
        frame: &Frame,
        config: &ChannelConfig,
    ) -> Result<Option<Vec<u8>>, ProtocolError> {
        let answered = frame.opcode().is_some_and(|op| op.expects_response());
        if answered {
            if let Err(e) = self.link.clear_input_buffer() {
                tracing::debug!("could not clear input before exchange: {e}");
            }
        }

        self.write_frame(&frame.to_bytes())?;
        if !answered {
            return Ok(None);
        }

        self.read_until(config.read_window, config.read_timeout, |buf| {
            frame_len(buf).is_some_and(|len| buf.len() >= len)
        })
        .map(Some)
    }
}

fn io_error(e: io::Error) -> ProtocolError {
    if e.kind() == io::ErrorKind::TimedOut {
        ProtocolError::Timeout
    } else {
        ProtocolError::IoError(e)
    }
}

/// The single shared channel to the radio
pub struct DeviceChannel {
    inner: Mutex<Inner>,
    config: ChannelConfig,
}

impl DeviceChannel {
    /// Wrap an already open link
    pub fn new(link: Box<dyn DeviceLink>, config: ChannelConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                link,
                io_timeout: config.read_timeout,
                stats: LinkStats::default(),
            }),
            config,
        }
    }

    /// Open `endpoint` (serial port name or `tcp://host:port`) and wrap it
    pub fn open(
        endpoint: &str,
        baud_rate: u32,
        config: ChannelConfig,
    ) -> Result<Self, ProtocolError> {
        Ok(Self::new(open_link(endpoint, baud_rate)?, config))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, ProtocolError> {
        self.inner.lock().map_err(|_| ProtocolError::GatePoisoned)
    }

    /// Write an encoded frame to the radio
    pub fn send_raw(&self, frame: &[u8]) -> Result<(), ProtocolError> {
        self.lock()?.write_frame(frame)
    }

    /// Read up to `max_bytes` from the radio, waiting at most `timeout`.
    ///
    /// An empty result means nothing arrived in time.
    pub fn read_raw(&self, max_bytes: usize, timeout: Duration) -> Result<Vec<u8>, ProtocolError> {
        self.lock()?.read_until(max_bytes, timeout, |_| false)
    }

    fn exchange(&self, frame: Frame) -> Result<Option<Vec<u8>>, ProtocolError> {
        self.lock()?.exchange(&frame, &self.config)
    }

    /// Tune VFO A and VFO B to `hz`
    pub fn set_frequency(&self, hz: u32) -> Result<(), ProtocolError> {
        tracing::debug!(hz, "set frequency");
        self.exchange(
            FrameBuilder::new(Opcode::SetFrequency)
                .u32_be(hz)
                .u32_be(hz)
                .build(),
        )
        .map(drop)
    }

    /// Set VFO A and VFO B to `mode`
    pub fn set_mode(&self, mode: Mode) -> Result<(), ProtocolError> {
        tracing::debug!(%mode, "set mode");
        self.exchange(
            FrameBuilder::new(Opcode::SetMode)
                .byte(mode.id())
                .byte(mode.id())
                .build(),
        )
        .map(drop)
    }

    /// Key (`true`) or unkey (`false`) the transmitter
    pub fn set_transmit(&self, on: bool) -> Result<(), ProtocolError> {
        tracing::debug!(on, "set transmit");
        self.exchange(
            FrameBuilder::new(Opcode::SetTransmit)
                .byte(transmit_byte(on))
                .build(),
        )
        .map(drop)
    }

    /// Ask the radio for its status.
    ///
    /// Link failures are returned as errors. A reply that is empty, lacks the
    /// preamble or fails validation yields [`StatusReply::FALLBACK`].
    pub fn query_status(&self) -> Result<StatusReply, ProtocolError> {
        let mut inner = self.lock()?;
        let reply = inner
            .exchange(&FrameBuilder::new(Opcode::QueryStatus).build(), &self.config)?
            .unwrap_or_default();

        match StatusReply::parse(&reply) {
            Ok(status) => {
                inner.stats.rx_frames = inner.stats.rx_frames.saturating_add(1);
                Ok(status)
            }
            Err(e) => {
                tracing::warn!(
                    "status reply unusable ({e}), reporting {}",
                    StatusReply::FALLBACK.rigctl_mode()
                );
                Ok(StatusReply::FALLBACK)
            }
        }
    }

    /// Traffic since the channel was opened
    pub fn stats(&self) -> Result<LinkStats, ProtocolError> {
        Ok(self.lock()?.stats)
    }
}
