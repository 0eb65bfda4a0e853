//! Device Protocol Communication
//!
//! Implements the PMR-171 binary serial protocol: `A5 A5 A5 A5` preamble,
//! one length byte, one opcode byte, payload and a big-endian CRC-16.
//!
//! All traffic to the radio goes through a single [`DeviceChannel`], which
//! serializes frame exchanges between concurrent callers.

mod channel;
pub mod commands;
mod error;
pub mod frame;
pub mod mode;
pub mod serial;
pub mod stream;

pub use channel::{ChannelConfig, DeviceChannel, LinkStats, StatusReply};
pub use commands::Opcode;
pub use error::ProtocolError;
pub use frame::{crc16, decode, encode, frame_len, Frame, FrameBuilder};
pub use mode::{mode_id_to_name, mode_name_to_id, Mode};
pub use serial::{clear_buffers, configure_port, list_ports, open_port, PortInfo};
pub use stream::{open_link, DeviceLink, SerialChannel, TcpChannel};

/// Default baud rate for the PMR-171 USB serial interface
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default read timeout for device replies in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Upper bound on bytes read back for a single status query
pub const STATUS_READ_WINDOW: usize = 64;

/// Frame start marker
pub const PREAMBLE: [u8; 4] = [0xA5, 0xA5, 0xA5, 0xA5];

/// Largest payload the one-byte length field can describe (length counts the opcode too)
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize - 1;
