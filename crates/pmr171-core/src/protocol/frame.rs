//! Frame encoding/decoding
//!
//! Frame format (PMR-171 serial protocol):
//! - 4 bytes: Preamble `A5 A5 A5 A5`
//! - 1 byte: Length (opcode + payload)
//! - 1 byte: Opcode
//! - N bytes: Payload (Length - 1)
//! - 2 bytes: CRC-16 (big-endian) of length + opcode + payload
//!
//! The checksum is CRC-16/MODBUS: reflected polynomial 0x8005, initial
//! register 0xFFFF, no final XOR.

use byteorder::{BigEndian, ByteOrder};
use crc::{Crc, CRC_16_MODBUS};

use super::{Opcode, ProtocolError, MAX_PAYLOAD_SIZE, PREAMBLE};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Bytes before the opcode: preamble + length
const HEADER_LEN: usize = PREAMBLE.len() + 1;

/// Trailing checksum size
const CRC_LEN: usize = 2;

/// A decoded device frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Opcode byte
    pub command: u8,
    /// Opcode-specific payload
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame from an opcode byte and payload.
    ///
    /// # Panics
    ///
    /// Panics if the payload is longer than [`MAX_PAYLOAD_SIZE`].
    pub fn new(command: u8, payload: Vec<u8>) -> Self {
        assert!(
            payload.len() <= MAX_PAYLOAD_SIZE,
            "frame payload of {} bytes exceeds the one-byte length field",
            payload.len()
        );
        Self { command, payload }
    }

    /// Decode a frame from raw bytes received from the device.
    ///
    /// The frame must start at the head of `data`. Bytes following a
    /// complete frame are ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if !data.starts_with(&PREAMBLE) {
            return Err(ProtocolError::MissingPreamble);
        }
        if data.len() < HEADER_LEN {
            return Err(ProtocolError::Truncated {
                needed: HEADER_LEN,
                available: data.len(),
            });
        }

        let length = data[PREAMBLE.len()];
        if length == 0 {
            return Err(ProtocolError::InvalidLength(length));
        }

        let needed = HEADER_LEN + length as usize + CRC_LEN;
        if data.len() < needed {
            return Err(ProtocolError::Truncated {
                needed,
                available: data.len(),
            });
        }

        // Checksum covers length + opcode + payload
        let body_end = HEADER_LEN + length as usize;
        let expected = crc16(&data[PREAMBLE.len()..body_end]);
        let received = BigEndian::read_u16(&data[body_end..body_end + CRC_LEN]);
        if received != expected {
            return Err(ProtocolError::CrcMismatch {
                expected,
                actual: received,
            });
        }

        Ok(Self {
            command: data[HEADER_LEN],
            payload: data[HEADER_LEN + 1..body_end].to_vec(),
        })
    }

    /// Encode the frame to raw bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_size());
        bytes.extend_from_slice(&PREAMBLE);
        bytes.push((self.payload.len() + 1) as u8);
        bytes.push(self.command);
        bytes.extend_from_slice(&self.payload);

        let crc = crc16(&bytes[PREAMBLE.len()..]);
        let mut crc_bytes = [0u8; CRC_LEN];
        BigEndian::write_u16(&mut crc_bytes, crc);
        bytes.extend_from_slice(&crc_bytes);

        bytes
    }

    /// Get the total encoded size
    pub fn encoded_size(&self) -> usize {
        HEADER_LEN + 1 + self.payload.len() + CRC_LEN
    }

    /// The opcode, if it is one this bridge knows
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_byte(self.command)
    }
}

/// Builder for constructing frames
pub struct FrameBuilder {
    command: u8,
    payload: Vec<u8>,
}

impl FrameBuilder {
    /// Start a frame for the given opcode
    pub fn new(opcode: Opcode) -> Self {
        Self {
            command: opcode.byte(),
            payload: Vec::new(),
        }
    }

    /// Add a single byte
    pub fn byte(mut self, b: u8) -> Self {
        self.payload.push(b);
        self
    }

    /// Add a 32-bit value (big-endian)
    pub fn u32_be(mut self, value: u32) -> Self {
        let mut bytes = [0u8; 4];
        BigEndian::write_u32(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Build the frame
    pub fn build(self) -> Frame {
        Frame::new(self.command, self.payload)
    }
}

/// Encode `command ++ payload` into a complete checksummed frame
pub fn encode(command: u8, payload: &[u8]) -> Vec<u8> {
    Frame::new(command, payload.to_vec()).to_bytes()
}

/// Decode and validate a frame at the head of `data`
pub fn decode(data: &[u8]) -> Result<Frame, ProtocolError> {
    Frame::from_bytes(data)
}

/// CRC-16/MODBUS over `data`
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Total size of the frame at the head of `data`, once its header has arrived.
///
/// Returns `None` while fewer than five bytes are buffered or when the
/// buffer does not start with the preamble.
pub fn frame_len(data: &[u8]) -> Option<usize> {
    if data.len() < HEADER_LEN || !data.starts_with(&PREAMBLE) {
        return None;
    }
    Some(HEADER_LEN + data[PREAMBLE.len()] as usize + CRC_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Bitwise reference implementation used to pin the table-driven CRC
    fn crc16_reference(data: &[u8]) -> u16 {
        let mut crc: u16 = 0xFFFF;
        for &byte in data {
            crc ^= byte as u16;
            for _ in 0..8 {
                if crc & 0x0001 != 0 {
                    crc = (crc >> 1) ^ 0xA001;
                } else {
                    crc >>= 1;
                }
            }
        }
        crc
    }

    #[test]
    fn test_crc_check_value() {
        // Catalogue check value for CRC-16/MODBUS
        assert_eq!(crc16(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_crc_matches_reference() {
        let cases: [&[u8]; 4] = [b"", &[0x03, 0x01, 0x02, 0x03], &[0x01, 0x0B], b"PMR-171"];
        for data in cases {
            assert_eq!(crc16(data), crc16_reference(data));
        }
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(0x01, &[0x02, 0x03]);

        assert_eq!(&bytes[..4], &PREAMBLE);
        assert_eq!(bytes[4], 3);
        assert_eq!(bytes[5], 0x01);
        assert_eq!(&bytes[6..8], &[0x02, 0x03]);
        assert_eq!(bytes.len(), 10);

        let crc = crc16_reference(&[0x03, 0x01, 0x02, 0x03]);
        assert_eq!(&bytes[8..], &crc.to_be_bytes());
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(
            encode(0x01, &[0x02, 0x03]),
            vec![0xA5, 0xA5, 0xA5, 0xA5, 0x03, 0x01, 0x02, 0x03, 0xC1, 0x10]
        );
    }

    #[test]
    fn test_frame_roundtrip() {
        let original = FrameBuilder::new(Opcode::SetFrequency)
            .u32_be(7_074_000)
            .u32_be(7_074_000)
            .build();
        let encoded = original.to_bytes();
        assert_eq!(encoded.len(), original.encoded_size());

        let decoded = Frame::from_bytes(&encoded).expect("Should decode successfully");
        assert_eq!(decoded, original);
        assert_eq!(decoded.opcode(), Some(Opcode::SetFrequency));
    }

    #[test]
    fn test_empty_payload() {
        let encoded = encode(Opcode::QueryStatus.byte(), &[]);
        assert_eq!(encoded[4], 1);
        assert_eq!(encoded.len(), 8);

        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.command, 0x0B);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut encoded = encode(0x0A, &[0x04, 0x04]);
        encoded.extend_from_slice(&[0xFF, 0x00, 0x13]);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.payload, vec![0x04, 0x04]);
    }

    #[test]
    fn test_missing_preamble() {
        let mut encoded = encode(0x07, &[0x00]);
        encoded[0] = 0x5A;
        assert!(matches!(decode(&encoded), Err(ProtocolError::MissingPreamble)));
        assert!(matches!(decode(&[]), Err(ProtocolError::MissingPreamble)));
    }

    #[test]
    fn test_truncated_frame() {
        let encoded = encode(0x09, &[0, 0, 0, 1, 0, 0, 0, 1]);
        let err = decode(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated {
                needed: 16,
                available: 15
            }
        ));
        assert!(matches!(
            decode(&PREAMBLE),
            Err(ProtocolError::Truncated { needed: 5, .. })
        ));
    }

    #[test]
    fn test_zero_length_rejected() {
        let data = [0xA5, 0xA5, 0xA5, 0xA5, 0x00, 0x00, 0x00];
        assert!(matches!(decode(&data), Err(ProtocolError::InvalidLength(0))));
    }

    #[test]
    fn test_crc_verification() {
        let mut encoded = encode(0x0A, &[0x03, 0x03]);

        // Corrupt a payload byte
        encoded[6] ^= 0xFF;

        let err = decode(&encoded).unwrap_err();
        assert!(matches!(err, ProtocolError::CrcMismatch { .. }));
        assert!(err.is_malformed_frame());
    }

    #[test]
    fn test_frame_len() {
        let encoded = encode(0x0B, &[1, 2, 3]);
        assert_eq!(frame_len(&encoded[..4]), None);
        assert_eq!(frame_len(&encoded[..5]), Some(encoded.len()));
        assert_eq!(frame_len(&[0x00; 8]), None);
    }

    #[test]
    #[should_panic(expected = "exceeds the one-byte length field")]
    fn test_oversized_payload_panics() {
        let _ = encode(0x09, &[0u8; MAX_PAYLOAD_SIZE + 1]);
    }

    #[test]
    fn test_max_payload_encodes() {
        let encoded = encode(0x09, &[0x55; MAX_PAYLOAD_SIZE]);
        assert_eq!(encoded[4], 0xFF);
        assert_eq!(decode(&encoded).unwrap().payload.len(), MAX_PAYLOAD_SIZE);
    }
}
