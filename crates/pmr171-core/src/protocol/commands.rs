//! Protocol opcodes
//!
//! Defines the PMR-171 serial opcodes this bridge drives.

/// Device opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Key or unkey the transmitter (0x07)
    SetTransmit,

    /// Set VFO A and VFO B frequency (0x09)
    SetFrequency,

    /// Set VFO A and VFO B mode (0x0A)
    SetMode,

    /// Request a status snapshot (0x0B)
    QueryStatus,
}

impl Opcode {
    /// Get the opcode byte
    pub fn byte(&self) -> u8 {
        match self {
            Opcode::SetTransmit => 0x07,
            Opcode::SetFrequency => 0x09,
            Opcode::SetMode => 0x0A,
            Opcode::QueryStatus => 0x0B,
        }
    }

    /// Look up an opcode by its byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x07 => Some(Opcode::SetTransmit),
            0x09 => Some(Opcode::SetFrequency),
            0x0A => Some(Opcode::SetMode),
            0x0B => Some(Opcode::QueryStatus),
            _ => None,
        }
    }

    /// Check if the device answers this opcode
    pub fn expects_response(&self) -> bool {
        matches!(self, Opcode::QueryStatus)
    }
}

/// Transmit payload byte. The radio uses 0 for "on" and 1 for "off".
pub fn transmit_byte(on: bool) -> u8 {
    if on {
        0x00
    } else {
        0x01
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_bytes() {
        assert_eq!(Opcode::SetTransmit.byte(), 0x07);
        assert_eq!(Opcode::SetFrequency.byte(), 0x09);
        assert_eq!(Opcode::SetMode.byte(), 0x0A);
        assert_eq!(Opcode::QueryStatus.byte(), 0x0B);
    }

    #[test]
    fn test_from_byte() {
        for op in [
            Opcode::SetTransmit,
            Opcode::SetFrequency,
            Opcode::SetMode,
            Opcode::QueryStatus,
        ] {
            assert_eq!(Opcode::from_byte(op.byte()), Some(op));
        }
        assert_eq!(Opcode::from_byte(0x01), None);
    }

    #[test]
    fn test_command_response() {
        assert!(Opcode::QueryStatus.expects_response());
        assert!(!Opcode::SetFrequency.expects_response());
        assert!(!Opcode::SetTransmit.expects_response());
    }

    #[test]
    fn test_transmit_inverted() {
        assert_eq!(transmit_byte(true), 0x00);
        assert_eq!(transmit_byte(false), 0x01);
    }
}
