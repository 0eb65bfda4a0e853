//! Operating modes
//!
//! Constant mapping between rigctl mode names and PMR-171 mode identifiers.

use std::fmt;

/// Radio operating mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Usb,
    Lsb,
    Cwr,
    Cwl,
    Am,
    Wfm,
    Nfm,
    Digi,
    Pkt,
}

/// Every mode, indexed by its device identifier
const MODE_TABLE: [(Mode, &str); 9] = [
    (Mode::Usb, "USB"),
    (Mode::Lsb, "LSB"),
    (Mode::Cwr, "CWR"),
    (Mode::Cwl, "CWL"),
    (Mode::Am, "AM"),
    (Mode::Wfm, "WFM"),
    (Mode::Nfm, "NFM"),
    (Mode::Digi, "DIGI"),
    (Mode::Pkt, "PKT"),
];

impl Mode {
    /// All modes in identifier order
    pub const ALL: [Mode; 9] = [
        Mode::Usb,
        Mode::Lsb,
        Mode::Cwr,
        Mode::Cwl,
        Mode::Am,
        Mode::Wfm,
        Mode::Nfm,
        Mode::Digi,
        Mode::Pkt,
    ];

    /// Device identifier (0-8)
    pub fn id(self) -> u8 {
        self as u8
    }

    /// rigctl mode name
    pub fn name(self) -> &'static str {
        MODE_TABLE[self as usize].1
    }

    /// Look up a mode by identifier. Unknown identifiers fall back to USB.
    pub fn from_id(id: u8) -> Self {
        MODE_TABLE
            .get(id as usize)
            .map(|(mode, _)| *mode)
            .unwrap_or(Mode::Usb)
    }

    /// Look up a mode by name, ignoring case. Unknown names fall back to USB.
    pub fn from_name(name: &str) -> Self {
        MODE_TABLE
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(mode, _)| *mode)
            .unwrap_or(Mode::Usb)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mode name to device identifier (case-insensitive, unknown → 0)
pub fn mode_name_to_id(name: &str) -> u8 {
    Mode::from_name(name).id()
}

/// Device identifier to mode name (unknown → "USB")
pub fn mode_id_to_name(id: u8) -> &'static str {
    Mode::from_id(id).name()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_are_stable() {
        let ids: Vec<u8> = Mode::ALL.iter().map(|m| m.id()).collect();
        assert_eq!(ids, (0..9).collect::<Vec<u8>>());
        assert_eq!(Mode::Digi.id(), 7);
        assert_eq!(Mode::Pkt.name(), "PKT");
    }

    #[test]
    fn test_lookups_are_inverse() {
        for mode in Mode::ALL {
            assert_eq!(mode_name_to_id(mode_id_to_name(mode.id())), mode.id());
            assert_eq!(mode_id_to_name(mode_name_to_id(mode.name())), mode.name());
        }
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(mode_name_to_id("lsb"), 1);
        assert_eq!(mode_name_to_id("Digi"), 7);
        assert_eq!(Mode::from_name("cWl"), Mode::Cwl);
    }

    #[test]
    fn test_unknown_falls_back_to_usb() {
        assert_eq!(mode_name_to_id("FM"), 0);
        assert_eq!(mode_name_to_id(""), 0);
        assert_eq!(mode_id_to_name(9), "USB");
        assert_eq!(mode_id_to_name(0xFF), "USB");
    }

    #[test]
    fn test_display() {
        assert_eq!(Mode::Wfm.to_string(), "WFM");
        assert_eq!(Mode::default(), Mode::Usb);
    }
}
