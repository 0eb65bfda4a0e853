//! rigctl command parsing
//!
//! One trimmed ASCII line per command, in the short single-letter form
//! hamlib's NET rigctl backend sends (`F14074000`, `M USB 2400`, `T1`, ...).

use std::fmt;
use thiserror::Error;

use crate::protocol::Mode;

/// `RPRT` code for success
pub const RPRT_OK: i32 = 0;

/// `RPRT` code for an invalid or unknown command
pub const RPRT_EINVAL: i32 = -1;

/// `RPRT` code for a failed device exchange
pub const RPRT_EIO: i32 = -6;

/// Reply to `f`; the radio's frequency is not read back yet
pub const STUB_FREQUENCY: &str = "14074000";

/// Reply to `t`
pub const STUB_TRANSMIT: &str = "0";

/// Reply to `v`
pub const IDENTITY: &str = "PMR-171";

/// Reply to `V`
pub const VERSION: &str = "1.0.0";

/// A parsed rigctl command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RigctlCommand {
    /// `F<hz>`
    SetFrequency(u32),
    /// `f`
    GetFrequency,
    /// `M <mode> <width>`; the width is accepted but not sent to the radio
    SetMode(Mode),
    /// `m`
    GetMode,
    /// `T<0|1>`
    SetTransmit(bool),
    /// `t`
    GetTransmit,
    /// `v`
    Identify,
    /// `V`
    Version,
    /// `q`
    Quit,
}

/// Lines the bridge cannot act on
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Not a command this bridge implements
    #[error("unknown command '{0}'")]
    Unknown(String),

    /// Known command with an unusable argument
    #[error("invalid argument for '{command}': '{arg}'")]
    InvalidArgument {
        /// Command letter
        command: char,
        /// Argument text as received
        arg: String,
    },
}

/// Parse one line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<RigctlCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let command = match line {
        "q" => RigctlCommand::Quit,
        "f" => RigctlCommand::GetFrequency,
        "m" => RigctlCommand::GetMode,
        "t" => RigctlCommand::GetTransmit,
        "v" => RigctlCommand::Identify,
        "V" => RigctlCommand::Version,
        _ if line.starts_with('F') => {
            let arg = line[1..].trim();
            let hz = arg.parse::<u32>().map_err(|_| ParseError::InvalidArgument {
                command: 'F',
                arg: arg.to_string(),
            })?;
            RigctlCommand::SetFrequency(hz)
        }
        _ if line.starts_with('M') => {
            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts.as_slice() {
                ["M", mode, _width] => RigctlCommand::SetMode(Mode::from_name(mode)),
                _ => {
                    return Err(ParseError::InvalidArgument {
                        command: 'M',
                        arg: line[1..].trim().to_string(),
                    })
                }
            }
        }
        // Anything but "1" releases the transmitter
        _ if line.starts_with('T') => RigctlCommand::SetTransmit(line[1..].trim() == "1"),
        _ => return Err(ParseError::Unknown(line.to_string())),
    };

    Ok(Some(command))
}

/// A reply line, sent with a trailing newline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `RPRT <code>`
    Report(i32),
    /// A bare value
    Value(String),
}

impl Reply {
    /// `RPRT 0`
    pub fn ok() -> Self {
        Reply::Report(RPRT_OK)
    }

    /// `RPRT -1`
    pub fn invalid() -> Self {
        Reply::Report(RPRT_EINVAL)
    }

    /// `RPRT -6`
    pub fn io_error() -> Self {
        Reply::Report(RPRT_EIO)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Report(code) => write!(f, "RPRT {code}"),
            Reply::Value(value) => f.write_str(value),
        }
    }
}
