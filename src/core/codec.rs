//! Command codec for the stand's wire vocabulary
//!
//! The stand speaks short CRLF-terminated ASCII lines. Outbound there are
//! exactly two forms: `CLEAR_ALL` and `INP_{pin}_{signal}`. Inbound lines are
//! free-form device text, forwarded trimmed. There is no acknowledgement or
//! checksum on either side.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

/// Logical class of test signal routed to a stand pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    /// Load driver line (`PLS`)
    Pls,
    /// Load sense line (`IPR`)
    Ipr,
    /// Short-circuit test line (`CLS`)
    Cls,
}

impl SignalType {
    /// Three-letter wire tag as the stand expects it
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Pls => "PLS",
            Self::Ipr => "IPR",
            Self::Cls => "CLS",
        }
    }

    /// All signal types, in display order
    pub fn all() -> &'static [SignalType] {
        &[Self::Pls, Self::Ipr, Self::Cls]
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SignalType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PLS" => Ok(Self::Pls),
            "IPR" => Ok(Self::Ipr),
            "CLS" => Ok(Self::Cls),
            _ => Err(CodecError::UnknownSignal(s.to_string())),
        }
    }
}

/// Pin numbers the stand can route to
pub const PIN_RANGE: RangeInclusive<u8> = 1..=3;

/// A single command for the stand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reset every routed output
    Clear,
    /// Route a signal to one pin
    Route {
        /// Signal class to route
        signal: SignalType,
        /// Target pin, valid range 1-3
        pin: u8,
    },
}

impl Command {
    /// Command text without the line terminator, as shown in logs
    pub fn text(&self) -> String {
        match self {
            Self::Clear => "CLEAR_ALL".to_string(),
            Self::Route { signal, pin } => format!("INP_{}_{}", pin, signal.tag()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Codec errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Pin outside the stand's range
    #[error("pin {0} is out of range (valid pins: 1-3)")]
    InvalidPin(u8),

    /// Signal tag not recognized
    #[error("unknown signal type: {0}")]
    UnknownSignal(String),
}

/// Encode a command to the exact byte sequence the stand expects.
///
/// Validation happens here, before any byte reaches the port: a pin outside
/// 1-3 yields [`CodecError::InvalidPin`] and no bytes. Signal validity is
/// already guaranteed by [`SignalType`] construction.
pub fn encode(command: &Command) -> Result<Vec<u8>, CodecError> {
    match command {
        Command::Clear => Ok(b"CLEAR_ALL\r\n".to_vec()),
        Command::Route { signal, pin } => {
            if !PIN_RANGE.contains(pin) {
                return Err(CodecError::InvalidPin(*pin));
            }
            Ok(format!("INP_{}_{}\r\n", pin, signal.tag()).into_bytes())
        }
    }
}

/// Decode an inbound line to display text.
///
/// Non-ASCII bytes are dropped rather than failing the line; trailing line
/// terminators and surrounding whitespace are trimmed. Returns `None` when
/// nothing remains, in which case the line is suppressed entirely.
pub fn decode_line(raw: &[u8]) -> Option<String> {
    let text: String = raw
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_clear_exact_bytes() {
        assert_eq!(encode(&Command::Clear).unwrap(), b"CLEAR_ALL\r\n");
    }

    #[test]
    fn test_encode_route_exact_bytes() {
        let cmd = Command::Route {
            signal: SignalType::Pls,
            pin: 1,
        };
        assert_eq!(encode(&cmd).unwrap(), b"INP_1_PLS\r\n");

        let cmd = Command::Route {
            signal: SignalType::Cls,
            pin: 3,
        };
        assert_eq!(encode(&cmd).unwrap(), b"INP_3_CLS\r\n");
    }

    #[test]
    fn test_encode_rejects_out_of_range_pins() {
        for pin in [0u8, 4, 9, 255] {
            let cmd = Command::Route {
                signal: SignalType::Ipr,
                pin,
            };
            assert_eq!(encode(&cmd), Err(CodecError::InvalidPin(pin)));
        }
    }

    #[test]
    fn test_signal_parse() {
        assert_eq!("PLS".parse::<SignalType>().unwrap(), SignalType::Pls);
        assert_eq!("ipr".parse::<SignalType>().unwrap(), SignalType::Ipr);
        assert!(matches!(
            "XYZ".parse::<SignalType>(),
            Err(CodecError::UnknownSignal(_))
        ));
    }

    #[test]
    fn test_command_text() {
        assert_eq!(Command::Clear.text(), "CLEAR_ALL");
        let cmd = Command::Route {
            signal: SignalType::Ipr,
            pin: 2,
        };
        assert_eq!(cmd.text(), "INP_2_IPR");
    }

    #[test]
    fn test_decode_trims_line_terminators() {
        assert_eq!(decode_line(b"OK\r\n").as_deref(), Some("OK"));
        assert_eq!(decode_line(b"  READY  \r\n").as_deref(), Some("READY"));
    }

    #[test]
    fn test_decode_drops_non_ascii() {
        assert_eq!(decode_line(b"V\xffAL\r\n").as_deref(), Some("VAL"));
    }

    #[test]
    fn test_decode_suppresses_empty_lines() {
        assert_eq!(decode_line(b"\r\n"), None);
        assert_eq!(decode_line(b"   \r\n"), None);
        assert_eq!(decode_line(b""), None);
    }
}
