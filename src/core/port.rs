//! Serial port parameters and acquisition
//!
//! Wraps the `serialport` crate behind the small [`RawPort`] seam so the
//! session and reader can be driven by an in-memory port in tests. The
//! production path is [`open`], which maps OS-level failures to
//! [`ConnectError`] variants at the boundary.

use serde::{Deserialize, Serialize};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;
use thiserror::Error;

/// Serial parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PortParity {
    /// No parity
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

/// Serial connection parameters
///
/// The stand is fixed at 9600 8N1 with a one second read timeout; the
/// fields exist so bench variants can be configured, never negotiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Parity
    pub parity: PortParity,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Read timeout on the open handle, in milliseconds
    pub read_timeout_ms: u64,
}

impl PortConfig {
    /// Create the stand's default parameters: 9600 8N1, 1 s timeout
    pub fn new() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            parity: PortParity::None,
            stop_bits: 1,
            read_timeout_ms: 1000,
        }
    }

    /// Set baud rate
    #[must_use]
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set data bits
    #[must_use]
    pub fn data_bits(mut self, bits: u8) -> Self {
        self.data_bits = bits;
        self
    }

    /// Set parity
    #[must_use]
    pub fn parity(mut self, parity: PortParity) -> Self {
        self.parity = parity;
        self
    }

    /// Set stop bits
    #[must_use]
    pub fn stop_bits(mut self, bits: u8) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Set the read timeout
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Read timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure to acquire a port
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Named port does not exist
    #[error("port not found: {0}")]
    PortNotFound(String),

    /// OS denied access; on most platforms this is also what a port held
    /// by another process reports
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// This session already holds an open port
    #[error("already connected")]
    AlreadyConnected,

    /// Any other open failure, with the OS message
    #[error("connection failed: {0}")]
    Failed(String),
}

/// Minimal synchronous interface over an open serial handle
///
/// Mirrors the calls the session and reader actually make. All four are
/// prompt OS calls; none may park the calling thread beyond the configured
/// read timeout. The production implementation is [`NativePort`]; tests
/// substitute an in-memory double.
pub trait RawPort: Send {
    /// Number of bytes waiting in the OS receive buffer
    fn bytes_to_read(&mut self) -> std::io::Result<u32>;

    /// Read available bytes, bounded by the configured timeout
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Write the whole buffer
    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// Push buffered bytes out to the device
    fn flush(&mut self) -> std::io::Result<()>;
}

/// Production [`RawPort`] over a `serialport` handle
pub struct NativePort {
    inner: Box<dyn SerialPort>,
}

impl RawPort for NativePort {
    fn bytes_to_read(&mut self) -> std::io::Result<u32> {
        self.inner.bytes_to_read().map_err(Into::into)
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Open the named port with the given parameters.
pub fn open(port_name: &str, config: &PortConfig) -> Result<NativePort, ConnectError> {
    let data_bits = match config.data_bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    };

    let stop_bits = match config.stop_bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    };

    let parity = match config.parity {
        PortParity::Odd => Parity::Odd,
        PortParity::Even => Parity::Even,
        PortParity::None => Parity::None,
    };

    let inner = serialport::new(port_name, config.baud_rate)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(parity)
        .flow_control(FlowControl::None)
        .timeout(config.timeout())
        .open()
        .map_err(|e| match e.kind() {
            serialport::ErrorKind::NoDevice => ConnectError::PortNotFound(port_name.to_string()),
            serialport::ErrorKind::Io(io_kind) => match io_kind {
                std::io::ErrorKind::NotFound => ConnectError::PortNotFound(port_name.to_string()),
                std::io::ErrorKind::PermissionDenied => {
                    ConnectError::PermissionDenied(port_name.to_string())
                }
                _ => ConnectError::Failed(e.to_string()),
            },
            _ => ConnectError::Failed(e.to_string()),
        })?;

    Ok(NativePort { inner })
}

/// List serial ports visible to the OS.
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, ConnectError> {
    serialport::available_ports().map_err(|e| ConnectError::Failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_stand() {
        let config = PortConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.parity, PortParity::None);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_config_builder() {
        let config = PortConfig::new()
            .baud_rate(19200)
            .parity(PortParity::Even)
            .read_timeout(Duration::from_millis(250));
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.parity, PortParity::Even);
        assert_eq!(config.read_timeout_ms, 250);
    }

    #[test]
    fn test_open_missing_port_fails() {
        let result = open("/dev/pinroute-no-such-port", &PortConfig::default());
        assert!(result.is_err());
    }
}
