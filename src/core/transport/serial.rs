//! Serial port transport implementation

use super::{Connector, Transport, TransportError};
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

/// Read timeout handed to the driver; reads only happen once bytes are waiting
const DRIVER_TIMEOUT: Duration = Duration::from_millis(10);

/// Serial port parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

impl std::str::FromStr for SerialParity {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "odd" | "o" => Ok(Self::Odd),
            "even" | "e" => Ok(Self::Even),
            other => Err(TransportError::InvalidConfiguration(format!(
                "unknown parity: {other}"
            ))),
        }
    }
}

impl fmt::Display for SerialParity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Odd => write!(f, "Odd"),
            Self::Even => write!(f, "Even"),
        }
    }
}

/// Serial port stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialStopBits {
    /// One stop bit
    #[default]
    One,
    /// Two stop bits
    Two,
}

impl std::str::FromStr for SerialStopBits {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1" | "one" => Ok(Self::One),
            "2" | "two" => Ok(Self::Two),
            other => Err(TransportError::InvalidConfiguration(format!(
                "unknown stop bits: {other}"
            ))),
        }
    }
}

impl fmt::Display for SerialStopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "One"),
            Self::Two => write!(f, "Two"),
        }
    }
}

/// Serial line configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Port name (e.g., COM3, /dev/ttyUSB0)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Parity
    pub parity: SerialParity,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits
    pub stop_bits: SerialStopBits,
}

impl SerialSettings {
    /// Create settings with 8 data bits, no parity, one stop bit
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            parity: SerialParity::None,
            data_bits: 8,
            stop_bits: SerialStopBits::One,
        }
    }

    /// Set parity
    #[must_use]
    pub fn parity(mut self, parity: SerialParity) -> Self {
        self.parity = parity;
        self
    }

    /// Set data bits
    #[must_use]
    pub fn data_bits(mut self, bits: u8) -> Self {
        self.data_bits = bits;
        self
    }

    /// Set stop bits
    #[must_use]
    pub fn stop_bits(mut self, bits: SerialStopBits) -> Self {
        self.stop_bits = bits;
        self
    }

    fn driver_data_bits(&self) -> Result<DataBits, TransportError> {
        match self.data_bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(TransportError::InvalidConfiguration(format!(
                "unsupported data bits: {other}"
            ))),
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self::new("COM1", 38400)
    }
}

impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}",
            self.port, self.baud_rate, self.parity, self.data_bits, self.stop_bits
        )
    }
}

/// Opens real serial lines through the `serialport` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn connect(&self, settings: &SerialSettings) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(SerialTransport::open(settings)?))
    }
}

/// Serial port transport
pub struct SerialTransport {
    name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open the port described by `settings`
    pub fn open(settings: &SerialSettings) -> Result<Self, TransportError> {
        let parity = match settings.parity {
            SerialParity::Odd => Parity::Odd,
            SerialParity::Even => Parity::Even,
            SerialParity::None => Parity::None,
        };

        let stop_bits = match settings.stop_bits {
            SerialStopBits::Two => StopBits::Two,
            SerialStopBits::One => StopBits::One,
        };

        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(settings.driver_data_bits()?)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(FlowControl::None)
            .timeout(DRIVER_TIMEOUT)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => TransportError::PortNotFound(settings.port.clone()),
                serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                    TransportError::PermissionDenied(settings.port.clone())
                }
                serialport::ErrorKind::InvalidInput => {
                    TransportError::InvalidConfiguration(e.to_string())
                }
                _ => TransportError::OpenFailed(e.to_string()),
            })?;

        Ok(Self {
            name: port.name().unwrap_or_else(|| settings.port.clone()),
            port: Some(port),
        })
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::NotConnected)
    }
}

fn driver_error(e: serialport::Error) -> TransportError {
    TransportError::IoError(e.into())
}

impl Transport for SerialTransport {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        let waiting = self.port()?.bytes_to_read().map_err(driver_error)?;
        Ok(waiting as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(TransportError::IoError(e)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port()?;
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        self.port()?.clear(ClearBuffer::Input).map_err(driver_error)
    }

    fn discard_output(&mut self) -> Result<(), TransportError> {
        self.port()?.clear(ClearBuffer::Output).map_err(driver_error)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.port.take() {
            Some(port) => {
                drop(port);
                Ok(())
            }
            None => Err(TransportError::NotConnected),
        }
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(driver_error)
}
