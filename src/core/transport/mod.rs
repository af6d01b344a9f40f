//! Transport layer for the serial bus
//!
//! The engine only needs a handful of primitives from the physical line:
//! - query how many bytes are waiting
//! - read what is waiting, write a whole frame
//! - drop stale input/output
//! - close
//!
//! [`Connector`] opens a [`Transport`] from [`SerialSettings`]; the serial
//! implementation lives in [`serial`], tests substitute their own.

mod serial;

pub use serial::{list_ports, SerialConnector, SerialParity, SerialSettings, SerialStopBits, SerialTransport};

use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Opening the port failed for another reason
    #[error("Open failed: {0}")]
    OpenFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Byte-level access to an open line
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Name of the underlying port
    fn name(&self) -> String;

    /// Number of received bytes waiting to be read
    fn bytes_available(&mut self) -> Result<usize, TransportError>;

    /// Read waiting bytes into `buf`, returning how many were read
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write the whole buffer
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Drop anything received but not yet read
    fn discard_input(&mut self) -> Result<(), TransportError>;

    /// Drop anything queued but not yet sent
    fn discard_output(&mut self) -> Result<(), TransportError>;

    /// Release the line
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports for a given line configuration
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send + Sync {
    /// Open the line described by `settings`
    fn connect(&self, settings: &SerialSettings) -> Result<Box<dyn Transport>, TransportError>;
}
