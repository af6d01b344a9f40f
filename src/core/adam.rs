//! ADAM-4055 digital I/O module
//!
//! The module speaks a CR-terminated ASCII protocol:
//! - `$AA6` reads status, answered by `!OOII00` (outputs, inputs in hex)
//! - `#AA00VV` sets all eight outputs
//!
//! The last read values are cached so callers can test single bits without
//! another round trip.

use super::ascii::{exchange_line, AsciiOutcome};
use super::bus::Bus;
use super::transport::{Connector, SerialConnector, SerialSettings, Transport, TransportError};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use thiserror::Error;

const TERMINATOR: &str = "\r";

/// DI/DO driver errors
#[derive(Error, Debug)]
pub enum AdamError {
    /// The port could not be opened
    #[error("Port not open")]
    PortNotOpen,

    /// No reply before the deadline
    #[error("Timeout waiting for module {0:02X}")]
    Timeout(u8),

    /// Reply did not have the expected shape
    #[error("Malformed reply: {0:?}")]
    Malformed(String),

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Input and output state read from the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoStatus {
    /// Digital inputs, bit 0 = DI0
    pub inputs: u8,
    /// Digital outputs, bit 0 = DO0
    pub outputs: u8,
}

/// When and how long the last exchange took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    /// Completion time
    pub at: DateTime<Local>,
    /// Round-trip duration
    pub elapsed: Duration,
}

/// ADAM-4055 on its own bus
pub struct Adam4055 {
    bus: Bus,
    address: u8,
    read_timeout: Duration,
    inputs: AtomicU8,
    outputs: AtomicU8,
    last_read: Mutex<Option<Stamp>>,
    last_write: Mutex<Option<Stamp>>,
}

impl Adam4055 {
    /// Module at `address` on a real serial line
    pub fn new(settings: SerialSettings, address: u8, read_timeout: Duration) -> Self {
        Self::with_connector(settings, address, read_timeout, Box::new(SerialConnector))
    }

    /// Module opening its line through `connector`
    pub fn with_connector(
        settings: SerialSettings,
        address: u8,
        read_timeout: Duration,
        connector: Box<dyn Connector>,
    ) -> Self {
        Self {
            bus: Bus::new(settings, connector),
            address,
            read_timeout,
            inputs: AtomicU8::new(0),
            outputs: AtomicU8::new(0),
            last_read: Mutex::new(None),
            last_write: Mutex::new(None),
        }
    }

    /// The underlying bus
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Module address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Last read input byte
    pub fn inputs(&self) -> u8 {
        self.inputs.load(Ordering::Acquire)
    }

    /// Last read or written output byte
    pub fn outputs(&self) -> u8 {
        self.outputs.load(Ordering::Acquire)
    }

    /// Cached state of input `bit`
    pub fn input(&self, bit: u8) -> bool {
        bit < 8 && self.inputs() & (1 << bit) != 0
    }

    /// Cached state of output `bit`
    pub fn output(&self, bit: u8) -> bool {
        bit < 8 && self.outputs() & (1 << bit) != 0
    }

    /// Completion stamp of the last successful status read
    pub fn last_read(&self) -> Option<Stamp> {
        *self.last_read.lock()
    }

    /// Completion stamp of the last successful output write
    pub fn last_write(&self) -> Option<Stamp> {
        *self.last_write.lock()
    }

    /// Read inputs and outputs from the module
    pub fn status(&self) -> Result<IoStatus, AdamError> {
        self.locked(|port| self.read_status(port))
    }

    /// Set all eight outputs
    pub fn set_outputs(&self, value: u8) -> Result<(), AdamError> {
        self.locked(|port| self.write_outputs(port, value))
    }

    /// Switch a single output, leaving the others as the module reports them
    pub fn set_output(&self, bit: u8, on: bool) -> Result<(), AdamError> {
        if bit >= 8 {
            return Err(AdamError::Malformed(format!("output bit {bit} out of range")));
        }
        self.locked(|port| {
            let current = self.read_status(port)?.outputs;
            let mask = 1u8 << bit;
            let next = if on { current | mask } else { current & !mask };
            self.write_outputs(port, next)
        })
    }

    fn locked<R>(
        &self,
        f: impl FnOnce(&mut dyn Transport) -> Result<R, AdamError>,
    ) -> Result<R, AdamError> {
        if !self.bus.is_open() {
            self.bus.open_silent(false)?;
        }
        self.bus.with_port(f).unwrap_or(Err(AdamError::PortNotOpen))
    }

    fn exchange(&self, port: &mut dyn Transport, command: &str) -> Result<(String, Duration), AdamError> {
        match exchange_line(port, command, TERMINATOR, self.read_timeout) {
            AsciiOutcome::Success(reply) => Ok((reply.received, reply.timing.total)),
            AsciiOutcome::Timeout { .. } => Err(AdamError::Timeout(self.address)),
            AsciiOutcome::PortNotOpen => Err(AdamError::PortNotOpen),
            AsciiOutcome::Fault(e) => Err(AdamError::Transport(e)),
        }
    }

    fn read_status(&self, port: &mut dyn Transport) -> Result<IoStatus, AdamError> {
        let (reply, elapsed) = self.exchange(port, &format!("${:02X}6", self.address))?;
        let status = parse_status(&reply)?;
        self.inputs.store(status.inputs, Ordering::Release);
        self.outputs.store(status.outputs, Ordering::Release);
        *self.last_read.lock() = Some(Stamp {
            at: Local::now(),
            elapsed,
        });
        tracing::debug!(
            address = self.address,
            outputs = format_args!("{:02X}", status.outputs),
            inputs = format_args!("{:02X}", status.inputs),
            "Status"
        );
        Ok(status)
    }

    fn write_outputs(&self, port: &mut dyn Transport, value: u8) -> Result<(), AdamError> {
        let (_, elapsed) = self.exchange(port, &format!("#{:02X}00{:02X}", self.address, value))?;
        self.outputs.store(value, Ordering::Release);
        *self.last_write.lock() = Some(Stamp {
            at: Local::now(),
            elapsed,
        });
        Ok(())
    }
}

/// Parse a `!OOII00` status reply
pub fn parse_status(reply: &str) -> Result<IoStatus, AdamError> {
    let malformed = || AdamError::Malformed(reply.to_string());
    if !reply.is_ascii() || !reply.starts_with('!') || reply.len() != 7 {
        return Err(malformed());
    }
    let outputs = u8::from_str_radix(&reply[1..3], 16).map_err(|_| malformed())?;
    let inputs = u8::from_str_radix(&reply[3..5], 16).map_err(|_| malformed())?;
    Ok(IoStatus { inputs, outputs })
}
