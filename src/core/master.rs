//! RTU master bound to one bus
//!
//! Wraps a [`Bus`] with the timing used for every exchange and offers one
//! method per supported function code. Each call is a single attempt; retry
//! policy belongs to the caller.

use super::bus::Bus;
use super::protocol::frame::{self, Frame, FrameError};
use super::protocol::Outcome;
use super::transaction::IdleMode;
use super::transport::{Connector, SerialConnector, SerialSettings};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing for RTU exchanges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtuTiming {
    /// Overall ceiling for one exchange, in milliseconds
    pub read_timeout_ms: u64,
    /// End-of-frame detection
    pub idle: IdleMode,
    /// Open the port on demand instead of reporting `PortNotOpen`
    pub auto_open: bool,
}

impl RtuTiming {
    /// Overall exchange ceiling
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for RtuTiming {
    fn default() -> Self {
        Self {
            read_timeout_ms: 5000,
            idle: IdleMode::default(),
            auto_open: false,
        }
    }
}

/// Modbus RTU master
pub struct RtuMaster {
    bus: Bus,
    timing: RtuTiming,
}

impl RtuMaster {
    /// Master on a real serial line
    pub fn new(settings: SerialSettings, timing: RtuTiming) -> Self {
        Self::with_connector(settings, timing, Box::new(SerialConnector))
    }

    /// Master opening its line through `connector`
    pub fn with_connector(settings: SerialSettings, timing: RtuTiming, connector: Box<dyn Connector>) -> Self {
        Self {
            bus: Bus::new(settings, connector),
            timing,
        }
    }

    /// The underlying bus, for open/close and event subscription
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Exchange timing
    pub fn timing(&self) -> &RtuTiming {
        &self.timing
    }

    /// Replace exchange timing
    pub fn set_timing(&mut self, timing: RtuTiming) {
        self.timing = timing;
    }

    /// Silence that ends a response at the current baud rate
    pub fn idle_threshold(&self) -> Duration {
        self.timing.idle.threshold(self.bus.settings().baud_rate)
    }

    /// Send a frame and wait for the response
    pub fn send_and_receive(&self, request: &Frame) -> Outcome {
        if self.timing.auto_open && !self.bus.is_open() {
            if let Err(e) = self.bus.open(false) {
                tracing::debug!(port = %self.bus.settings().port, "Auto-open failed: {}", e);
            }
        }
        let outcome = self.bus.send_and_receive(
            request.as_bytes(),
            self.timing.read_timeout(),
            self.idle_threshold(),
        );
        if let Outcome::Success(response) = &outcome {
            if !response.crc_valid() {
                tracing::warn!(
                    expected = format_args!("{:04X}", response.calc_crc()),
                    actual = format_args!("{:04X}", response.crc_out()),
                    "CRC mismatch in response"
                );
            }
        }
        outcome
    }

    /// Read Coils (0x01)
    pub fn read_coils(&self, slave: u8, start: u16, quantity: u16) -> Outcome {
        self.send_and_receive(&frame::read_coils(slave, start, quantity))
    }

    /// Read Discrete Inputs (0x02)
    pub fn read_discrete_inputs(&self, slave: u8, start: u16, quantity: u16) -> Outcome {
        self.send_and_receive(&frame::read_discrete_inputs(slave, start, quantity))
    }

    /// Read Holding Registers (0x03)
    pub fn read_holding_registers(&self, slave: u8, start: u16, quantity: u16) -> Outcome {
        self.send_and_receive(&frame::read_holding_registers(slave, start, quantity))
    }

    /// Read Input Registers (0x04)
    pub fn read_input_registers(&self, slave: u8, start: u16, quantity: u16) -> Outcome {
        self.send_and_receive(&frame::read_input_registers(slave, start, quantity))
    }

    /// Write Single Coil (0x05)
    pub fn write_single_coil(&self, slave: u8, address: u16, on: bool) -> Outcome {
        self.send_and_receive(&frame::write_single_coil(slave, address, on))
    }

    /// Write Single Register (0x06)
    pub fn write_single_register(&self, slave: u8, address: u16, value: u16) -> Outcome {
        self.send_and_receive(&frame::write_single_register(slave, address, value))
    }

    /// Write Multiple Coils (0x0F); nothing is sent when the count is out of range
    pub fn write_multiple_coils(&self, slave: u8, start: u16, coils: &[bool]) -> Result<Outcome, FrameError> {
        let request = frame::write_multiple_coils(slave, start, coils)?;
        Ok(self.send_and_receive(&request))
    }

    /// Write Multiple Registers (0x10); nothing is sent when the count is out of range
    pub fn write_multiple_registers(&self, slave: u8, start: u16, values: &[u16]) -> Result<Outcome, FrameError> {
        let request = frame::write_multiple_registers(slave, start, values)?;
        Ok(self.send_and_receive(&request))
    }
}
