//! Request frame construction
//!
//! A frame is `[address][function][payload...][crc lo][crc hi]`. Payload fields
//! are written big-endian, the register convention on the wire.

use super::checksum;
use super::modbus::{coil_value, pack_coils, FunctionCode, MAX_WRITE_COILS, MAX_WRITE_REGISTERS};
use std::fmt;
use thiserror::Error;

/// Request that cannot be expressed as a valid frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Value count outside what one request may carry
    #[error("{function}: quantity {quantity} outside 1..={max}")]
    QuantityOutOfRange {
        /// Function being built
        function: FunctionCode,
        /// Values supplied
        quantity: usize,
        /// Largest quantity allowed
        max: usize,
    },
}

fn check_quantity(function: FunctionCode, quantity: usize, max: usize) -> Result<u16, FrameError> {
    if quantity == 0 || quantity > max {
        return Err(FrameError::QuantityOutOfRange { function, quantity, max });
    }
    u16::try_from(quantity).map_err(|_| FrameError::QuantityOutOfRange { function, quantity, max })
}

/// A complete, CRC-terminated request frame ready to go on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    /// Wrap bytes that already carry their CRC
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Frame bytes including the CRC trailer
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Take ownership of the frame bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// Address byte
    pub fn address(&self) -> u8 {
        self.0.first().copied().unwrap_or(0)
    }

    /// Function code byte
    pub fn function(&self) -> u8 {
        self.0.get(1).copied().unwrap_or(0)
    }

    /// Frame length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the frame holds no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", super::hex_spaced(&self.0))
    }
}

/// Incremental builder for a request frame.
///
/// The address and function code are written on construction; `finalize`
/// consumes the encoder so the CRC can only be appended once.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    buf: Vec<u8>,
}

impl FrameEncoder {
    /// Start a frame for `address` with a raw function code
    pub fn new(address: u8, function_code: u8) -> Self {
        let mut buf = Vec::with_capacity(8);
        buf.push(address);
        buf.push(function_code);
        Self { buf }
    }

    /// Start a frame for one of the known function codes
    pub fn with_function(address: u8, function: FunctionCode) -> Self {
        Self::new(address, function.code())
    }

    /// Append a single byte
    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    /// Append a 16-bit value, high byte first
    pub fn write_u16_be(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a 32-bit value, most significant byte first
    pub fn write_i32_be(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append raw payload bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Bytes written so far, CRC not yet included
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Append the CRC over everything written and return the frame
    pub fn finalize(self) -> Frame {
        let mut buf = self.buf;
        checksum::append_crc(&mut buf);
        Frame(buf)
    }
}

// ============ Request builders ============

fn read_request(slave: u8, function: FunctionCode, start: u16, quantity: u16) -> Frame {
    let mut enc = FrameEncoder::with_function(slave, function);
    enc.write_u16_be(start).write_u16_be(quantity);
    enc.finalize()
}

/// Read Coils (0x01)
pub fn read_coils(slave: u8, start: u16, quantity: u16) -> Frame {
    read_request(slave, FunctionCode::ReadCoils, start, quantity)
}

/// Read Discrete Inputs (0x02)
pub fn read_discrete_inputs(slave: u8, start: u16, quantity: u16) -> Frame {
    read_request(slave, FunctionCode::ReadDiscreteInputs, start, quantity)
}

/// Read Holding Registers (0x03)
pub fn read_holding_registers(slave: u8, start: u16, quantity: u16) -> Frame {
    read_request(slave, FunctionCode::ReadHoldingRegisters, start, quantity)
}

/// Read Input Registers (0x04)
pub fn read_input_registers(slave: u8, start: u16, quantity: u16) -> Frame {
    read_request(slave, FunctionCode::ReadInputRegisters, start, quantity)
}

/// Write Single Coil (0x05)
pub fn write_single_coil(slave: u8, address: u16, on: bool) -> Frame {
    let mut enc = FrameEncoder::with_function(slave, FunctionCode::WriteSingleCoil);
    enc.write_u16_be(address).write_u16_be(coil_value(on));
    enc.finalize()
}

/// Write Single Register (0x06)
pub fn write_single_register(slave: u8, address: u16, value: u16) -> Frame {
    let mut enc = FrameEncoder::with_function(slave, FunctionCode::WriteSingleRegister);
    enc.write_u16_be(address).write_u16_be(value);
    enc.finalize()
}

/// Write Multiple Coils (0x0F), 1 to 1968 coils
pub fn write_multiple_coils(slave: u8, start: u16, coils: &[bool]) -> Result<Frame, FrameError> {
    let function = FunctionCode::WriteMultipleCoils;
    let quantity = check_quantity(function, coils.len(), MAX_WRITE_COILS)?;
    let packed = pack_coils(coils);
    // at most 246 bytes once the quantity is in range
    let byte_count = u8::try_from(packed.len()).map_err(|_| FrameError::QuantityOutOfRange {
        function,
        quantity: coils.len(),
        max: MAX_WRITE_COILS,
    })?;
    let mut enc = FrameEncoder::with_function(slave, function);
    enc.write_u16_be(start)
        .write_u16_be(quantity)
        .write_u8(byte_count)
        .write_bytes(&packed);
    Ok(enc.finalize())
}

/// Write Multiple Registers (0x10), 1 to 123 registers
pub fn write_multiple_registers(slave: u8, start: u16, values: &[u16]) -> Result<Frame, FrameError> {
    let function = FunctionCode::WriteMultipleRegisters;
    let quantity = check_quantity(function, values.len(), MAX_WRITE_REGISTERS)?;
    let byte_count = u8::try_from(values.len() * 2).map_err(|_| FrameError::QuantityOutOfRange {
        function,
        quantity: values.len(),
        max: MAX_WRITE_REGISTERS,
    })?;
    let mut enc = FrameEncoder::with_function(slave, function);
    enc.write_u16_be(start).write_u16_be(quantity).write_u8(byte_count);
    for &value in values {
        enc.write_u16_be(value);
    }
    Ok(enc.finalize())
}
