//! Modbus RTU protocol
//!
//! Provides encoders, decoders, and helpers for the RTU wire format:
//! - CRC-16/Modbus checksum
//! - Function and exception codes
//! - Request frame construction
//! - Outcome and response decoding with device byte-order conventions

pub mod checksum;
pub mod frame;
pub mod modbus;
pub mod response;

pub use checksum::{crc16_modbus, verify_crc};
pub use frame::{Frame, FrameEncoder, FrameError};
pub use modbus::{ExceptionCode, FunctionCode};
pub use response::{DecodeCursor, DecodeError, Outcome, Response, Timing};

/// Format bytes as upper-case hex pairs separated by spaces
pub fn hex_spaced(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}
