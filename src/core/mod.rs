//! Core module containing the bus master functionality
//!
//! This module provides:
//! - Transport layer for the serial line
//! - Bus ownership with open/close lifecycle and exclusive access
//! - Modbus RTU framing, CRC and response decoding
//! - Silence-framed request/response exchange
//! - RTU master facade with typed requests
//! - Line-terminated ASCII exchange
//! - ADAM-4055 digital I/O driver

pub mod adam;
pub mod ascii;
pub mod bus;
pub mod master;
pub mod protocol;
pub mod transaction;
pub mod transport;
