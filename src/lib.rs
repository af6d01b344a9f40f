//! # rtupoll Core Library
//!
//! A Modbus RTU master transaction engine for serial buses:
//! - CRC-16/Modbus framing and request builders
//! - One-exchange-at-a-time bus ownership with open/close notifications
//! - Idle-silence response framing derived from the line's baud rate
//! - Response decoding with the byte orders real devices use
//! - Line-terminated ASCII exchanges and an ADAM-4055 DI/DO driver
//!
//! ## Example
//!
//! ```rust,no_run
//! use rtupoll_core::{RtuMaster, RtuTiming, SerialSettings};
//!
//! let master = RtuMaster::new(SerialSettings::new("COM3", 9600), RtuTiming::default());
//! master.bus().open(false)?;
//!
//! let outcome = master.read_holding_registers(1, 0, 2);
//! if let Some(response) = outcome.response() {
//!     let mut cursor = response.cursor();
//!     println!("value = {}", cursor.read_i32_be());
//! }
//! # Ok::<(), rtupoll_core::TransportError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, ConfigError};
pub use crate::core::adam::{Adam4055, AdamError, IoStatus};
pub use crate::core::ascii::{AsciiLink, AsciiOutcome, AsciiReply};
pub use crate::core::bus::{Bus, PortEvent, PortState};
pub use crate::core::master::{RtuMaster, RtuTiming};
pub use crate::core::protocol::{
    crc16_modbus, DecodeCursor, DecodeError, ExceptionCode, Frame, FrameEncoder, FrameError, FunctionCode, Outcome, Response,
    Timing,
};
pub use crate::core::transaction::{idle_threshold, IdleMode};
pub use crate::core::transport::{
    Connector, SerialConnector, SerialParity, SerialSettings, SerialStopBits, Transport, TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
