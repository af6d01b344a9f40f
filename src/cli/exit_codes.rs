//! CLI Exit Codes
//!
//! Standard exit codes for CLI operations and automation.

use crate::core::adam::AdamError;
use crate::core::ascii::AsciiOutcome;
use crate::core::protocol::Outcome;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Port could not be opened
    pub const CONNECTION_FAILED: u8 = 3;

    /// No response in time
    pub const TIMEOUT: u8 = 4;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// CRC mismatch, exception response or malformed reply
    pub const PROTOCOL_ERROR: u8 = 9;

    /// User cancelled
    pub const CANCELLED: u8 = 11;

    /// Port not found
    pub const PORT_NOT_FOUND: u8 = 14;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    pub fn success() -> Self {
        Self::Success(None)
    }

    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::TIMEOUT, msg.into())
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::PROTOCOL_ERROR, msg.into())
    }

    /// Classify an RTU outcome
    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Success(response) if !response.crc_valid() => Self::protocol_error(format!(
                "CRC mismatch: expected {:04X}, received {:04X}",
                response.calc_crc(),
                response.crc_out()
            )),
            Outcome::Success(response) if response.is_exception() => {
                let detail = response
                    .exception()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| format!("code 0x{:02X}", response.data().get(2).copied().unwrap_or(0)));
                Self::protocol_error(format!("Exception response: {detail}"))
            }
            Outcome::Success(_) => Self::success(),
            Outcome::PortNotOpen => Self::error(ExitCodes::CONNECTION_FAILED, "Port not open"),
            Outcome::Timeout { .. } => Self::timeout("No response before timeout"),
            Outcome::Fault(e) => Self::from(e),
        }
    }

    /// Classify a text exchange outcome
    pub fn from_ascii(outcome: &AsciiOutcome) -> Self {
        match outcome {
            AsciiOutcome::Success(_) => Self::success(),
            AsciiOutcome::PortNotOpen => Self::error(ExitCodes::CONNECTION_FAILED, "Port not open"),
            AsciiOutcome::Timeout { .. } => Self::timeout("No reply before timeout"),
            AsciiOutcome::Fault(e) => Self::from(e),
        }
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) => Some(msg),
            Self::Error(_, msg) => Some(msg),
            _ => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<&TransportError> for CliResult {
    fn from(err: &TransportError) -> Self {
        let code = match err {
            TransportError::PortNotFound(_) => ExitCodes::PORT_NOT_FOUND,
            TransportError::PermissionDenied(_) => ExitCodes::PERMISSION_DENIED,
            TransportError::InvalidConfiguration(_) => ExitCodes::CONFIG_ERROR,
            TransportError::OpenFailed(_) | TransportError::NotConnected => ExitCodes::CONNECTION_FAILED,
            TransportError::IoError(e) if e.kind() == std::io::ErrorKind::TimedOut => ExitCodes::TIMEOUT,
            TransportError::IoError(_) => ExitCodes::ERROR,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<&AdamError> for CliResult {
    fn from(err: &AdamError) -> Self {
        match err {
            AdamError::PortNotOpen => Self::error(ExitCodes::CONNECTION_FAILED, err.to_string()),
            AdamError::Timeout(_) => Self::timeout(err.to_string()),
            AdamError::Malformed(_) => Self::protocol_error(err.to_string()),
            AdamError::Transport(e) => Self::from(e),
        }
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        4 => "Timeout",
        7 => "Permission denied",
        8 => "Configuration error",
        9 => "Protocol error",
        11 => "Operation cancelled",
        14 => "Port not found",
        _ => "Unknown error",
    }
}
