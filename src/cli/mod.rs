//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Exit codes for automation
//! - Output formatting for poll results

pub mod exit_codes;
pub mod output;

pub use exit_codes::{exit_code_description, CliResult, ExitCodes};
pub use output::{format_ascii, format_outcome, format_status, DataView, OutputFormat};
