//! Output formatting for poll results

use crate::core::adam::IoStatus;
use crate::core::ascii::AsciiOutcome;
use crate::core::protocol::{hex_spaced, Outcome};
use serde_json::json;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per result
    Json,
    /// Received bytes as hex only
    Hex,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "hex" => Ok(Self::Hex),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// How the data area of a response is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataView {
    /// 16-bit registers (0x03/0x04)
    Registers,
    /// Packed bits (0x01/0x02), with the requested count
    Bits(usize),
    /// Frame only, no interpretation
    Raw,
}

/// Render an RTU outcome
pub fn format_outcome(outcome: &Outcome, view: DataView, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => text_outcome(outcome, view),
        OutputFormat::Json => json_outcome(outcome, view).to_string(),
        OutputFormat::Hex => match outcome {
            Outcome::Success(response) => hex_spaced(response.data()),
            Outcome::Timeout { partial } => hex_spaced(partial),
            _ => String::new(),
        },
    }
}

fn text_outcome(outcome: &Outcome, view: DataView) -> String {
    let Outcome::Success(response) = outcome else {
        return outcome.to_string();
    };
    let mut out = response.to_string();
    if let Some(function) = response.function() {
        out.push_str(&format!("\nFunc : {function}"));
    }
    if !response.is_read_data() || !response.crc_valid() {
        return out;
    }
    match view {
        DataView::Registers => {
            for (i, value) in response.registers().iter().enumerate() {
                out.push_str(&format!("\n[{i:>3}] {value:>5} (0x{value:04X})"));
            }
        }
        DataView::Bits(count) => {
            for (i, bit) in response.bits(count).iter().enumerate() {
                out.push_str(&format!("\n[{i:>3}] {}", u8::from(*bit)));
            }
        }
        DataView::Raw => {}
    }
    out
}

fn json_outcome(outcome: &Outcome, view: DataView) -> serde_json::Value {
    match outcome {
        Outcome::Success(response) => {
            let timing = response.timing();
            let mut value = json!({
                "status": "success",
                "begin": timing.begin.to_rfc3339(),
                "elapsed_ms": timing.to_last_byte.as_secs_f64() * 1000.0,
                "total_ms": timing.total.as_secs_f64() * 1000.0,
                "request": hex::encode_upper(response.request()),
                "response": hex::encode_upper(response.data()),
                "crc_valid": response.crc_valid(),
            });
            if let Some(function) = response.function() {
                value["function"] = json!(function.name());
            }
            if let Some(exception) = response.exception() {
                value["exception"] = json!(exception.name());
            } else if response.is_read_data() && response.crc_valid() {
                match view {
                    DataView::Registers => value["registers"] = json!(response.registers()),
                    DataView::Bits(count) => value["bits"] = json!(response.bits(count)),
                    DataView::Raw => {}
                }
            }
            value
        }
        Outcome::PortNotOpen => json!({ "status": "port_not_open" }),
        Outcome::Timeout { partial } => json!({
            "status": "timeout",
            "partial": hex::encode_upper(partial),
        }),
        Outcome::Fault(e) => json!({ "status": "fault", "error": e.to_string() }),
    }
}

/// Render a text exchange outcome
pub fn format_ascii(outcome: &AsciiOutcome, format: OutputFormat) -> String {
    match (outcome, format) {
        (AsciiOutcome::Success(reply), OutputFormat::Json) => json!({
            "status": "success",
            "sent": reply.sent,
            "received": reply.received,
            "elapsed_ms": reply.timing.to_last_byte.as_secs_f64() * 1000.0,
        })
        .to_string(),
        (AsciiOutcome::Success(reply), OutputFormat::Hex) => hex_spaced(reply.received.as_bytes()),
        (AsciiOutcome::Success(reply), OutputFormat::Text) => reply.received.clone(),
        (AsciiOutcome::PortNotOpen, OutputFormat::Json) => json!({ "status": "port_not_open" }).to_string(),
        (AsciiOutcome::PortNotOpen, _) => "Port not open".to_string(),
        (AsciiOutcome::Timeout { partial }, OutputFormat::Json) => {
            json!({ "status": "timeout", "partial": partial }).to_string()
        }
        (AsciiOutcome::Timeout { .. }, _) => "Timeout".to_string(),
        (AsciiOutcome::Fault(e), OutputFormat::Json) => {
            json!({ "status": "fault", "error": e.to_string() }).to_string()
        }
        (AsciiOutcome::Fault(e), _) => format!("Transport fault: {e}"),
    }
}

/// Render a DI/DO status
pub fn format_status(status: &IoStatus, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json!({
            "inputs": status.inputs,
            "outputs": status.outputs,
        })
        .to_string(),
        OutputFormat::Hex => format!("{:02X} {:02X}", status.outputs, status.inputs),
        OutputFormat::Text => format!("DO: {:08b}  DI: {:08b}", status.outputs, status.inputs),
    }
}
