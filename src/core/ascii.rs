//! Line-terminated ASCII exchanges
//!
//! Some modules answer in plain text ended by a terminator such as CR. The
//! exchange follows the same lock and discard discipline as RTU but completes
//! on the terminator instead of line silence.

use super::bus::Bus;
use super::protocol::Timing;
use super::transport::{Connector, SerialConnector, SerialSettings, Transport, TransportError};
use chrono::Local;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A completed text exchange
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiReply {
    /// Command as given, without terminator
    pub sent: String,
    /// Reply text with the terminator stripped
    pub received: String,
    /// Exchange timing
    pub timing: Timing,
}

/// Result of one text exchange
#[derive(Debug)]
pub enum AsciiOutcome {
    /// Terminated reply received
    Success(AsciiReply),
    /// No port was open; nothing was written
    PortNotOpen,
    /// No terminated reply before the deadline
    Timeout {
        /// Text received so far
        partial: String,
    },
    /// The transport failed mid-exchange
    Fault(TransportError),
}

impl AsciiOutcome {
    /// True for `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, AsciiOutcome::Success(_))
    }

    /// True for `Timeout`
    pub fn is_timeout(&self) -> bool {
        matches!(self, AsciiOutcome::Timeout { .. })
    }

    /// Reply text of a successful exchange
    pub fn reply(&self) -> Option<&str> {
        match self {
            AsciiOutcome::Success(reply) => Some(&reply.received),
            _ => None,
        }
    }
}

/// Write `command` + `terminator` and read until the terminator arrives.
///
/// Bytes are taken as Latin-1 characters; stops after `read_timeout`.
pub fn exchange_line(
    port: &mut dyn Transport,
    command: &str,
    terminator: &str,
    read_timeout: Duration,
) -> AsciiOutcome {
    match run_exchange_line(port, command, terminator, read_timeout) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(port = %port.name(), "Transport fault during exchange: {}", e);
            AsciiOutcome::Fault(e)
        }
    }
}

fn run_exchange_line(
    port: &mut dyn Transport,
    command: &str,
    terminator: &str,
    read_timeout: Duration,
) -> Result<AsciiOutcome, TransportError> {
    port.discard_input()?;
    port.discard_output()?;

    let begin = Local::now();
    let start = Instant::now();
    let mut request = String::with_capacity(command.len() + terminator.len());
    request.push_str(command);
    request.push_str(terminator);
    tracing::debug!(tx = %request.escape_debug(), "Send");
    port.write_all(request.as_bytes())?;

    let mut received = String::new();
    let mut to_last_byte = Duration::ZERO;
    let mut chunk = [0u8; 64];

    loop {
        let elapsed = start.elapsed();
        if elapsed > read_timeout {
            break;
        }
        if port.bytes_available()? > 0 {
            let n = port.read(&mut chunk)?;
            received.extend(chunk[..n].iter().map(|&b| char::from(b)));
            if n > 0 {
                to_last_byte = elapsed;
            }
        } else if !received.is_empty() && received.ends_with(terminator) {
            received.truncate(received.len() - terminator.len());
            tracing::debug!(rx = %received.escape_debug(), "Recv");
            return Ok(AsciiOutcome::Success(AsciiReply {
                sent: command.to_string(),
                received,
                timing: Timing {
                    begin,
                    to_last_byte,
                    total: start.elapsed(),
                },
            }));
        } else {
            thread::sleep(POLL_INTERVAL);
        }
    }

    Ok(AsciiOutcome::Timeout { partial: received })
}

/// Text protocol link over its own bus
pub struct AsciiLink {
    bus: Bus,
    read_timeout: Duration,
    terminator: String,
}

impl AsciiLink {
    /// Link on a real serial line
    pub fn new(settings: SerialSettings, read_timeout: Duration, terminator: &str) -> Self {
        Self::with_connector(settings, read_timeout, terminator, Box::new(SerialConnector))
    }

    /// Link opening its line through `connector`
    pub fn with_connector(
        settings: SerialSettings,
        read_timeout: Duration,
        terminator: &str,
        connector: Box<dyn Connector>,
    ) -> Self {
        Self {
            bus: Bus::new(settings, connector),
            read_timeout,
            terminator: terminator.to_string(),
        }
    }

    /// The underlying bus
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Line terminator appended to commands and expected on replies
    pub fn terminator(&self) -> &str {
        &self.terminator
    }

    /// Send `command` and wait for a terminated reply
    pub fn send_and_receive(&self, command: &str) -> AsciiOutcome {
        self.bus
            .with_port(|port| exchange_line(port, command, &self.terminator, self.read_timeout))
            .unwrap_or(AsciiOutcome::PortNotOpen)
    }
}
