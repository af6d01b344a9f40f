//! Request/response exchange on a silence-framed bus
//!
//! RTU frames carry no length or delimiter. A response is complete once the
//! line has been quiet for the idle threshold, nominally 3.5 character times
//! at the configured baud rate.

use super::bus::Bus;
use super::protocol::modbus::MIN_FRAME_LEN;
use super::protocol::{hex_spaced, Outcome, Response, Timing};
use super::transport::{Transport, TransportError};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

/// Bits on the wire per character: start + 8 data + parity/stop + stop
pub const BITS_PER_CHAR: f64 = 11.0;

/// Standard RTU inter-frame silence in character times
pub const RTU_CHAR_TIMES: f64 = 3.5;

/// Receive buffer growth step
const RX_CHUNK: usize = 16;

/// Pause between polls of an idle line
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Silence in milliseconds spanning `char_times` characters at `baud`
pub fn idle_threshold_ms(baud: u32, char_times: f64) -> f64 {
    if baud == 0 {
        return 0.0;
    }
    BITS_PER_CHAR / f64::from(baud) * char_times * 1000.0
}

/// [`idle_threshold_ms`] as a `Duration`
pub fn idle_threshold(baud: u32, char_times: f64) -> Duration {
    Duration::from_secs_f64(idle_threshold_ms(baud, char_times).max(0.0) / 1000.0)
}

/// How the end of a response is detected
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleMode {
    /// Silence of this many character times at the line's baud rate
    CharTimes(f64),
    /// Fixed silence in milliseconds
    FixedMs(u64),
}

impl IdleMode {
    /// Resolve to a concrete silence for `baud`
    pub fn threshold(&self, baud: u32) -> Duration {
        match *self {
            IdleMode::CharTimes(chars) => idle_threshold(baud, chars),
            IdleMode::FixedMs(ms) => Duration::from_millis(ms),
        }
    }
}

impl Default for IdleMode {
    fn default() -> Self {
        IdleMode::CharTimes(RTU_CHAR_TIMES)
    }
}

/// Write `request` and collect the response on an already locked line.
///
/// One attempt only. The receive loop ends on the first of:
/// - `read_timeout` since the write: `Timeout`
/// - `idle` silence after at least one byte: `Success` with four or more
///   bytes, `Timeout` otherwise
/// - a transport error: `Fault`
pub fn exchange(
    port: &mut dyn Transport,
    request: &[u8],
    read_timeout: Duration,
    idle: Duration,
) -> Outcome {
    match run_exchange(port, request, read_timeout, idle) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(port = %port.name(), "Transport fault during exchange: {}", e);
            Outcome::Fault(e)
        }
    }
}

fn run_exchange(
    port: &mut dyn Transport,
    request: &[u8],
    read_timeout: Duration,
    idle: Duration,
) -> Result<Outcome, TransportError> {
    port.discard_input()?;
    port.discard_output()?;

    let begin = Local::now();
    let start = Instant::now();
    tracing::debug!(tx = %hex_spaced(request), "Send");
    port.write_all(request)?;

    let mut buf = vec![0u8; RX_CHUNK];
    let mut received = 0usize;
    let mut last_byte = start;
    let mut to_last_byte = Duration::ZERO;

    loop {
        let elapsed = start.elapsed();
        if elapsed > read_timeout {
            break;
        }

        if port.bytes_available()? > 0 {
            if received == buf.len() {
                buf.resize(buf.len() + RX_CHUNK, 0);
            }
            let n = port.read(&mut buf[received..])?;
            if n > 0 {
                received += n;
                last_byte = Instant::now();
                to_last_byte = elapsed;
                tracing::trace!(bytes = n, total = received, "Read");
            }
        } else if received > 0 {
            if last_byte.elapsed() >= idle {
                if received >= MIN_FRAME_LEN {
                    buf.truncate(received);
                    tracing::debug!(rx = %hex_spaced(&buf), "Recv");
                    let timing = Timing {
                        begin,
                        to_last_byte,
                        total: start.elapsed(),
                    };
                    return Ok(Outcome::Success(Response::new(request.to_vec(), buf, timing)));
                }
                break;
            }
            thread::sleep(POLL_INTERVAL);
        } else {
            thread::sleep(POLL_INTERVAL);
        }
    }

    buf.truncate(received);
    tracing::debug!(partial = %hex_spaced(&buf), "Timeout");
    Ok(Outcome::Timeout { partial: buf })
}

impl Bus {
    /// Send `request` and wait for the response while holding the bus.
    ///
    /// Returns `PortNotOpen` without touching the wire when the line is closed.
    pub fn send_and_receive(&self, request: &[u8], read_timeout: Duration, idle: Duration) -> Outcome {
        self.with_port(|port| exchange(port, request, read_timeout, idle))
            .unwrap_or(Outcome::PortNotOpen)
    }
}
