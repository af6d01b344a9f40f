//! Scripted in-memory serial line for integration tests
//!
//! A responder closure sees every written frame and returns the reply as
//! bursts, each released a fixed delay after the write.

#![allow(dead_code)]

use parking_lot::Mutex;
use rtupoll_core::core::protocol::checksum::append_crc;
use rtupoll_core::core::transport::{Connector, SerialSettings, Transport, TransportError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bytes that become readable `after` the write
#[derive(Debug, Clone)]
pub struct Burst {
    pub after: Duration,
    pub bytes: Vec<u8>,
}

pub fn burst(after_ms: u64, bytes: &[u8]) -> Burst {
    Burst {
        after: Duration::from_millis(after_ms),
        bytes: bytes.to_vec(),
    }
}

/// `bytes` with the Modbus CRC appended
pub fn with_crc(bytes: &[u8]) -> Vec<u8> {
    let mut frame = bytes.to_vec();
    append_crc(&mut frame);
    frame
}

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Burst> + Send>;

struct LineState {
    responder: Responder,
    pending: Vec<Burst>,
    written_at: Option<Instant>,
    rx: Vec<u8>,
    writes: Vec<Vec<u8>>,
    opens: usize,
    closes: usize,
    input_discards: usize,
    fail_open: bool,
}

/// Handle on a simulated line, kept by the test for setup and assertions
#[derive(Clone)]
pub struct Line {
    name: String,
    state: Arc<Mutex<LineState>>,
}

impl Line {
    /// Line whose device answers every frame through `responder`
    pub fn new(name: &str, responder: impl FnMut(&[u8]) -> Vec<Burst> + Send + 'static) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(LineState {
                responder: Box::new(responder),
                pending: Vec::new(),
                written_at: None,
                rx: Vec::new(),
                writes: Vec::new(),
                opens: 0,
                closes: 0,
                input_discards: 0,
                fail_open: false,
            })),
        }
    }

    /// Line that answers every frame with the same bursts
    pub fn replying(name: &str, bursts: Vec<Burst>) -> Self {
        Self::new(name, move |_| bursts.clone())
    }

    /// Line with nothing attached
    pub fn silent(name: &str) -> Self {
        Self::new(name, |_| Vec::new())
    }

    /// Connector handing out transports on this line
    pub fn connector(&self) -> Box<dyn Connector> {
        Box::new(LineConnector { line: self.clone() })
    }

    /// Make the next opens fail
    pub fn fail_open(&self) {
        self.state.lock().fail_open = true;
    }

    /// Put bytes in the receive buffer as if left over from earlier traffic
    pub fn inject(&self, bytes: &[u8]) {
        self.state.lock().rx.extend_from_slice(bytes);
    }

    /// Every frame written so far
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    pub fn input_discards(&self) -> usize {
        self.state.lock().input_discards
    }
}

struct LineConnector {
    line: Line,
}

impl Connector for LineConnector {
    fn connect(&self, settings: &SerialSettings) -> Result<Box<dyn Transport>, TransportError> {
        let mut state = self.line.state.lock();
        if state.fail_open || settings.port != self.line.name {
            return Err(TransportError::PortNotFound(settings.port.clone()));
        }
        state.opens += 1;
        Ok(Box::new(LinePort {
            line: self.line.clone(),
        }))
    }
}

struct LinePort {
    line: Line,
}

impl Transport for LinePort {
    fn name(&self) -> String {
        self.line.name.clone()
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        let mut state = self.line.state.lock();
        if let Some(written_at) = state.written_at {
            let elapsed = written_at.elapsed();
            while state.pending.first().is_some_and(|b| b.after <= elapsed) {
                let due = state.pending.remove(0);
                state.rx.extend_from_slice(&due.bytes);
            }
        }
        Ok(state.rx.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.line.state.lock();
        let n = buf.len().min(state.rx.len());
        buf[..n].copy_from_slice(&state.rx[..n]);
        state.rx.drain(..n);
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.line.state.lock();
        state.writes.push(data.to_vec());
        let mut bursts = (state.responder)(data);
        bursts.sort_by_key(|b| b.after);
        state.pending = bursts;
        state.written_at = Some(Instant::now());
        Ok(())
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        let mut state = self.line.state.lock();
        state.rx.clear();
        state.input_discards += 1;
        Ok(())
    }

    fn discard_output(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.line.state.lock().closes += 1;
        Ok(())
    }
}

/// Read-holding-registers reply echoing the request's slave address.
///
/// Register `i` holds `start + i`.
pub fn register_echo(request: &[u8]) -> Vec<u8> {
    let slave = request[0];
    let start = u16::from_be_bytes([request[2], request[3]]);
    let count = u16::from_be_bytes([request[4], request[5]]);
    let mut reply = vec![slave, 0x03, (count * 2) as u8];
    for i in 0..count {
        reply.extend_from_slice(&(start + i).to_be_bytes());
    }
    with_crc(&reply)
}
