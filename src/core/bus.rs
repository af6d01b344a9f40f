//! Port lifecycle and bus arbitration
//!
//! One [`Bus`] owns one serial line. Its lock serializes open, close and every
//! transaction, so at most one request is ever in flight on the wire.
//! State changes are announced on channels handed out by [`Bus::subscribe`],
//! always after the lock has been released.

use super::transport::{Connector, SerialSettings, Transport, TransportError};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

/// Port state change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    /// The port was opened
    Opened(String),
    /// The port was closed
    Closed(String),
}

/// Current port state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortState {
    /// No open handle
    Closed,
    /// Open handle on the named port
    Open(String),
}

/// A shared half-duplex line with exclusive access
pub struct Bus {
    settings: Mutex<SerialSettings>,
    connector: Box<dyn Connector>,
    port: Mutex<Option<Box<dyn Transport>>>,
    subscribers: Mutex<Vec<Sender<PortEvent>>>,
}

impl Bus {
    /// Create a closed bus that opens lines through `connector`
    pub fn new(settings: SerialSettings, connector: Box<dyn Connector>) -> Self {
        Self {
            settings: Mutex::new(settings),
            connector,
            port: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Line configuration used by the next open
    pub fn settings(&self) -> SerialSettings {
        self.settings.lock().clone()
    }

    /// Replace the line configuration; takes effect on the next open
    pub fn set_settings(&self, settings: SerialSettings) {
        *self.settings.lock() = settings;
    }

    /// Receive a [`PortEvent`] after every open and close
    pub fn subscribe(&self) -> Receiver<PortEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Check if a handle is open
    pub fn is_open(&self) -> bool {
        self.port.lock().is_some()
    }

    /// Open or closed, with the port name
    pub fn state(&self) -> PortState {
        match self.port.lock().as_ref() {
            Some(port) => PortState::Open(port.name()),
            None => PortState::Closed,
        }
    }

    /// Open the line, logging failures.
    ///
    /// With `force` any existing handle is closed first. An already open
    /// handle is kept otherwise.
    pub fn open(&self, force: bool) -> Result<(), TransportError> {
        self.open_inner(force, true)
    }

    /// Like [`Bus::open`] but failures are not logged
    pub fn open_silent(&self, force: bool) -> Result<(), TransportError> {
        self.open_inner(force, false)
    }

    fn open_inner(&self, force: bool, log_errors: bool) -> Result<(), TransportError> {
        let mut events = Vec::with_capacity(2);
        let result = {
            let mut port = self.port.lock();
            if force {
                if let Some(name) = Self::release(&mut port, true) {
                    events.push(PortEvent::Closed(name));
                }
            }
            if port.is_none() {
                let settings = self.settings();
                match self.connector.connect(&settings) {
                    Ok(handle) => {
                        tracing::info!("{}", settings);
                        events.push(PortEvent::Opened(handle.name()));
                        *port = Some(handle);
                        Ok(())
                    }
                    Err(e) => {
                        if log_errors {
                            tracing::error!(port = %settings.port, "Failed to open port: {}", e);
                        }
                        Err(e)
                    }
                }
            } else {
                Ok(())
            }
        };
        self.notify(events);
        result
    }

    /// Close the line if open. Never fails; close errors are logged and dropped.
    ///
    /// `notify` controls whether the close itself is logged.
    pub fn close(&self, notify: bool) {
        let closed = Self::release(&mut self.port.lock(), notify);
        if let Some(name) = closed {
            self.notify(vec![PortEvent::Closed(name)]);
        }
    }

    fn release(port: &mut Option<Box<dyn Transport>>, log: bool) -> Option<String> {
        let mut handle = port.take()?;
        let name = handle.name();
        if log {
            tracing::info!("{} Close.", name);
        }
        if let Err(e) = handle.close() {
            tracing::warn!(port = %name, "Error while closing port: {}", e);
        }
        Some(name)
    }

    /// Run `f` with exclusive access to the open line.
    ///
    /// Returns `None` without calling `f` when no handle is open.
    pub fn with_port<R>(&self, f: impl FnOnce(&mut dyn Transport) -> R) -> Option<R> {
        let mut port = self.port.lock();
        let handle = port.as_mut()?;
        Some(f(handle.as_mut()))
    }

    fn notify(&self, events: Vec<PortEvent>) {
        if events.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| events.iter().all(|event| tx.send(event.clone()).is_ok()));
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        Self::release(self.port.get_mut(), false);
    }
}
