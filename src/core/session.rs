//! Serial session lifecycle and command dispatch
//!
//! One [`SerialSession`] manages at most one open port. `open`, `close` and
//! `send` are serialized against each other by a single control mutex; the
//! reader task shares only the handle mutex and a fault cell. The state
//! machine has two states and every path back to `Disconnected` runs
//! through the same serialized close.

use super::codec::{self, Command};
use super::event::{EventSink, LogEvent};
use super::port::{self, ConnectError, PortConfig, RawPort};
use super::reader::{self, ReaderStatus, SharedPort};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No port held; the initial state, always safe to return to
    Disconnected,
    /// Port held and reader running
    Connected,
}

/// Failure to transmit a command
#[derive(Debug, Error)]
pub enum SendError {
    /// No open session; rejected before any device I/O
    #[error("not connected")]
    NotConnected,

    /// Command refused by the codec before any device I/O
    #[error(transparent)]
    Invalid(#[from] codec::CodecError),

    /// Write fault; the session stays connected and the caller may retry
    #[error("write failed: {0}")]
    Io(String),
}

/// Control data for one running reader
struct ReaderHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Serial command/response session for the stand
///
/// Owns the port handle while connected. A write fault never drops the
/// connection on its own; disconnection is always an explicit `close` or
/// the observed death of the reader.
pub struct SerialSession {
    sink: Arc<dyn EventSink>,
    state: RwLock<ConnectionState>,
    port: SharedPort,
    status: Arc<ReaderStatus>,
    ctl: tokio::sync::Mutex<Option<ReaderHandle>>,
}

impl SerialSession {
    /// Create a disconnected session reporting into `sink`
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            state: RwLock::new(ConnectionState::Disconnected),
            port: Arc::new(Mutex::new(None)),
            status: Arc::new(ReaderStatus::default()),
            ctl: tokio::sync::Mutex::new(None),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether a port is currently held
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open `port_name` and start the reader.
    ///
    /// Either succeeds fully (state becomes `Connected`, one `Connected`
    /// event is emitted, exactly one reader task starts) or leaves the
    /// session exactly as it was, with the failure both returned and
    /// reported as an [`LogEvent::Error`].
    pub async fn open(&self, port_name: &str, config: &PortConfig) -> Result<(), ConnectError> {
        let mut ctl = self.ctl.lock().await;
        if ctl.is_some() {
            return Err(ConnectError::AlreadyConnected);
        }

        match port::open(port_name, config) {
            Ok(handle) => {
                self.attach(&mut ctl, Box::new(handle), port_name);
                Ok(())
            }
            Err(e) => {
                self.sink.event(LogEvent::Error(format!("connect failed: {e}")));
                Err(e)
            }
        }
    }

    /// Open with an already-acquired handle.
    ///
    /// The seam tests and alternative transports use to drive a session
    /// without OS serial ports; [`SerialSession::open`] is the production
    /// path.
    pub async fn open_with(&self, link: Box<dyn RawPort>, name: &str) -> Result<(), ConnectError> {
        let mut ctl = self.ctl.lock().await;
        if ctl.is_some() {
            return Err(ConnectError::AlreadyConnected);
        }
        self.attach(&mut ctl, link, name);
        Ok(())
    }

    fn attach(&self, ctl: &mut Option<ReaderHandle>, link: Box<dyn RawPort>, name: &str) {
        *self.port.lock() = Some(link);
        *self.state.write() = ConnectionState::Connected;
        self.status.take_fault();

        tracing::info!(port = name, "session opened");
        self.sink.event(LogEvent::Connected);

        // Connected must precede anything the reader emits, so spawn last.
        let cancel = CancellationToken::new();
        let task = tokio::spawn(reader::run(
            self.port.clone(),
            self.sink.clone(),
            self.status.clone(),
            cancel.clone(),
        ));
        *ctl = Some(ReaderHandle { cancel, task });
    }

    /// Close the session. No-op when already disconnected; otherwise stops
    /// the reader, releases the port and emits exactly one `Disconnected`.
    pub async fn close(&self) {
        let mut ctl = self.ctl.lock().await;
        self.close_locked(&mut ctl).await;
    }

    async fn close_locked(&self, ctl: &mut Option<ReaderHandle>) {
        let Some(handle) = ctl.take() else {
            return;
        };

        handle.cancel.cancel();
        // The reader observes cancellation within one poll interval; the
        // handle must not be released while it may still be borrowed.
        if let Err(e) = handle.task.await {
            tracing::warn!(error = %e, "reader task did not shut down cleanly");
        }

        *self.port.lock() = None;
        *self.state.write() = ConnectionState::Disconnected;
        self.status.take_fault();

        tracing::info!("session closed");
        self.sink.event(LogEvent::Disconnected);
    }

    /// Encode and transmit one command.
    ///
    /// Requires `Connected`. Encoding happens before any I/O, so an invalid
    /// command never reaches the wire. A write fault is reported and
    /// returned but leaves the session connected.
    pub async fn send(&self, command: &Command) -> Result<(), SendError> {
        let mut ctl = self.ctl.lock().await;

        // A reader that died on a fault leaves the state transition to be
        // settled here, at the next serialized operation.
        if self.status.take_fault().is_some() {
            tracing::warn!("reader fault observed, dropping session");
            self.close_locked(&mut ctl).await;
            return Err(SendError::NotConnected);
        }

        if ctl.is_none() {
            return Err(SendError::NotConnected);
        }

        let bytes = codec::encode(command)?;

        let outcome = {
            let mut guard = self.port.lock();
            match guard.as_mut() {
                Some(handle) => handle.write_all(&bytes).and_then(|()| handle.flush()),
                None => return Err(SendError::NotConnected),
            }
        };

        match outcome {
            Ok(()) => {
                self.sink.event(LogEvent::Sent(command.text()));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "send failed");
                self.sink
                    .event(LogEvent::Error(format!("write failed: {e}")));
                Err(SendError::Io(e.to_string()))
            }
        }
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        // A dropped session must not leave its reader polling the handle.
        if let Ok(mut ctl) = self.ctl.try_lock() {
            if let Some(handle) = ctl.take() {
                handle.cancel.cancel();
            }
        }
    }
}
