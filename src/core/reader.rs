//! Background reader for an open session
//!
//! One task per open port. Each iteration checks the cancellation token,
//! peeks at the OS receive buffer under a brief lock, and either drains it
//! or idles for one poll interval. The handle is never held across the idle
//! wait, so the writer side stays responsive.

use super::codec;
use super::event::{EventSink, LogEvent};
use super::port::RawPort;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Idle wait between polls when the receive buffer is empty.
///
/// Also bounds how long `close()` waits for the reader to notice
/// cancellation.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

const READ_CHUNK: usize = 1024;

/// The port handle, shared between the session (owner) and the reader
/// (borrower, one brief lock per poll).
pub(crate) type SharedPort = Arc<Mutex<Option<Box<dyn RawPort>>>>;

/// Outcome cell for a finished reader, observed by the session
#[derive(Default)]
pub(crate) struct ReaderStatus {
    fault: Mutex<Option<String>>,
}

impl ReaderStatus {
    /// Take the pending fault, if the reader stopped on one
    pub(crate) fn take_fault(&self) -> Option<String> {
        self.fault.lock().take()
    }

    fn record(&self, message: String) {
        *self.fault.lock() = Some(message);
    }
}

/// Splits an incoming byte stream into newline-terminated lines.
/// A partial line stays buffered until its terminator arrives; the
/// terminator itself is not part of the emitted line.
#[derive(Debug, Default)]
pub(crate) struct LineAssembler {
    buffer: Vec<u8>,
}

impl LineAssembler {
    pub(crate) fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(256),
        }
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for &b in bytes {
            if b == b'\n' {
                lines.push(std::mem::take(&mut self.buffer));
            } else {
                self.buffer.push(b);
            }
        }
        lines
    }
}

/// Poll the port until cancelled or the handle dies.
///
/// An I/O fault is recorded in `status` and reported as an [`LogEvent::Error`],
/// then the loop stops; the connection state transition is left to the
/// session, which observes the fault at its next serialized operation.
pub(crate) async fn run(
    port: SharedPort,
    sink: Arc<dyn EventSink>,
    status: Arc<ReaderStatus>,
    cancel: CancellationToken,
) {
    let mut assembler = LineAssembler::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let pending = match port.lock().as_mut() {
            Some(handle) => handle.bytes_to_read(),
            // handle withdrawn, close() in progress
            None => break,
        };

        match pending {
            Ok(0) => {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(POLL_INTERVAL) => {}
                }
            }
            Ok(_) => {
                let read = match port.lock().as_mut() {
                    Some(handle) => handle.read(&mut chunk),
                    None => break,
                };
                match read {
                    Ok(0) => {}
                    Ok(n) => {
                        for line in assembler.push(&chunk[..n]) {
                            if let Some(text) = codec::decode_line(&line) {
                                sink.event(LogEvent::Received(text));
                            }
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                    Err(e) => {
                        fault(&sink, &status, format!("read failed: {e}"));
                        break;
                    }
                }
            }
            Err(e) => {
                fault(&sink, &status, format!("port unavailable: {e}"));
                break;
            }
        }
    }
}

fn fault(sink: &Arc<dyn EventSink>, status: &ReaderStatus, message: String) {
    tracing::warn!(%message, "reader stopped on I/O fault");
    status.record(message.clone());
    sink.event(LogEvent::Error(message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembler_single_line() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"OK\r\n");
        assert_eq!(lines, vec![b"OK\r".to_vec()]);
    }

    #[test]
    fn test_assembler_split_across_pushes() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(b"REA").is_empty());
        let lines = assembler.push(b"DY\r\nOK\r\n");
        assert_eq!(lines, vec![b"READY\r".to_vec(), b"OK\r".to_vec()]);
    }

    #[test]
    fn test_assembler_keeps_partial_tail() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"DONE\r\npart");
        assert_eq!(lines, vec![b"DONE\r".to_vec()]);
        assert_eq!(assembler.push(b"ial\r\n"), vec![b"partial\r".to_vec()]);
    }
}
