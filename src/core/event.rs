//! Session log events and the sink interface
//!
//! The core never talks to a UI directly. Everything an operator needs to
//! see goes out through [`EventSink`], implemented by the presentation
//! layer. Events are ordered per source and consumed exactly once.

use tokio::sync::broadcast;

/// Notification event emitted by the session core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// Port opened and the reader started
    Connected,
    /// Port released and the reader stopped
    Disconnected,
    /// Command written to the port, text without the line terminator
    Sent(String),
    /// Complete line received from the stand, trimmed
    Received(String),
    /// Fault report, human readable
    Error(String),
}

/// Receiver of ordered session events
///
/// Implementations must be cheap and non-blocking: events are emitted from
/// inside the session's serialized operations and from the reader task.
pub trait EventSink: Send + Sync {
    /// Deliver one event
    fn event(&self, event: LogEvent);
}

/// Sink that fans events out over a broadcast channel
///
/// The adapter presentation shells subscribe through. A slow or absent
/// subscriber never blocks the core; it just lags or misses events.
pub struct BroadcastSink {
    tx: broadcast::Sender<LogEvent>,
}

impl BroadcastSink {
    /// Create a sink with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for BroadcastSink {
    fn event(&self, event: LogEvent) {
        // a send with no subscribers is not a fault
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_sink_delivers_in_order() {
        let sink = BroadcastSink::new(16);
        let mut rx = sink.subscribe();

        sink.event(LogEvent::Connected);
        sink.event(LogEvent::Sent("CLEAR_ALL".to_string()));

        assert_eq!(rx.recv().await.unwrap(), LogEvent::Connected);
        assert_eq!(
            rx.recv().await.unwrap(),
            LogEvent::Sent("CLEAR_ALL".to_string())
        );
    }

    #[test]
    fn test_sink_without_subscribers_does_not_panic() {
        let sink = BroadcastSink::default();
        sink.event(LogEvent::Error("nobody listening".to_string()));
    }
}
