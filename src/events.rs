//! Server events that can be received by the application.

use log::debug;
use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Events emitted by the VNC server.
///
/// Delivery is best effort: the server never blocks a session on a slow
/// subscriber, so events are dropped when the receiving channel is full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A client has connected to the server.
    ClientConnected {
        /// Unique client identifier.
        id: usize,
        /// Client's socket address.
        address: SocketAddr,
    },

    /// A client has disconnected from the server.
    ClientDisconnected {
        /// Unique client identifier.
        id: usize,
    },

    /// Pointer movement or button event from a client.
    PointerEvent {
        /// Client identifier.
        client_id: usize,
        /// X coordinate.
        x: u16,
        /// Y coordinate.
        y: u16,
        /// Button mask (bit 0 = left, bit 1 = middle, bit 2 = right).
        button_mask: u8,
    },

    /// Key press or release event from a client.
    KeyEvent {
        /// Client identifier.
        client_id: usize,
        /// Key symbol (X11 keysym).
        key: u32,
        /// True if pressed, false if released.
        pressed: bool,
    },

    /// Clipboard text received from a client.
    ClipboardReceived {
        /// Client identifier.
        client_id: usize,
        /// Clipboard text content.
        text: String,
    },
}

/// Fan-in point sessions publish [`ServerEvent`]s through.
///
/// Holds at most one subscriber. Publishing never blocks: when nobody listens, or
/// the subscriber's channel is full, the event is dropped.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Arc<Mutex<Option<SyncSender<ServerEvent>>>>,
}

impl EventSink {
    /// Creates a sink with no subscriber.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current subscriber with a new bounded channel.
    #[must_use]
    pub fn subscribe(&self, capacity: usize) -> Receiver<ServerEvent> {
        let (tx, rx) = mpsc::sync_channel(capacity);
        *self.lock() = Some(tx);
        rx
    }

    /// Publishes an event to the subscriber, if any.
    pub fn emit(&self, event: ServerEvent) {
        let mut sender = self.lock();
        let Some(tx) = sender.as_ref() else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!("Event channel full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Event subscriber went away");
                *sender = None;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<SyncSender<ServerEvent>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscriber_is_noop() {
        EventSink::new().emit(ServerEvent::ClientDisconnected { id: 1 });
    }

    #[test]
    fn test_subscriber_receives_events() {
        let sink = EventSink::new();
        let rx = sink.subscribe(4);
        sink.emit(ServerEvent::ClientDisconnected { id: 7 });
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::ClientDisconnected { id: 7 });
    }

    #[test]
    fn test_full_channel_drops() {
        let sink = EventSink::new();
        let rx = sink.subscribe(1);
        sink.emit(ServerEvent::ClientDisconnected { id: 1 });
        sink.emit(ServerEvent::ClientDisconnected { id: 2 });
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::ClientDisconnected { id: 1 });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_detaches() {
        let sink = EventSink::new();
        drop(sink.subscribe(1));
        sink.emit(ServerEvent::ClientDisconnected { id: 1 });
        assert!(sink.lock().is_none());
    }
}
