//! Broadcast bus for runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] providing
//! non-blocking publication from many sources (supervisors, registry, RPC
//! server) to any number of receivers.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits.
//! - **Bounded capacity**: one ring buffer shared by all receivers.
//! - **Lag handling**: slow receivers observe `RecvError::Lagged(n)` and
//!   skip the `n` oldest items.
//! - **No persistence**: events published with no receivers are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus with the given ring-buffer capacity (clamped to >= 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers. Never blocks.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver observing subsequent events only.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn subscribers_see_published_events() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::Starting).with_program("web"));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::Starting);
        assert_eq!(ev.program.as_deref(), Some("web"));
    }

    #[tokio::test]
    async fn publish_without_receivers_is_a_noop() {
        let bus = Bus::new(8);
        bus.publish(Event::new(EventKind::Stopped));
        // A late subscriber only sees what comes after it.
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::Running));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Running);
    }
}
