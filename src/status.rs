//! Live status fan-out.
//!
//! [`StatusHub`] keeps the authoritative [`ProgramStatus`] snapshot for
//! every known program and broadcasts a full, name-sorted snapshot to all
//! stream subscribers whenever any program transitions.
//!
//! ## Delivery rules
//! - A new subscriber receives the current full snapshot **first**, then
//!   every subsequent change, in publication order. Registration and
//!   snapshot seeding happen under one lock, so there is no gap and no
//!   duplicate between the seed and the first update.
//! - Each subscriber has its own bounded queue. If it fills up, the
//!   subscriber is dropped rather than blocking the broadcaster: liveness
//!   of the core wins over completeness for a lagging observer.
//! - Disconnects are detected lazily on failed delivery and remove the
//!   subscriber from the fan-out set.
//!
//! ```text
//! supervisor A ─┐                       ┌─► [queue S1] ─► RPC stream 1
//! supervisor B ─┼─► update() ─► fan-out ┼─► [queue S2] ─► RPC stream 2
//! supervisor C ─┘   (one lock)          └─► [queue SN] ─► RPC stream N
//! ```

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::SystemTime;

use tokio::sync::mpsc;

use crate::program::{Program, ProgramStatus};

/// One full, name-sorted snapshot of every known program.
pub type StatusSnapshot = Vec<ProgramStatus>;

struct StatusSubscriber {
    id: u64,
    sender: mpsc::Sender<StatusSnapshot>,
}

struct Inner {
    statuses: BTreeMap<String, ProgramStatus>,
    subscribers: Vec<StatusSubscriber>,
    next_id: u64,
}

/// Snapshot store plus subscriber fan-out.
pub struct StatusHub {
    inner: Mutex<Inner>,
    queue_depth: usize,
}

impl StatusHub {
    /// Creates the hub with an initial `Stopped` snapshot per program.
    pub fn new(programs: &[Program], queue_depth: usize) -> Self {
        let statuses = programs
            .iter()
            .map(|p| (p.name.clone(), ProgramStatus::initial(&p.name)))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                statuses,
                subscribers: Vec::new(),
                next_id: 0,
            }),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Records a transition and fans the updated snapshot out to every
    /// subscriber. Subscribers whose queue is full or closed are removed.
    pub fn update(&self, status: ProgramStatus) {
        let mut inner = self.inner.lock().unwrap();
        inner.statuses.insert(status.name.clone(), status);
        let snapshot = render_snapshot(&inner.statuses);

        inner.subscribers.retain(|sub| {
            match sub.sender.try_send(snapshot.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = sub.id, "status subscriber lagging, dropped");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    /// Registers a subscriber and seeds it with the current snapshot.
    ///
    /// The first received item is always the full snapshot as of the
    /// subscription instant; later items reflect every subsequent change.
    pub fn subscribe(&self) -> mpsc::Receiver<StatusSnapshot> {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let mut inner = self.inner.lock().unwrap();
        let snapshot = render_snapshot(&inner.statuses);
        // Fresh channel, capacity >= 1: the seed cannot fail.
        let _ = tx.try_send(snapshot);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(StatusSubscriber { id, sender: tx });
        rx
    }

    /// Point-in-time snapshot, sorted by program name.
    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.inner.lock().unwrap();
        render_snapshot(&inner.statuses)
    }

    /// Current number of live stream subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }
}

fn render_snapshot(statuses: &BTreeMap<String, ProgramStatus>) -> StatusSnapshot {
    let now = SystemTime::now();
    statuses.values().map(|s| s.refreshed(now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramState;

    fn hub_for(names: &[&str], depth: usize) -> StatusHub {
        let statuses: BTreeMap<String, ProgramStatus> = names
            .iter()
            .map(|n| (n.to_string(), ProgramStatus::initial(n)))
            .collect();
        StatusHub {
            inner: Mutex::new(Inner {
                statuses,
                subscribers: Vec::new(),
                next_id: 0,
            }),
            queue_depth: depth,
        }
    }

    fn status(name: &str, state: ProgramState) -> ProgramStatus {
        let mut s = ProgramStatus::initial(name);
        s.state = state;
        s
    }

    #[tokio::test]
    async fn subscriber_gets_snapshot_first_then_updates_in_order() {
        let hub = hub_for(&["web", "worker"], 8);
        let mut rx = hub.subscribe();

        let seed = rx.recv().await.unwrap();
        assert_eq!(seed.len(), 2);
        assert!(seed.iter().all(|s| s.state == ProgramState::Stopped));

        hub.update(status("web", ProgramState::Starting));
        hub.update(status("web", ProgramState::Running));
        hub.update(status("worker", ProgramState::Starting));

        let first = rx.recv().await.unwrap();
        assert_eq!(first[1].state, ProgramState::Starting); // web
        let second = rx.recv().await.unwrap();
        assert_eq!(second[1].state, ProgramState::Running);
        let third = rx.recv().await.unwrap();
        assert_eq!(third[0].state, ProgramState::Starting); // worker
    }

    #[tokio::test]
    async fn snapshot_is_sorted_by_name() {
        let hub = hub_for(&["zeta", "alpha", "mid"], 8);
        let names: Vec<String> = hub.snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn lagging_subscriber_is_dropped_not_awaited() {
        let hub = hub_for(&["web"], 1);
        let rx = hub.subscribe(); // seed fills the depth-1 queue
        assert_eq!(hub.subscriber_count(), 1);

        // Queue full: this update drops the subscriber instead of blocking.
        hub.update(status("web", ProgramState::Starting));
        assert_eq!(hub.subscriber_count(), 0);
        drop(rx);
    }

    #[tokio::test]
    async fn closed_subscriber_is_removed_lazily() {
        let hub = hub_for(&["web"], 8);
        let rx = hub.subscribe();
        drop(rx);
        assert_eq!(hub.subscriber_count(), 1);
        hub.update(status("web", ProgramState::Starting));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn healthy_subscriber_survives_a_lagging_one() {
        let hub = hub_for(&["web"], 1);
        let _slow = hub.subscribe();
        let mut fast = hub.subscribe();
        let _ = fast.recv().await.unwrap(); // drain seed

        hub.update(status("web", ProgramState::Starting));
        // slow was dropped (its seed still occupied the queue); fast got it.
        assert_eq!(hub.subscriber_count(), 1);
        let snap = fast.recv().await.unwrap();
        assert_eq!(snap[0].state, ProgramState::Starting);
    }
}
