//! Event subscribers.
//!
//! Observers hook into the daemon by implementing [`Subscribe`] and
//! registering with the [`SubscriberSet`], which fans out every bus event
//! through per-subscriber bounded queues. Log output, metrics, and test
//! probes all attach here, independent of the state-machine logic.

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::Bus;

/// Pumps bus events into the set until the token fires, then shuts the
/// set down. The pump itself may lag behind a bursty bus; subscribers are
/// told nothing about the gap beyond a warning in the log.
pub fn attach(bus: &Bus, set: SubscriberSet, token: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(event) => set.emit(&event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "event pump lagged, events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        set.shutdown().await;
    })
}
