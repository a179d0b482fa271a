//! Runtime events emitted by the supervisors and the daemon core.
//!
//! [`EventKind`] classifies events across two groups:
//! - **Lifecycle**: one event per state-machine transition (starting,
//!   running, stopping, exited, backoff scheduled, ...)
//! - **Daemon**: shutdown progress
//!
//! ## Ordering
//! Each event carries a globally unique `seq` that increases monotonically.
//! Consumers that buffer or reorder can restore publication order from it.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::program::ProgramState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Program lifecycle ===
    /// A spawn attempt is underway. Sets `program`, `attempt`.
    Starting,
    /// The child is up. Sets `program`, `pid`.
    Running,
    /// Graceful stop signal sent. Sets `program`.
    Stopping,
    /// Stop window elapsed; SIGKILL issued. Sets `program`, `detail`.
    ForceKill,
    /// The program settled in Stopped. Sets `program`.
    Stopped,
    /// The program settled in Exited. Sets `program`, `detail`.
    Exited,
    /// A spawn attempt failed. Sets `program`, `attempt`, `detail`.
    SpawnFailed,
    /// The child exited without being asked. Sets `program`, `detail`.
    UnexpectedExit,
    /// A retry timer was armed. Sets `program`, `attempt`, `delay`.
    BackoffScheduled,
    /// The attempt budget ran out. Sets `program`, `attempt`, `detail`.
    BackoffExhausted,

    // === Daemon ===
    /// Shutdown signal observed; stop-all underway.
    ShutdownRequested,
    /// All programs stopped within the grace window.
    AllStoppedWithinGrace,
    /// Grace window elapsed with programs still up. Sets `detail`.
    GraceExceeded,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Program (or subscriber) name, if applicable.
    pub program: Option<Arc<str>>,
    /// Resulting state for lifecycle events.
    pub state: Option<ProgramState>,
    /// Consecutive-failure count at publication time.
    pub attempt: Option<u32>,
    /// Backoff delay before the next attempt.
    pub delay: Option<Duration>,
    /// OS pid, for `Running`.
    pub pid: Option<u32>,
    /// Human-readable detail (error text, exit description).
    pub detail: Option<Arc<str>>,
}

impl Event {
    /// Creates an event of the given kind with the current timestamp and
    /// the next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            program: None,
            state: None,
            attempt: None,
            delay: None,
            pid: None,
            detail: None,
        }
    }

    #[inline]
    pub fn with_program(mut self, name: impl Into<Arc<str>>) -> Self {
        self.program = Some(name.into());
        self
    }

    #[inline]
    pub fn with_state(mut self, state: ProgramState) -> Self {
        self.state = Some(state);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn with_detail(mut self, detail: impl Into<Arc<str>>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_strictly_increasing() {
        let a = Event::new(EventKind::Starting);
        let b = Event::new(EventKind::Running);
        let c = Event::new(EventKind::Stopped);
        assert!(a.seq < b.seq);
        assert!(b.seq < c.seq);
    }

    #[test]
    fn builder_attaches_metadata() {
        let ev = Event::new(EventKind::BackoffScheduled)
            .with_program("web")
            .with_attempt(3)
            .with_delay(Duration::from_secs(4))
            .with_detail("exit code 1");
        assert_eq!(ev.program.as_deref(), Some("web"));
        assert_eq!(ev.attempt, Some(3));
        assert_eq!(ev.delay, Some(Duration::from_secs(4)));
        assert_eq!(ev.detail.as_deref(), Some("exit code 1"));
    }
}
