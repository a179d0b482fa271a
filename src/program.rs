//! Program definitions and observable state.
//!
//! ## Contents
//! - [`Program`] immutable definition of one supervised program
//! - [`ProgramState`] the lifecycle state enum (see `core::supervisor` for
//!   the transition table)
//! - [`ProgramStatus`] point-in-time snapshot emitted on every transition
//! - [`EventResult`] per-program outcome of one Start/Stop/Restart command
//!
//! The program set is fixed at registry construction. Commands change a
//! program's running state, never the set itself.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::policies::{BackoffPolicy, RestartPolicy};
use crate::process::StopSignal;

/// Immutable definition of one supervised program.
///
/// Built by [`crate::config`] from the TOML file and shared with the
/// program's supervisor as an `Arc`. Never mutated after load, so it can be
/// read from any task without locking.
#[derive(Clone, Debug)]
pub struct Program {
    /// Unique key, also the unit of command targeting.
    pub name: String,
    /// Executable to run.
    pub command: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory for the child (daemon cwd when `None`).
    pub cwd: Option<PathBuf>,
    /// Extra environment variables for the child.
    pub env: BTreeMap<String, String>,
    /// Start the program as soon as the daemon comes up.
    pub autostart: bool,
    /// When to respawn after an exit the daemon did not request.
    pub restart: RestartPolicy,
    /// Retry delays and attempt budget for flapping starts.
    pub backoff: BackoffPolicy,
    /// How long the program must stay up before its failure count resets.
    pub settle: Duration,
    /// Signal sent on graceful stop.
    pub stop_signal: StopSignal,
    /// Window the child gets to exit after `stop_signal` before SIGKILL.
    pub stop_timeout: Duration,
}

/// Lifecycle state of one program. Exactly one per program at any instant.
///
/// `Backoff` means the supervisor will retry on its own; `Exited` means it
/// gave up (or the policy forbids respawn) and a manual Start is required.
/// Neither is terminal: both accept a future Start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Exiting,
    Exited,
    Backoff,
}

impl ProgramState {
    /// States in which the supervisor owns a live child process.
    pub fn has_live_child(&self) -> bool {
        matches!(
            self,
            ProgramState::Starting
                | ProgramState::Running
                | ProgramState::Stopping
                | ProgramState::Exiting
        )
    }
}

impl std::fmt::Display for ProgramState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProgramState::Stopped => "stopped",
            ProgramState::Starting => "starting",
            ProgramState::Running => "running",
            ProgramState::Stopping => "stopping",
            ProgramState::Exiting => "exiting",
            ProgramState::Exited => "exited",
            ProgramState::Backoff => "backoff",
        };
        f.write_str(s)
    }
}

/// Snapshot of one program's observable state.
///
/// Produced on every transition and immutable once emitted. `start_time` is
/// set on entry to `Running` and sticky from then on; `uptime` is live while
/// `Running`, frozen at its last value otherwise, and zero for a program
/// that never started.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgramStatus {
    pub name: String,
    pub state: ProgramState,
    pub start_time: Option<SystemTime>,
    pub uptime: Duration,
    pub pid: Option<u32>,
}

impl ProgramStatus {
    /// Initial snapshot for a program that has never run.
    pub fn initial(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: ProgramState::Stopped,
            start_time: None,
            uptime: Duration::ZERO,
            pid: None,
        }
    }

    /// Copy of this snapshot with `uptime` recomputed against `now`.
    ///
    /// Only `Running` programs tick; everything else keeps the recorded value.
    pub fn refreshed(&self, now: SystemTime) -> Self {
        let mut out = self.clone();
        if self.state == ProgramState::Running {
            if let Some(started) = self.start_time {
                out.uptime = now.duration_since(started).unwrap_or(Duration::ZERO);
            }
        }
        out
    }
}

/// Outcome of applying one command to one program.
///
/// One instance per program per command invocation; returned to the caller
/// and discarded. A failure here never aborts the rest of a multi-program
/// dispatch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventResult {
    /// Whether the command took effect (idempotent no-ops count as success).
    pub ok: bool,
    /// State the program settled in once the command was applied.
    pub state: ProgramState,
    /// Human-readable explanation (error text, or why this was a no-op).
    pub detail: Option<String>,
}

impl EventResult {
    pub fn ok(state: ProgramState) -> Self {
        Self {
            ok: true,
            state,
            detail: None,
        }
    }

    pub fn ok_with(state: ProgramState, detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            state,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(state: ProgramState, detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            state,
            detail: Some(detail.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_child_states() {
        assert!(ProgramState::Starting.has_live_child());
        assert!(ProgramState::Running.has_live_child());
        assert!(ProgramState::Stopping.has_live_child());
        assert!(ProgramState::Exiting.has_live_child());
        assert!(!ProgramState::Stopped.has_live_child());
        assert!(!ProgramState::Exited.has_live_child());
        assert!(!ProgramState::Backoff.has_live_child());
    }

    #[test]
    fn refreshed_ticks_only_while_running() {
        let t0 = SystemTime::UNIX_EPOCH;
        let mut status = ProgramStatus::initial("web");
        status.state = ProgramState::Running;
        status.start_time = Some(t0);

        let later = t0 + Duration::from_secs(42);
        assert_eq!(status.refreshed(later).uptime, Duration::from_secs(42));

        status.state = ProgramState::Exited;
        status.uptime = Duration::from_secs(7);
        assert_eq!(status.refreshed(later).uptime, Duration::from_secs(7));
    }

    #[test]
    fn initial_status_never_started() {
        let status = ProgramStatus::initial("worker");
        assert_eq!(status.state, ProgramState::Stopped);
        assert_eq!(status.start_time, None);
        assert_eq!(status.uptime, Duration::ZERO);
    }

    #[test]
    fn state_serializes_screaming_snake() {
        let json = serde_json::to_string(&ProgramState::Backoff).unwrap();
        assert_eq!(json, r#""BACKOFF""#);
    }
}
