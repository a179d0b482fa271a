//! Process handle abstraction.
//!
//! The state machine in `core::supervisor` never touches the OS directly;
//! it drives a [`ProcessHandle`] obtained from a [`Spawner`]. This is
//! mechanism only: no retry logic, no policy, no state lives here.
//!
//! ## Contract
//! - A handle owns exactly one live OS process. The supervisor holds at most
//!   one handle per program (two at once is an internal bug).
//! - [`ProcessHandle::wait`] suspends the caller until the process exits.
//! - [`ProcessHandle::signal`] fails with [`SignalError::AlreadyExited`] if
//!   the process is gone; callers treat that as success-equivalent for stop.
//! - [`ProcessHandle::force_kill`] is idempotent and never fails.
//!
//! [`OsSpawner`] is the real implementation; tests drive the machine with a
//! scripted fake instead.

mod os;

#[cfg(test)]
pub(crate) mod fake;

pub use os::OsSpawner;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::program::Program;

/// The child process could not be created (binary missing, permission
/// denied, resource exhaustion). Fatal for that start attempt only.
#[derive(Error, Debug)]
#[error("could not spawn '{program}': {source}")]
pub struct SpawnError {
    pub program: String,
    #[source]
    pub source: std::io::Error,
}

/// A signal could not be delivered.
#[derive(Error, Debug)]
pub enum SignalError {
    /// The process already exited; nothing to signal.
    #[error("process already exited")]
    AlreadyExited,

    /// The OS rejected the signal for another reason.
    #[error("signal delivery failed: {0}")]
    Failed(String),
}

/// Signal used for graceful stop, as named in the config file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopSignal {
    #[default]
    Term,
    Int,
    Hup,
    Quit,
    Usr1,
    Usr2,
}

#[cfg(unix)]
impl From<StopSignal> for nix::sys::signal::Signal {
    fn from(sig: StopSignal) -> Self {
        use nix::sys::signal::Signal;
        match sig {
            StopSignal::Term => Signal::SIGTERM,
            StopSignal::Int => Signal::SIGINT,
            StopSignal::Hup => Signal::SIGHUP,
            StopSignal::Quit => Signal::SIGQUIT,
            StopSignal::Usr1 => Signal::SIGUSR1,
            StopSignal::Usr2 => Signal::SIGUSR2,
        }
    }
}

/// How a child process ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Normal exit with the given code.
    Exited(i32),
    /// Terminated by a signal.
    Signaled(Option<i32>),
    /// The wait itself failed; the process is unaccounted for.
    Lost(String),
}

impl ExitOutcome {
    /// Only a clean zero exit counts as success.
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(0))
    }

    /// Short description for event details and logs.
    pub fn describe(&self) -> String {
        match self {
            ExitOutcome::Exited(code) => format!("exit code {code}"),
            ExitOutcome::Signaled(Some(sig)) => format!("killed by signal {sig}"),
            ExitOutcome::Signaled(None) => "killed by signal".to_string(),
            ExitOutcome::Lost(err) => format!("wait failed: {err}"),
        }
    }
}

/// One live OS process.
#[async_trait::async_trait]
pub trait ProcessHandle: Send {
    /// OS pid, `None` once the process has been reaped.
    fn id(&self) -> Option<u32>;

    /// Delivers `sig` to the process (group).
    fn signal(&mut self, sig: StopSignal) -> Result<(), SignalError>;

    /// Suspends until the process exits and reaps it.
    async fn wait(&mut self) -> ExitOutcome;

    /// Sends SIGKILL. Safe to call on an already-dead process.
    async fn force_kill(&mut self);
}

/// Factory seam between the supervisor and the OS.
pub trait Spawner: Send + Sync + 'static {
    fn spawn(&self, program: &Program) -> Result<Box<dyn ProcessHandle>, SpawnError>;
}
