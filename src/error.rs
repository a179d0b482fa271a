//! Error types used across the daemon.
//!
//! Three layers, matching the component boundaries:
//!
//! - [`ConfigError`]: problems loading or validating the program set.
//! - [`ProgramError`]: per-program supervision failures. These are captured
//!   in that program's [`EventResult`](crate::program::EventResult) and never
//!   abort a multi-program dispatch.
//! - [`DispatchError`]: command-level failures raised *before* any program
//!   is touched (an expression that matches nothing).
//!
//! Process-boundary errors ([`SpawnError`](crate::process::SpawnError),
//! [`SignalError`](crate::process::SignalError)) live next to the process
//! abstraction in [`crate::process`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::process::SpawnError;

/// Errors raised while loading the daemon configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("could not read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML (or does not match the schema).
    #[error("could not parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A program definition failed validation.
    #[error("program '{program}': {reason}")]
    Invalid { program: String, reason: String },
}

/// Failures of a single supervised program.
///
/// Every variant maps to a state-machine outcome rather than a crash:
/// spawn failures drive `Backoff`, a stop timeout drives the force-kill
/// path, exhausted backoff parks the program in `Exited`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProgramError {
    /// The child process could not be created.
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// The child ignored the graceful stop signal past the configured window.
    #[error("'{program}' did not stop within {timeout:?}; force-killed")]
    StopTimeout { program: String, timeout: Duration },

    /// All restart attempts were consumed; a manual start is required.
    #[error("'{program}' gave up after {attempts} failed attempts")]
    BackoffExhausted { program: String, attempts: u32 },
}

/// Command-level failure raised before any per-program dispatch happens.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DispatchError {
    /// The program expression matched nothing. Zero matches is an error,
    /// not an empty success; callers must know their target was recognized.
    #[error("no programs match expression '{expr}'")]
    NoMatch { expr: String },
}

/// The shutdown grace window elapsed with supervisors still running.
///
/// The daemon exits anyway; this is reported so the operator knows which
/// programs may have leaked children.
#[derive(Error, Debug)]
#[error("shutdown grace {grace:?} exceeded; still running: {}", stuck.join(", "))]
pub struct GraceExceeded {
    pub grace: Duration,
    pub stuck: Vec<String>,
}

/// Errors from the RPC boundary (socket setup and framing).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("could not bind socket {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("socket i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Panics with a message asking for a bug report.
///
/// Reserved for internal invariant violations (e.g. two live child
/// processes for one program). Child-process failures never panic.
pub fn bug_panic(message: &str) -> ! {
    panic!("internal error, please file a bug report: {message}");
}
