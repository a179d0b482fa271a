//! # chayd
//!
//! A single-node process-supervision daemon. `chayd` loads an immutable set
//! of named program definitions from a TOML file, runs one OS child process
//! per program under an explicit lifecycle state machine, and exposes
//! start/stop/restart/status/health over a unix-socket JSON-lines RPC
//! surface. Commands target programs with an expression: an exact name, a
//! `*`/`?` glob, or the literal `all`.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌────────────────────────────────────────────┐
//!    chayd.toml ───► │ config ──► Program set (immutable, sorted) │
//!                    └──────────────────┬─────────────────────────┘
//!                                       ▼
//!  unix socket ─► rpc::serve ─► Gateway ─► SupervisorRegistry
//!                    │                        │ resolve + concurrent dispatch
//!                    │                        ▼
//!                    │            ProgramSupervisor (one actor per program)
//!                    │                │   state machine + BackoffPolicy
//!                    │                │   child via Spawner/ProcessHandle
//!                    │                ├──► StatusHub ──► status streams
//!                    │◄───────────────┘
//!                    └──► events::Bus ──► SubscriberSet ──► LogWriter, ...
//! ```
//!
//! Two observation paths, deliberately separate:
//! - [`StatusHub`] carries the authoritative per-program snapshots to RPC
//!   status streams, losslessly per subscriber (a hopelessly lagging
//!   subscriber is dropped, never fed a gap).
//! - [`Bus`] broadcasts fine-grained lifecycle [`Event`]s to observers
//!   (logging, tests); it is lossy under lag by design of the ring buffer.
//!
//! ## Library use
//!
//! The binary in `src/bin/chayd.rs` is a thin assembly of the pieces
//! re-exported here; embedding the supervisor in another program is the
//! same wiring: build [`Program`]s (by hand or via [`config`]), a
//! [`StatusHub`], a [`Bus`], then a [`SupervisorRegistry`] and, if wanted,
//! [`rpc::serve`] on top.

pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod policies;
pub mod process;
pub mod program;
pub mod rpc;
pub mod status;
pub mod subscribers;

pub use crate::config::{Config, DaemonConfig, ProgramConfig};
pub use crate::core::{wait_for_signal, Command, SupervisorRegistry, ALL_PROGRAMS};
pub use crate::error::{
    ConfigError, DispatchError, GraceExceeded, ProgramError, RpcError,
};
pub use crate::events::{Bus, Event, EventKind};
pub use crate::policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
pub use crate::process::{
    ExitOutcome, OsSpawner, ProcessHandle, SignalError, SpawnError, Spawner, StopSignal,
};
pub use crate::program::{EventResult, Program, ProgramState, ProgramStatus};
pub use crate::status::{StatusHub, StatusSnapshot};
pub use crate::subscribers::{LogWriter, Subscribe, SubscriberSet};
