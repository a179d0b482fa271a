//! Retry and restart policies.
//!
//! This module groups the knobs that control **if** a program is respawned
//! after an exit and **how long** to wait between failed attempts.
//!
//! ## Contents
//! - [`RestartPolicy`] when to respawn (never / on-failure / always)
//! - [`BackoffPolicy`] how retry delays grow (base / cap / attempt budget)
//! - [`JitterPolicy`]  randomization to avoid thundering-herd restarts
//!
//! ## Quick wiring
//! ```text
//! Program { restart: RestartPolicy, backoff: BackoffPolicy, .. }
//!      └─► core::supervisor::ProgramSupervisor uses:
//!           - restart to pick Backoff vs Exited after an exit
//!           - backoff.delay(attempt) to schedule the retry timer
//!           - backoff.exhausted(attempt) to give up (Exited)
//! ```

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;
