//! Runtime events: types and broadcast bus.
//!
//! Every supervisor transition is published here so that observers
//! (logging, metrics, tests) can watch the daemon without touching the
//! state machines. The status stream served over RPC does **not** ride on
//! this bus; it has its own lossless path through
//! [`StatusHub`](crate::status::StatusHub).
//!
//! ## Contents
//! - [`EventKind`], [`Event`] classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ProgramSupervisor` and `SupervisorRegistry`.
//! - **Consumers**: the `SubscriberSet` pump and test harnesses.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
