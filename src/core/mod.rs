//! Daemon core: the per-program supervision actors and the registry that
//! routes commands to them.

mod registry;
mod shutdown;
mod supervisor;

pub use registry::{SupervisorRegistry, ALL_PROGRAMS};
pub use shutdown::wait_for_signal;
pub use supervisor::Command;
