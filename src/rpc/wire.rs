//! Wire model for the RPC socket.
//!
//! The protocol is JSON lines over a unix socket: the client writes one
//! [`Request`] object per line, the server answers with one [`Response`]
//! per line. `status` with `follow = true` is the one streaming case: the
//! server keeps writing `snapshot` responses until the client disconnects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::program::{EventResult, ProgramStatus};

/// One client request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Request {
    /// Start every program the expression selects.
    Start { expr: String },
    /// Stop every program the expression selects.
    Stop { expr: String },
    /// Restart every program the expression selects.
    Restart { expr: String },
    /// One status snapshot, or a stream of them while `follow` is set.
    Status {
        #[serde(default)]
        follow: bool,
    },
    /// Daemon liveness probe.
    Health,
}

/// One server response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    /// Per-program outcomes of a Start/Stop/Restart.
    Results {
        results: BTreeMap<String, EventResult>,
    },
    /// Full status snapshot, sorted by program name.
    Snapshot { programs: Vec<ProgramStatus> },
    /// Liveness probe result.
    Health { ok: bool, programs: usize },
    /// The request could not be served (bad JSON, unmatched expression).
    Error { message: String },
}
