//! Request translation between the wire model and the core.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::core::{Command, SupervisorRegistry};
use crate::status::{StatusHub, StatusSnapshot};

use super::wire::{Request, Response};

/// What the server should send back for one request.
pub enum Reply {
    /// One response line.
    One(Response),
    /// A stream of snapshot lines until the subscription ends.
    Stream(mpsc::Receiver<StatusSnapshot>),
}

/// Maps wire requests onto registry and hub calls.
pub struct Gateway {
    registry: Arc<SupervisorRegistry>,
    hub: Arc<StatusHub>,
}

impl Gateway {
    pub fn new(registry: Arc<SupervisorRegistry>, hub: Arc<StatusHub>) -> Self {
        Self { registry, hub }
    }

    pub async fn handle(&self, request: Request) -> Reply {
        match request {
            Request::Start { expr } => self.dispatch(&expr, Command::Start).await,
            Request::Stop { expr } => self.dispatch(&expr, Command::Stop).await,
            Request::Restart { expr } => self.dispatch(&expr, Command::Restart).await,
            Request::Status { follow: false } => Reply::One(Response::Snapshot {
                programs: self.hub.snapshot(),
            }),
            Request::Status { follow: true } => Reply::Stream(self.hub.subscribe()),
            Request::Health => Reply::One(Response::Health {
                ok: self.registry.healthy(),
                programs: self.registry.len(),
            }),
        }
    }

    async fn dispatch(&self, expr: &str, cmd: Command) -> Reply {
        match self.registry.dispatch(expr, cmd).await {
            Ok(results) => Reply::One(Response::Results { results }),
            Err(err) => Reply::One(Response::Error {
                message: err.to_string(),
            }),
        }
    }
}
