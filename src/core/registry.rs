//! Command routing over the supervisor set.
//!
//! [`SupervisorRegistry`] is built once from the loaded program set and
//! never changes shape afterwards. It resolves program expressions to
//! concrete names, fans commands out to the matching supervisors
//! concurrently, and drives the stop-everything path on shutdown.
//!
//! ## Expressions
//! - the literal `all` selects every program
//! - anything else is a case-sensitive `wildmatch` pattern (`*`, `?`),
//!   which degenerates to an exact match when it has no wildcards
//! - zero matches aborts the command with [`DispatchError::NoMatch`]
//!   before any supervisor is touched
//!
//! A failure of one program never aborts the others: each selected program
//! contributes its own [`EventResult`] to the reply map.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use tokio::time;
use tokio_util::sync::CancellationToken;
use wildmatch::WildMatch;

use crate::error::{DispatchError, GraceExceeded};
use crate::events::{Bus, Event, EventKind};
use crate::process::Spawner;
use crate::program::{EventResult, Program, ProgramStatus};
use crate::status::StatusHub;

use super::supervisor::{Command, ProgramHandle, ProgramSupervisor};

/// Expression selecting every program.
pub const ALL_PROGRAMS: &str = "all";

/// Owns one [`ProgramHandle`] per configured program.
pub struct SupervisorRegistry {
    handles: BTreeMap<String, ProgramHandle>,
    autostart: Vec<String>,
    hub: Arc<StatusHub>,
    bus: Bus,
    token: CancellationToken,
}

impl SupervisorRegistry {
    /// Spawns one supervisor per program. All of them start in `Stopped`;
    /// call [`SupervisorRegistry::autostart`] to bring the marked ones up.
    pub fn new(
        programs: Vec<Program>,
        spawner: Arc<dyn Spawner>,
        bus: Bus,
        hub: Arc<StatusHub>,
        token: CancellationToken,
    ) -> Self {
        let mut handles = BTreeMap::new();
        let mut autostart = Vec::new();

        for program in programs {
            if program.autostart {
                autostart.push(program.name.clone());
            }
            let handle = ProgramSupervisor::spawn(
                Arc::new(program),
                Arc::clone(&spawner),
                bus.clone(),
                Arc::clone(&hub),
                token.child_token(),
            );
            handles.insert(handle.name().to_string(), handle);
        }

        Self {
            handles,
            autostart,
            hub,
            bus,
            token,
        }
    }

    /// Resolves a program expression to the sorted list of matching names.
    pub fn resolve(&self, expr: &str) -> Result<Vec<String>, DispatchError> {
        let names: Vec<String> = if expr == ALL_PROGRAMS {
            self.handles.keys().cloned().collect()
        } else {
            let pattern = WildMatch::new(expr);
            self.handles
                .keys()
                .filter(|name| pattern.matches(name))
                .cloned()
                .collect()
        };

        if names.is_empty() {
            return Err(DispatchError::NoMatch {
                expr: expr.to_string(),
            });
        }
        Ok(names)
    }

    /// Applies one command to every program the expression selects,
    /// concurrently, and collects one result per program.
    pub async fn dispatch(
        &self,
        expr: &str,
        cmd: Command,
    ) -> Result<BTreeMap<String, EventResult>, DispatchError> {
        let names = self.resolve(expr)?;
        let applied = names.into_iter().map(|name| {
            let handle = &self.handles[&name];
            async move { (name, handle.apply(cmd).await) }
        });
        Ok(future::join_all(applied).await.into_iter().collect())
    }

    /// Starts every program marked `autostart`, concurrently.
    pub async fn autostart(&self) {
        let started = self.autostart.iter().map(|name| {
            let handle = &self.handles[name];
            async move { (name, handle.apply(Command::Start).await) }
        });
        for (name, result) in future::join_all(started).await {
            if !result.ok {
                tracing::warn!(
                    program = %name,
                    detail = result.detail.as_deref().unwrap_or(""),
                    "autostart failed"
                );
            }
        }
    }

    /// Point-in-time status of every program, sorted by name.
    pub fn snapshot(&self) -> Vec<ProgramStatus> {
        self.hub.snapshot()
    }

    /// True while every supervisor actor is still accepting commands.
    pub fn healthy(&self) -> bool {
        self.handles.values().all(ProgramHandle::is_alive)
    }

    /// Number of supervised programs.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stops everything, cancels the actors, and waits up to `grace` for
    /// them to finish. Programs still running past the window are reported
    /// in the error; the daemon exits regardless.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), GraceExceeded> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        if !self.handles.is_empty() {
            let _ = self.dispatch(ALL_PROGRAMS, Command::Stop).await;
        }
        self.token.cancel();

        let waits = self.handles.iter().map(|(name, handle)| {
            let join = handle.take_join();
            async move {
                let done = match join {
                    Some(join) => time::timeout(grace, join).await.is_ok(),
                    None => true,
                };
                (name.clone(), done)
            }
        });

        let stuck: Vec<String> = future::join_all(waits)
            .await
            .into_iter()
            .filter(|(_, done)| !done)
            .map(|(name, _)| name)
            .collect();

        if stuck.is_empty() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithinGrace));
            Ok(())
        } else {
            self.bus
                .publish(Event::new(EventKind::GraceExceeded).with_detail(stuck.join(", ")));
            Err(GraceExceeded { grace, stuck })
        }
    }
}
