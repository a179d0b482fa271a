//! Scripted processes for state-machine tests.
//!
//! [`FakeSpawner`] hands out one scripted behavior per spawn, then falls
//! back to [`FakeBehavior::RunUntilStopped`]. Pids are sequential so tests
//! can assert that a restart produced a different process identity.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::program::Program;

use super::{ExitOutcome, ProcessHandle, SignalError, SpawnError, Spawner, StopSignal};

#[derive(Clone, Debug)]
pub(crate) enum FakeBehavior {
    /// The spawn itself fails.
    FailSpawn,
    /// The process exits on its own after `delay`.
    ExitAfter {
        delay: Duration,
        outcome: ExitOutcome,
    },
    /// The process runs until it receives the stop signal, then exits.
    RunUntilStopped,
    /// The process ignores the stop signal; only force-kill ends it.
    IgnoreStopSignal,
}

pub(crate) struct FakeSpawner {
    script: Mutex<VecDeque<FakeBehavior>>,
    next_pid: AtomicU32,
}

impl FakeSpawner {
    pub(crate) fn new(script: Vec<FakeBehavior>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            next_pid: AtomicU32::new(1000),
        }
    }

    pub(crate) fn well_behaved() -> Self {
        Self::new(Vec::new())
    }
}

impl Spawner for FakeSpawner {
    fn spawn(&self, program: &Program) -> Result<Box<dyn ProcessHandle>, SpawnError> {
        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FakeBehavior::RunUntilStopped);

        if matches!(behavior, FakeBehavior::FailSpawn) {
            return Err(SpawnError {
                program: program.name.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such binary"),
            });
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(FakeProcess {
            pid,
            behavior,
            spawned_at: Instant::now(),
            reaped: false,
            stop_tx,
            stop_rx,
        }))
    }
}

struct FakeProcess {
    pid: u32,
    behavior: FakeBehavior,
    spawned_at: Instant,
    reaped: bool,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

#[async_trait::async_trait]
impl ProcessHandle for FakeProcess {
    fn id(&self) -> Option<u32> {
        if self.reaped {
            None
        } else {
            Some(self.pid)
        }
    }

    fn signal(&mut self, _sig: StopSignal) -> Result<(), SignalError> {
        if self.reaped {
            return Err(SignalError::AlreadyExited);
        }
        match self.behavior {
            FakeBehavior::RunUntilStopped => {
                let _ = self.stop_tx.send(true);
                Ok(())
            }
            // Delivered but ignored by the "process".
            _ => Ok(()),
        }
    }

    async fn wait(&mut self) -> ExitOutcome {
        let outcome = match &self.behavior {
            FakeBehavior::FailSpawn => unreachable!("failed spawns produce no handle"),
            FakeBehavior::ExitAfter { delay, outcome } => {
                tokio::time::sleep_until(self.spawned_at + *delay).await;
                outcome.clone()
            }
            FakeBehavior::RunUntilStopped | FakeBehavior::IgnoreStopSignal => {
                let mut rx = self.stop_rx.clone();
                while !*rx.borrow() {
                    if rx.changed().await.is_err() {
                        break;
                    }
                }
                ExitOutcome::Signaled(Some(15))
            }
        };
        self.reaped = true;
        outcome
    }

    async fn force_kill(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}
