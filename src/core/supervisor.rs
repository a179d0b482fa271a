//! Per-program supervision actor.
//!
//! Each program gets one [`ProgramSupervisor`] task owning its child process
//! and its lifecycle state. Commands arrive over a bounded mpsc queue and
//! are answered with an [`EventResult`] once they have taken effect, so a
//! caller's reply is completion-based, not accepted-based.
//!
//! ## Transition table
//! ```text
//!  STOPPED ──start──► STARTING ──spawn ok──► RUNNING ──child exits──┐
//!  EXITED ──start──►     │                      │                   │
//!                        │spawn fails           │stop               ▼
//!                        ▼                      ▼          policy says respawn?
//!                 BACKOFF / EXITED          STOPPING ──exit──► STOPPED
//!                    │      ▲                   │                 no │ yes
//!         timer fires│      │budget gone        │timeout            ▼   ▼
//!                    ▼      │                   ▼               EXITED  BACKOFF
//!                 STARTING ─┘               EXITING ──kill──► STOPPED
//! ```
//!
//! `Stopping` and `Exiting` are transient: the actor drives them to
//! completion inside one command and never parks there, so commands observe
//! only rest states. A manual Stop always lands in `Stopped` and never
//! respawns, whatever the restart policy says.
//!
//! The failure counter increments per consecutive failed cycle and resets
//! when the child survives the settle window, or on an explicit
//! Start/Restart.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{bug_panic, ProgramError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::RestartPolicy;
use crate::process::{ExitOutcome, ProcessHandle, SignalError, Spawner};
use crate::program::{EventResult, Program, ProgramState, ProgramStatus};
use crate::status::StatusHub;

/// Commands a supervisor accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Restart,
}

struct CommandEnvelope {
    cmd: Command,
    reply: oneshot::Sender<EventResult>,
}

/// Commands queue here while the actor is mid-transition.
const COMMAND_QUEUE: usize = 16;

/// Caller-side handle to one supervisor task.
pub(crate) struct ProgramHandle {
    name: Arc<str>,
    tx: mpsc::Sender<CommandEnvelope>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl ProgramHandle {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Sends one command and waits for its completion-based result.
    pub(crate) async fn apply(&self, cmd: Command) -> EventResult {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = CommandEnvelope {
            cmd,
            reply: reply_tx,
        };
        if self.tx.send(envelope).await.is_err() {
            return EventResult::failed(ProgramState::Stopped, "supervisor is gone");
        }
        match reply_rx.await {
            Ok(result) => result,
            Err(_) => EventResult::failed(ProgramState::Stopped, "supervisor dropped the command"),
        }
    }

    /// Takes the actor's join handle, once.
    pub(crate) fn take_join(&self) -> Option<JoinHandle<()>> {
        self.join.lock().unwrap().take()
    }
}

/// The actor: owns the child handle and the state machine for one program.
pub(crate) struct ProgramSupervisor {
    program: Arc<Program>,
    name: Arc<str>,
    spawner: Arc<dyn Spawner>,
    rx: mpsc::Receiver<CommandEnvelope>,
    bus: Bus,
    hub: Arc<StatusHub>,

    state: ProgramState,
    status: ProgramStatus,
    child: Option<Box<dyn ProcessHandle>>,
    /// Consecutive failed cycles since the last settle or explicit start.
    attempts: u32,
    settled: bool,
    settle_at: Option<Instant>,
    run_started: Option<Instant>,
    backoff_until: Option<Instant>,
}

impl ProgramSupervisor {
    /// Spawns the actor task and returns the caller-side handle.
    pub(crate) fn spawn(
        program: Arc<Program>,
        spawner: Arc<dyn Spawner>,
        bus: Bus,
        hub: Arc<StatusHub>,
        token: CancellationToken,
    ) -> ProgramHandle {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let name: Arc<str> = program.name.as_str().into();
        let status = ProgramStatus::initial(&program.name);

        let actor = Self {
            name: Arc::clone(&name),
            spawner,
            rx,
            bus,
            hub,
            state: ProgramState::Stopped,
            status,
            child: None,
            attempts: 0,
            settled: false,
            settle_at: None,
            run_started: None,
            backoff_until: None,
            program,
        };
        let join = tokio::spawn(actor.run(token));

        ProgramHandle {
            name,
            tx,
            join: Mutex::new(Some(join)),
        }
    }

    async fn run(mut self, token: CancellationToken) {
        loop {
            match self.state {
                ProgramState::Running => {
                    let settle_at = self.settle_at.unwrap_or_else(Instant::now);
                    tokio::select! {
                        _ = token.cancelled() => {
                            let _ = self.do_stop().await;
                            return;
                        }
                        envelope = self.rx.recv() => match envelope {
                            Some(envelope) => self.handle_command(envelope).await,
                            None => {
                                let _ = self.do_stop().await;
                                return;
                            }
                        },
                        _ = time::sleep_until(settle_at), if !self.settled => {
                            self.settled = true;
                            self.attempts = 0;
                        }
                        outcome = wait_child(&mut self.child) => {
                            self.on_unexpected_exit(outcome);
                        }
                    }
                }
                ProgramState::Backoff => {
                    let until = self.backoff_until.unwrap_or_else(Instant::now);
                    tokio::select! {
                        _ = token.cancelled() => return,
                        envelope = self.rx.recv() => match envelope {
                            Some(envelope) => self.handle_command(envelope).await,
                            None => return,
                        },
                        _ = time::sleep_until(until) => {
                            self.backoff_until = None;
                            let _ = self.start_attempt();
                        }
                    }
                }
                _ => {
                    tokio::select! {
                        _ = token.cancelled() => return,
                        envelope = self.rx.recv() => match envelope {
                            Some(envelope) => self.handle_command(envelope).await,
                            None => return,
                        },
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, envelope: CommandEnvelope) {
        let result = match envelope.cmd {
            Command::Start => self.cmd_start(),
            Command::Stop => self.cmd_stop().await,
            Command::Restart => self.cmd_restart().await,
        };
        let _ = envelope.reply.send(result);
    }

    fn cmd_start(&mut self) -> EventResult {
        match self.state {
            ProgramState::Starting | ProgramState::Running => {
                EventResult::ok_with(self.state, "already running")
            }
            ProgramState::Stopping | ProgramState::Exiting => {
                EventResult::failed(self.state, "cannot start while stopping")
            }
            ProgramState::Stopped | ProgramState::Exited | ProgramState::Backoff => {
                let was_backoff = self.state == ProgramState::Backoff;
                self.attempts = 0;
                self.backoff_until = None;
                match self.start_attempt() {
                    Ok(()) if was_backoff => {
                        EventResult::ok_with(self.state, "retried ahead of the backoff timer")
                    }
                    Ok(()) => EventResult::ok(self.state),
                    Err(detail) => EventResult::failed(self.state, detail),
                }
            }
        }
    }

    async fn cmd_stop(&mut self) -> EventResult {
        match self.state {
            ProgramState::Running | ProgramState::Starting => match self.do_stop().await {
                Ok(()) => EventResult::ok(self.state),
                // Force-killed, but stopped nonetheless.
                Err(err) => EventResult::ok_with(self.state, err.to_string()),
            },
            ProgramState::Backoff => {
                self.enter_stopped();
                EventResult::ok_with(self.state, "pending retry cancelled")
            }
            ProgramState::Stopped => EventResult::ok_with(self.state, "already stopped"),
            ProgramState::Exited => EventResult::ok_with(self.state, "not running (exited)"),
            ProgramState::Stopping | ProgramState::Exiting => {
                EventResult::ok_with(self.state, "stop already in progress")
            }
        }
    }

    async fn cmd_restart(&mut self) -> EventResult {
        match self.state {
            ProgramState::Running | ProgramState::Starting => {
                let stop = self.do_stop().await;
                self.attempts = 0;
                match (self.start_attempt(), stop) {
                    (Ok(()), Ok(())) => EventResult::ok(self.state),
                    (Ok(()), Err(err)) => EventResult::ok_with(self.state, err.to_string()),
                    (Err(detail), Ok(())) => EventResult::failed(self.state, detail),
                    // Both halves went wrong; report both.
                    (Err(detail), Err(err)) => {
                        EventResult::failed(self.state, format!("{err}; {detail}"))
                    }
                }
            }
            ProgramState::Stopped | ProgramState::Exited | ProgramState::Backoff => {
                let was = self.state;
                self.attempts = 0;
                self.backoff_until = None;
                match self.start_attempt() {
                    Ok(()) => EventResult::ok_with(self.state, format!("was not running ({was})")),
                    Err(detail) => EventResult::failed(self.state, detail),
                }
            }
            ProgramState::Stopping | ProgramState::Exiting => {
                EventResult::failed(self.state, "cannot restart while stopping")
            }
        }
    }

    /// One spawn attempt: `Starting`, then `Running` or the failure path.
    ///
    /// Callers must have released any previous child first; a program never
    /// owns two processes at once.
    fn start_attempt(&mut self) -> Result<(), String> {
        if self.state.has_live_child() || self.child.is_some() {
            bug_panic("spawn requested while a child handle is still live");
        }
        self.set_state(ProgramState::Starting);
        self.publish(Event::new(EventKind::Starting).with_attempt(self.attempts));

        match self.spawner.spawn(&self.program) {
            Ok(child) => {
                let pid = child.id();
                self.child = Some(child);
                self.run_started = Some(Instant::now());
                self.settle_at = Some(Instant::now() + self.program.settle);
                self.settled = false;
                self.status.start_time = Some(SystemTime::now());
                self.status.uptime = Duration::ZERO;
                self.status.pid = pid;
                self.set_state(ProgramState::Running);

                let mut event = Event::new(EventKind::Running);
                if let Some(pid) = pid {
                    event = event.with_pid(pid);
                }
                self.publish(event);
                Ok(())
            }
            Err(err) => {
                let detail = err.to_string();
                self.publish(
                    Event::new(EventKind::SpawnFailed)
                        .with_attempt(self.attempts)
                        .with_detail(detail.clone()),
                );
                let respawn = self.program.restart != RestartPolicy::Never;
                self.resolve_failure(respawn, detail.clone());
                Err(detail)
            }
        }
    }

    /// Drives `Stopping` (and `Exiting` on timeout) through to `Stopped`.
    async fn do_stop(&mut self) -> Result<(), ProgramError> {
        let Some(mut child) = self.child.take() else {
            self.enter_stopped();
            return Ok(());
        };

        self.set_state(ProgramState::Stopping);
        self.publish(Event::new(EventKind::Stopping));

        let escalate = match child.signal(self.program.stop_signal) {
            Ok(()) | Err(SignalError::AlreadyExited) => false,
            Err(SignalError::Failed(err)) => {
                tracing::warn!(program = %self.name, %err, "stop signal failed, escalating");
                true
            }
        };

        let timeout = self.program.stop_timeout;
        let graceful = if escalate {
            None
        } else {
            time::timeout(timeout, child.wait()).await.ok()
        };

        match graceful {
            Some(_outcome) => {
                self.freeze_child_stats();
                self.enter_stopped();
                Ok(())
            }
            None => {
                self.set_state(ProgramState::Exiting);
                self.publish(
                    Event::new(EventKind::ForceKill)
                        .with_detail(format!("no exit within {timeout:?}")),
                );
                child.force_kill().await;
                let _ = child.wait().await;
                self.freeze_child_stats();
                self.enter_stopped();
                Err(ProgramError::StopTimeout {
                    program: self.name.to_string(),
                    timeout,
                })
            }
        }
    }

    /// The child exited without a stop being requested.
    fn on_unexpected_exit(&mut self, outcome: ExitOutcome) {
        self.freeze_child_stats();
        let detail = outcome.describe();
        self.publish(Event::new(EventKind::UnexpectedExit).with_detail(detail.clone()));
        let respawn = self.program.restart.should_respawn(outcome.is_success());
        self.resolve_failure(respawn, detail);
    }

    /// Parks the program in `Exited` or arms a backoff retry.
    fn resolve_failure(&mut self, respawn: bool, detail: String) {
        if !respawn {
            self.enter_exited(detail);
            return;
        }
        if self.program.backoff.exhausted(self.attempts) {
            self.publish(
                Event::new(EventKind::BackoffExhausted)
                    .with_attempt(self.attempts)
                    .with_detail(detail),
            );
            let gave_up = ProgramError::BackoffExhausted {
                program: self.name.to_string(),
                attempts: self.attempts,
            };
            self.enter_exited(gave_up.to_string());
            return;
        }

        let delay = self.program.backoff.delay(self.attempts);
        self.attempts += 1;
        self.backoff_until = Some(Instant::now() + delay);
        self.set_state(ProgramState::Backoff);
        self.publish(
            Event::new(EventKind::BackoffScheduled)
                .with_attempt(self.attempts)
                .with_delay(delay)
                .with_detail(detail),
        );
    }

    fn enter_stopped(&mut self) {
        self.attempts = 0;
        self.backoff_until = None;
        self.set_state(ProgramState::Stopped);
        self.publish(Event::new(EventKind::Stopped));
    }

    fn enter_exited(&mut self, detail: String) {
        self.backoff_until = None;
        self.set_state(ProgramState::Exited);
        self.publish(Event::new(EventKind::Exited).with_detail(detail));
    }

    /// Records the final uptime and clears the pid once the child is gone.
    fn freeze_child_stats(&mut self) {
        self.child = None;
        if let Some(started) = self.run_started {
            self.status.uptime = started.elapsed();
        }
        self.status.pid = None;
    }

    fn set_state(&mut self, state: ProgramState) {
        self.state = state;
        self.status.state = state;
        self.hub.update(self.status.clone());
    }

    fn publish(&self, event: Event) {
        self.bus
            .publish(event.with_program(Arc::clone(&self.name)).with_state(self.state));
    }
}

async fn wait_child(child: &mut Option<Box<dyn ProcessHandle>>) -> ExitOutcome {
    match child.as_mut() {
        Some(child) => child.wait().await,
        None => bug_panic("supervisor is in Running with no child handle"),
    }
}
