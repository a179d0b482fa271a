//! Real child processes via `tokio::process`.
//!
//! Children are placed in their own process group so that a graceful stop
//! or force-kill reaches the whole tree, not just the immediate child
//! (a `sh -c` wrapper would otherwise orphan its grandchildren).

use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::program::Program;

use super::{ExitOutcome, ProcessHandle, SignalError, SpawnError, Spawner, StopSignal};

/// Spawns real OS processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsSpawner;

impl Spawner for OsSpawner {
    fn spawn(&self, program: &Program) -> Result<Box<dyn ProcessHandle>, SpawnError> {
        let mut cmd = Command::new(&program.command);
        cmd.args(&program.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = &program.cwd {
            cmd.current_dir(cwd);
        }
        for (key, val) in &program.env {
            cmd.env(key, val);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|source| SpawnError {
            program: program.name.clone(),
            source,
        })?;
        let pgid = child.id().map(|pid| pid as i32);
        Ok(Box::new(OsProcess { child, pgid }))
    }
}

/// Handle to one spawned child and its process group.
struct OsProcess {
    child: Child,
    /// Process-group id captured at spawn; kept after the pid is reaped so
    /// a late force-kill still reaches stragglers in the group.
    pgid: Option<i32>,
}

impl OsProcess {
    #[cfg(unix)]
    fn kill_group(&self, sig: nix::sys::signal::Signal) -> Result<(), SignalError> {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let Some(pgid) = self.pgid else {
            return Err(SignalError::AlreadyExited);
        };
        match killpg(Pid::from_raw(pgid), sig) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(SignalError::AlreadyExited),
            Err(err) => Err(SignalError::Failed(err.to_string())),
        }
    }
}

#[async_trait::async_trait]
impl ProcessHandle for OsProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn signal(&mut self, sig: StopSignal) -> Result<(), SignalError> {
        if self.child.id().is_none() {
            return Err(SignalError::AlreadyExited);
        }
        #[cfg(unix)]
        {
            self.kill_group(sig.into())
        }
        #[cfg(not(unix))]
        {
            let _ = sig;
            Err(SignalError::Failed("signals unsupported".to_string()))
        }
    }

    async fn wait(&mut self) -> ExitOutcome {
        match self.child.wait().await {
            Ok(status) => {
                if let Some(code) = status.code() {
                    ExitOutcome::Exited(code)
                } else {
                    #[cfg(unix)]
                    {
                        use std::os::unix::process::ExitStatusExt;
                        ExitOutcome::Signaled(status.signal())
                    }
                    #[cfg(not(unix))]
                    ExitOutcome::Signaled(None)
                }
            }
            Err(err) => ExitOutcome::Lost(err.to_string()),
        }
    }

    async fn force_kill(&mut self) {
        #[cfg(unix)]
        {
            let _ = self.kill_group(nix::sys::signal::Signal::SIGKILL);
        }
        // start_kill is a no-op error if the child was already reaped.
        let _ = self.child.start_kill();
    }
}
