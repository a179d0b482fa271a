//! Built-in subscriber that logs lifecycle events through `tracing`.

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Logs every runtime event at a level matching its severity.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, event: &Event) {
        let program = event.program.as_deref().unwrap_or("-");
        let detail = event.detail.as_deref().unwrap_or("");
        match event.kind {
            EventKind::Starting => {
                tracing::info!(program, attempt = event.attempt, "starting");
            }
            EventKind::Running => {
                tracing::info!(program, pid = event.pid, "running");
            }
            EventKind::Stopping => tracing::info!(program, "stopping"),
            EventKind::Stopped => tracing::info!(program, "stopped"),
            EventKind::Exited => tracing::info!(program, detail, "exited"),
            EventKind::ForceKill => tracing::warn!(program, detail, "force kill"),
            EventKind::SpawnFailed => {
                tracing::warn!(program, attempt = event.attempt, detail, "spawn failed");
            }
            EventKind::UnexpectedExit => {
                tracing::warn!(program, detail, "unexpected exit");
            }
            EventKind::BackoffScheduled => {
                tracing::info!(program, attempt = event.attempt, delay = ?event.delay, "backoff scheduled");
            }
            EventKind::BackoffExhausted => {
                tracing::error!(program, attempt = event.attempt, "backoff exhausted, giving up");
            }
            EventKind::ShutdownRequested => tracing::info!("shutdown requested"),
            EventKind::AllStoppedWithinGrace => tracing::info!("all programs stopped"),
            EventKind::GraceExceeded => tracing::error!(detail, "shutdown grace exceeded"),
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
