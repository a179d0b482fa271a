//! Unix-socket RPC server.
//!
//! One accept loop, one task per connection, JSON lines both ways. A
//! `status --follow` request turns the connection into a one-way snapshot
//! stream; the subscription ends when the client disconnects (detected on
//! the failed write) or the daemon shuts down.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use crate::error::RpcError;

use super::gateway::{Gateway, Reply};
use super::wire::{Request, Response};

/// Binds the socket and serves connections until the token fires.
///
/// A stale socket file from a previous run is removed before binding; the
/// live one is removed again on the way out.
pub async fn serve(
    path: PathBuf,
    gateway: Arc<Gateway>,
    token: CancellationToken,
) -> Result<(), RpcError> {
    if path.exists() {
        let _ = std::fs::remove_file(&path);
    }
    let listener = UnixListener::bind(&path).map_err(|source| RpcError::Bind {
        path: path.clone(),
        source,
    })?;
    tracing::info!(socket = %path.display(), "rpc server listening");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    let gateway = Arc::clone(&gateway);
                    let token = token.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, gateway, token).await {
                            tracing::debug!(%err, "connection ended with error");
                        }
                    });
                }
                Err(err) => tracing::warn!(%err, "accept failed"),
            },
        }
    }

    remove_socket(&path);
    Ok(())
}

fn remove_socket(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        tracing::debug!(socket = %path.display(), %err, "could not remove socket file");
    }
}

async fn handle_connection(
    stream: UnixStream,
    gateway: Arc<Gateway>,
    token: CancellationToken,
) -> Result<(), RpcError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            _ = token.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Request>(&line) {
            Ok(request) => gateway.handle(request).await,
            Err(err) => Reply::One(Response::Error {
                message: format!("bad request: {err}"),
            }),
        };

        match reply {
            Reply::One(response) => write_line(&mut writer, &response).await?,
            Reply::Stream(mut snapshots) => loop {
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    snapshot = snapshots.recv() => match snapshot {
                        Some(programs) => {
                            write_line(&mut writer, &Response::Snapshot { programs }).await?;
                        }
                        // The hub dropped us (lagging) or went away.
                        None => return Ok(()),
                    },
                }
            },
        }
    }
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<(), RpcError> {
    let mut buf = serde_json::to_vec(response)?;
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    Ok(())
}
