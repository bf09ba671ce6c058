//! Child-process transport speaking newline-delimited JSON over stdio.

use crate::hub::{
    domain::ClientId,
    ports::{
        TransportConnector, TransportError, TransportEvent, TransportLink, TransportResult,
        TransportSink, TransportTarget,
    },
};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Connector that launches the client's configured command.
///
/// Clients without launch settings are rejected with
/// [`TransportError::UnsupportedTarget`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioTransportConnector;

impl StdioTransportConnector {
    /// Creates a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportConnector for StdioTransportConnector {
    async fn open(&self, target: TransportTarget) -> TransportResult<TransportLink> {
        let Some(config) = target.transport else {
            return Err(TransportError::UnsupportedTarget {
                client_id: target.client_id,
                reason: "client has no stdio launch settings".to_owned(),
            });
        };

        let mut command = Command::new(config.command());
        command
            .args(config.args())
            .envs(config.env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(directory) = config.working_directory() {
            command.current_dir(directory);
        }

        let mut child = command.spawn().map_err(TransportError::runtime)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::runtime(std::io::Error::other("child stdin is not piped")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::runtime(std::io::Error::other("child stdout is not piped")))?;
        debug!(
            client_id = %target.client_id,
            command = config.command(),
            pid = child.id(),
            "spawned tool-provider process"
        );

        let (sender, inbound) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_lines(target.client_id, stdout, sender));
        let sink = StdioSink {
            client_id: target.client_id,
            stdin: Mutex::new(Some(stdin)),
            child: Mutex::new(Some(child)),
            reader,
        };
        Ok(TransportLink::new(Arc::new(sink), inbound))
    }
}

async fn read_lines(
    client_id: ClientId,
    stdout: ChildStdout,
    sender: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let event = match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => TransportEvent::Message(line),
            Ok(None) => TransportEvent::Closed {
                reason: Some("process closed its output".to_owned()),
            },
            Err(err) => {
                warn!(client_id = %client_id, error = %err, "failed to read from tool-provider process");
                TransportEvent::Closed {
                    reason: Some(err.to_string()),
                }
            }
        };
        let closed = matches!(event, TransportEvent::Closed { .. });
        if sender.send(event).is_err() || closed {
            return;
        }
    }
}

struct StdioSink {
    client_id: ClientId,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    reader: JoinHandle<()>,
}

#[async_trait]
impl TransportSink for StdioSink {
    async fn send(&self, message: String) -> TransportResult<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(TransportError::Closed)?;
        stdin
            .write_all(message.as_bytes())
            .await
            .map_err(TransportError::runtime)?;
        stdin.write_all(b"\n").await.map_err(TransportError::runtime)?;
        stdin.flush().await.map_err(TransportError::runtime)
    }

    async fn close(&self) -> TransportResult<()> {
        // Dropping stdin signals end of input to the child.
        drop(self.stdin.lock().await.take());
        self.reader.abort();

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        if let Err(err) = child.start_kill() {
            debug!(client_id = %self.client_id, error = %err, "tool-provider process already exited");
        }
        let status = child.wait().await.map_err(TransportError::runtime)?;
        debug!(client_id = %self.client_id, %status, "tool-provider process stopped");
        Ok(())
    }
}
