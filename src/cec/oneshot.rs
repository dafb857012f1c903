//! Command channel that starts a fresh process per command.

use super::channel::{read_response, ChannelIo, ChannelSpawner, CommandChannel, Response};
use super::outcome::CommandOutcome;
use crate::config::CecConfig;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tracing::{debug, error, warn};

/// Runs each command in its own control process (`cec-client -s`).
///
/// There is no connection to keep alive, so no reconnection state. A
/// response completes on a marker or when the process closes its output.
pub struct OneshotChannel<S: ChannelSpawner> {
    spawner: S,
    config: CecConfig,
    serial: Mutex<()>,
}

impl<S: ChannelSpawner> OneshotChannel<S> {
    pub fn new(spawner: S, config: CecConfig) -> Self {
        Self {
            spawner,
            config,
            serial: Mutex::new(()),
        }
    }
}

#[async_trait]
impl<S: ChannelSpawner> CommandChannel for OneshotChannel<S> {
    async fn execute(&self, command: &str) -> CommandOutcome {
        let _turn = self.serial.lock().await;
        let deadline = Instant::now() + self.config.oneshot_timeout();

        let ChannelIo {
            mut stdin,
            mut stdout,
            mut child,
        } = match self.spawner.spawn().await {
            Ok(io) => io,
            Err(e) => {
                error!("Failed to start one-shot CEC client: {}", e);
                return CommandOutcome::error(e.to_string());
            }
        };

        debug!("Sending one-shot CEC command: {}", command);
        // Closing stdin tells the client there is nothing more to run.
        let written = time::timeout_at(deadline, async {
            stdin.write_all(command.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.shutdown().await
        })
        .await;
        drop(stdin);
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Error writing one-shot CEC command: {}", e);
                return CommandOutcome::error(format!("Error: {}", e));
            }
            Err(_) => {
                warn!("One-shot CEC client did not accept the command in time");
                return CommandOutcome::Timeout {
                    partial: String::new(),
                };
            }
        }

        let outcome = match read_response(&mut stdout, deadline, true, |text| {
            self.config.is_complete(text)
        })
        .await
        {
            Ok(Response::Complete(output)) => CommandOutcome::Success { output },
            Ok(Response::TimedOut(partial)) => {
                warn!(
                    "One-shot CEC client gave no answer within {}ms",
                    self.config.oneshot_timeout_ms
                );
                CommandOutcome::Timeout { partial }
            }
            Err(e) => CommandOutcome::error(format!("Error: {}", e)),
        };

        if let Some(child) = child.as_mut() {
            if let Err(e) = child.kill().await {
                debug!("One-shot CEC client already gone: {}", e);
            }
        }
        outcome
    }
}
