//! Command channel over one long-lived control process.

use super::channel::{
    read_response, ChannelIo, ChannelSpawner, CommandChannel, ConnectionState, Response,
};
use super::outcome::CommandOutcome;
use crate::config::CecConfig;
use crate::error::{RemoteError, Result};
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

struct Connection {
    io: ChannelIo,
    /// Set while an exchange is unfinished; the process may still be
    /// answering a command whose caller timed out or went away
    stale: bool,
}

impl Connection {
    fn is_usable(&mut self) -> bool {
        if self.stale {
            return false;
        }
        match self.io.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }
}

/// Publishes `Connecting` for the life of a connection attempt.
///
/// Dropping it without `finish` (a failed spawn, or a cancelled caller
/// during warm-up) publishes `Disconnected`.
struct Connecting<'a> {
    state: &'a watch::Sender<ConnectionState>,
    done: bool,
}

impl<'a> Connecting<'a> {
    fn start(state: &'a watch::Sender<ConnectionState>) -> Self {
        state.send_replace(ConnectionState::Connecting);
        Self { state, done: false }
    }

    fn finish(mut self) {
        self.done = true;
        self.state.send_replace(ConnectionState::Connected);
    }
}

impl Drop for Connecting<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }
}

/// Serialized access to a single persistent control process.
///
/// The tokio mutex around the connection is fair, so concurrent callers are
/// served in submission order. Connection state is published on a watch
/// channel and can be read without waiting behind a running command.
pub struct PersistentChannel<S: ChannelSpawner> {
    spawner: S,
    config: CecConfig,
    connection: Mutex<Option<Connection>>,
    state: watch::Sender<ConnectionState>,
}

impl<S: ChannelSpawner> PersistentChannel<S> {
    pub fn new(spawner: S, config: CecConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            spawner,
            config,
            connection: Mutex::new(None),
            state,
        }
    }

    /// Spawn a process and wait out the warm-up.
    async fn connect(&self) -> Result<Connection> {
        let connecting = Connecting::start(&self.state);
        info!("Starting persistent CEC client connection");
        let io = self.spawner.spawn().await?;
        time::sleep(self.config.warmup()).await;
        connecting.finish();
        Ok(Connection { io, stale: false })
    }

    /// Make sure `slot` holds a usable connection, replacing a dead or stale one.
    async fn ensure_locked<'a>(&self, slot: &'a mut Option<Connection>) -> Result<&'a mut Connection> {
        let usable = slot.as_mut().map_or(false, Connection::is_usable);
        if !usable {
            if let Some(old) = slot.take() {
                if old.stale {
                    debug!("Replacing connection with an unfinished exchange");
                } else {
                    warn!("CEC client process has exited, reconnecting");
                }
                self.teardown(old).await;
            }
            return Ok(slot.insert(self.connect().await?));
        }
        slot.as_mut()
            .ok_or_else(|| RemoteError::channel_error("connection vanished"))
    }

    async fn teardown(&self, mut connection: Connection) {
        if let Some(child) = connection.io.child.as_mut() {
            if let Err(e) = child.start_kill() {
                debug!("Kill of CEC client failed: {}", e);
            }
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }

    /// Write one command and read its response, all under one deadline.
    ///
    /// The connection is marked stale for the whole exchange and only
    /// cleared on a complete response, so an exchange that times out or is
    /// dropped mid-way forces a fresh process on next use.
    async fn exchange(&self, connection: &mut Connection, command: &str) -> io::Result<Response> {
        let deadline = Instant::now() + self.config.timeout();
        connection.stale = true;

        let stdin = &mut connection.io.stdin;
        let write = async {
            stdin.write_all(command.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        match time::timeout_at(deadline, write).await {
            Ok(written) => written?,
            // The process stopped reading its input.
            Err(_) => return Ok(Response::TimedOut(String::new())),
        }

        let response = read_response(&mut connection.io.stdout, deadline, false, |text| {
            self.config.is_complete(text)
        })
        .await?;
        if let Response::Complete(_) = response {
            connection.stale = false;
        }
        Ok(response)
    }
}

#[async_trait]
impl<S: ChannelSpawner> CommandChannel for PersistentChannel<S> {
    async fn execute(&self, command: &str) -> CommandOutcome {
        let mut slot = self.connection.lock().await;

        let connection = match self.ensure_locked(&mut slot).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to initialize CEC client: {}", e);
                return CommandOutcome::error(format!("Failed to initialize CEC client: {}", e));
            }
        };

        debug!("Sending CEC command: {}", command);
        match self.exchange(connection, command).await {
            Ok(Response::Complete(output)) => {
                debug!("CEC response: {}", output);
                CommandOutcome::Success { output }
            }
            Ok(Response::TimedOut(partial)) => {
                warn!(
                    "No completion marker for {:?} within {}ms",
                    command, self.config.timeout_ms
                );
                CommandOutcome::Timeout { partial }
            }
            Err(e) => {
                error!("Error executing CEC command: {}", e);
                if let Some(dead) = slot.take() {
                    self.teardown(dead).await;
                }
                // One reconnection attempt; the command itself is not resent.
                match self.connect().await {
                    Ok(fresh) => {
                        *slot = Some(fresh);
                    }
                    Err(re) => error!("Reconnection failed: {}", re),
                }
                CommandOutcome::error(format!("Error: {}", e))
            }
        }
    }

    async fn ensure_connected(&self) -> Result<()> {
        let mut slot = self.connection.lock().await;
        self.ensure_locked(&mut slot).await.map(|_| ())
    }

    async fn shutdown(&self) {
        let mut slot = self.connection.lock().await;
        let Some(mut connection) = slot.take() else {
            return;
        };
        let _ = connection.io.stdin.write_all(b"q\n").await;
        let _ = connection.io.stdin.flush().await;
        if let Some(child) = connection.io.child.as_mut() {
            match time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!("CEC client exited with {}", status),
                _ => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill CEC client: {}", e);
                    }
                }
            }
        }
        self.state.send_replace(ConnectionState::Disconnected);
        info!("CEC client connection closed");
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        Some(*self.state.borrow())
    }
}
