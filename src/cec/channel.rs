//! The command channel abstraction and the process plumbing under it.

use super::outcome::CommandOutcome;
use crate::error::{RemoteError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::time::Instant;

/// A serialized, bounded-time request/response channel to the CEC bus.
///
/// Implementations must run at most one command at a time and return within
/// their configured timeout. Callers never see an `Err`: every failure is a
/// [`CommandOutcome`].
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Send one command and collect its response.
    async fn execute(&self, command: &str) -> CommandOutcome;

    /// Bring the channel up ahead of the first command.
    async fn ensure_connected(&self) -> Result<()> {
        Ok(())
    }

    /// Tear down any owned process.
    async fn shutdown(&self) {}

    /// Connection state, for channels that keep one.
    fn connection_state(&self) -> Option<ConnectionState> {
        None
    }
}

/// Lifecycle of a persistent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Streams of a freshly launched control process.
pub struct ChannelIo {
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    /// Owning process handle; `None` for in-memory channels
    pub child: Option<Child>,
}

impl ChannelIo {
    /// Wrap a bidirectional in-memory stream.
    pub fn from_stream<T>(stream: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (stdout, stdin) = tokio::io::split(stream);
        Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            child: None,
        }
    }
}

/// Launches the process behind a channel.
#[async_trait]
pub trait ChannelSpawner: Send + Sync {
    async fn spawn(&self) -> Result<ChannelIo>;
}

/// Spawns a real subprocess with piped stdin and stdout.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: String,
    args: Vec<String>,
}

impl ProcessSpawner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl ChannelSpawner for ProcessSpawner {
    async fn spawn(&self) -> Result<ChannelIo> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RemoteError::setup_error(format!("Failed to start {}: {}", self.program, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RemoteError::setup_error("child stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RemoteError::setup_error("child stdout was not captured"))?;

        tracing::debug!("Spawned {} (pid {:?})", self.program, child.id());
        Ok(ChannelIo {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            child: Some(child),
        })
    }
}

/// How a response read ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Response {
    /// Marker seen, or stream closed when EOF counts as completion
    Complete(String),
    /// Deadline passed; whatever arrived so far
    TimedOut(String),
}

/// Read until `is_complete` accepts the accumulated text or `deadline` passes.
///
/// Reads raw chunks rather than lines so that partial output survives a
/// timeout. An EOF is an error unless `eof_completes` is set.
pub(crate) async fn read_response<R, F>(
    reader: &mut R,
    deadline: Instant,
    eof_completes: bool,
    is_complete: F,
) -> io::Result<Response>
where
    R: AsyncRead + Unpin + ?Sized,
    F: Fn(&str) -> bool,
{
    let mut captured = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match tokio::time::timeout_at(deadline, reader.read(&mut chunk)).await {
            Err(_) => {
                return Ok(Response::TimedOut(
                    String::from_utf8_lossy(&captured).into_owned(),
                ))
            }
            Ok(Ok(0)) if eof_completes => {
                return Ok(Response::Complete(
                    String::from_utf8_lossy(&captured).into_owned(),
                ))
            }
            Ok(Ok(0)) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "control process closed its output",
                ))
            }
            Ok(Ok(n)) => {
                captured.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&captured);
                if is_complete(&text) {
                    return Ok(Response::Complete(text.into_owned()));
                }
            }
            Ok(Err(e)) => return Err(e),
        }
    }
}
