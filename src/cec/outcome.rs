//! Command kinds and their outcomes.

use crate::input::Button;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a caller asked the control channel to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "command", rename_all = "snake_case")]
pub enum CommandKind {
    /// Enumerate devices on the bus
    Scan,
    /// Wake every device
    PowerOn,
    /// Put every device in standby
    PowerOff,
    /// Query power status of the TV
    Status,
    /// Pass-through command text
    Custom(String),
}

impl CommandKind {
    /// Line written to the control channel.
    pub fn command_text(&self) -> &str {
        match self {
            CommandKind::Scan => "scan",
            CommandKind::PowerOn => "on 0",
            CommandKind::PowerOff => "standby 0",
            CommandKind::Status => "pow 0",
            CommandKind::Custom(text) => text,
        }
    }

    /// Read-only queries may bypass the rate limiter.
    pub fn is_query(&self) -> bool {
        matches!(self, CommandKind::Scan | CommandKind::Status)
    }

    /// Short label for logs and status displays.
    pub fn label(&self) -> &'static str {
        match self {
            CommandKind::Scan => "SCAN",
            CommandKind::PowerOn => "POWER ON",
            CommandKind::PowerOff => "POWER OFF",
            CommandKind::Status => "STATUS",
            CommandKind::Custom(_) => "CUSTOM",
        }
    }
}

impl From<Button> for CommandKind {
    fn from(button: Button) -> Self {
        match button {
            Button::On => CommandKind::PowerOn,
            Button::Off => CommandKind::PowerOff,
        }
    }
}

/// Result of one command submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// A completion marker arrived; `output` is everything read for the command
    Success { output: String },
    /// No completion marker before the deadline
    Timeout { partial: String },
    /// The channel could not be set up or failed mid-command
    Error { message: String },
    /// Suppressed by the cooldown; nothing was sent
    RateLimited,
}

impl CommandOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success { .. })
    }

    /// Status keyword used in API responses.
    pub fn status(&self) -> &'static str {
        match self {
            CommandOutcome::Success { .. } => "success",
            CommandOutcome::Timeout { .. } => "timeout",
            CommandOutcome::Error { .. } => "error",
            CommandOutcome::RateLimited => "rate_limited",
        }
    }

    /// Text returned to callers: output, partial output or a message.
    pub fn text(&self) -> &str {
        match self {
            CommandOutcome::Success { output } => output,
            CommandOutcome::Timeout { partial } => partial,
            CommandOutcome::Error { message } => message,
            CommandOutcome::RateLimited => {
                "Rate limited. Please wait before sending another command."
            }
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Success { output } => write!(f, "success ({} bytes)", output.len()),
            CommandOutcome::Timeout { partial } => {
                write!(f, "timed out ({} bytes of partial output)", partial.len())
            }
            CommandOutcome::Error { message } => write!(f, "failed: {}", message),
            CommandOutcome::RateLimited => f.write_str("rate limited"),
        }
    }
}
