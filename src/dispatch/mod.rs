//! Routes button presses and API requests through the cooldown gate into
//! the command channel, then reports results to the sinks.

pub mod sink;

pub use sink::{BroadcastSink, CommandEvent, LogSink, ResultSink, Source};

use crate::cec::{CommandChannel, CommandKind, CommandOutcome, RateLimiter};
use crate::config::DispatchConfig;
use crate::input::PressEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Owns the shared command path.
///
/// Built once at startup and shared behind an `Arc`. The limiter and channel
/// are reachable only through here, so every source obeys the same cooldown
/// and the same serialization.
pub struct Dispatcher {
    limiter: RateLimiter,
    channel: Arc<dyn CommandChannel>,
    sinks: Vec<Arc<dyn ResultSink>>,
    gate_queries: bool,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn CommandChannel>, config: &DispatchConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config.cooldown()),
            channel,
            sinks: Vec::new(),
            gate_queries: config.gate_queries,
        }
    }

    /// Add a result sink.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn channel(&self) -> &Arc<dyn CommandChannel> {
        &self.channel
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Power changes and custom commands are always gated; queries only when configured.
    fn requires_gate(&self, kind: &CommandKind) -> bool {
        !kind.is_query() || self.gate_queries
    }

    /// Apply the cooldown. Returns `false` (after notifying) if suppressed.
    fn admit(&self, kind: &CommandKind, source: Source) -> bool {
        if self.requires_gate(kind) && !self.limiter.try_acquire() {
            self.notify(CommandEvent::new(source, kind.clone(), CommandOutcome::RateLimited));
            return false;
        }
        true
    }

    async fn run(&self, kind: CommandKind, source: Source) -> CommandOutcome {
        info!("Sending {} command ({:?})", kind.label(), source);
        let outcome = self.channel.execute(kind.command_text()).await;
        self.notify(CommandEvent::new(source, kind, outcome.clone()));
        outcome
    }

    fn notify(&self, event: CommandEvent) {
        for sink in &self.sinks {
            sink.notify(&event);
        }
    }

    /// Gate, execute and report one command, waiting for its outcome.
    pub async fn dispatch(&self, kind: CommandKind, source: Source) -> CommandOutcome {
        if !self.admit(&kind, source) {
            return CommandOutcome::RateLimited;
        }
        self.run(kind, source).await
    }

    /// Handle a button press without waiting for the command to finish.
    ///
    /// The cooldown is checked immediately, so presses queued behind a slow
    /// command are judged by when they happened. Accepted presses execute on
    /// their own task; `None` means the press was rate limited.
    pub fn handle_press(self: &Arc<Self>, event: PressEvent) -> Option<JoinHandle<CommandOutcome>> {
        let kind = CommandKind::from(event.button);
        let source = Source::Button(event.button);
        if !self.admit(&kind, source) {
            return None;
        }
        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.run(kind, source).await }))
    }

    /// Consume press events until the sender side closes.
    pub fn spawn_press_handler(self: &Arc<Self>, mut events: mpsc::Receiver<PressEvent>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                this.handle_press(event);
            }
            debug!("Press handler finished");
        })
    }

    /// Tear down the command channel.
    pub async fn shutdown(&self) {
        self.channel.shutdown().await;
    }
}
