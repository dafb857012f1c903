//! # CEC Remote - Raspberry Pi HDMI-CEC Bridge
//!
//! Turns two GPIO push buttons and a small web API into HDMI-CEC power
//! commands for a TV or AV receiver, spoken through an external
//! `cec-client` process.
//!
//! ## Features
//!
//! - **Debounced buttons**: polled ON/OFF inputs with configurable wiring
//! - **Loop protection**: one cooldown shared by every command source
//! - **Serialized channel**: at most one command in flight, bounded waits,
//!   reconnect on failure
//! - **Web API**: scan, power on/off, status and custom commands, plus a
//!   live WebSocket feed of results
//! - **Cross-compilation**: GPIO support is behind the `gpio` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cec_remote::{channel_from_config, AppConfig, CommandKind, Dispatcher, LogSink, Source};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let channel = channel_from_config(&config.cec);
//!     let dispatcher = Dispatcher::new(channel, &config.dispatch).with_sink(Arc::new(LogSink));
//!
//!     let outcome = dispatcher.dispatch(CommandKind::Status, Source::Api).await;
//!     println!("{}", outcome.text());
//!     dispatcher.shutdown().await;
//! }
//! ```

pub mod cec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod web;

// Re-export public API
pub use cec::{
    channel_from_config, CommandChannel, CommandKind, CommandOutcome, ConnectionState,
    RateLimiter,
};
pub use config::AppConfig;
pub use dispatch::{BroadcastSink, CommandEvent, Dispatcher, LogSink, ResultSink, Source};
pub use error::{RemoteError, Result};
pub use input::{Button, ButtonMonitor, EdgeDetector, InputSource, PressEvent};
pub use web::{start_web_server, AppState, WebConfig};

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 5000;

/// Capacity of the press event queue between the sampler and dispatch
pub const PRESS_QUEUE_CAPACITY: usize = 8;

/// Capacity of the live event broadcast channel
pub const EVENT_BROADCAST_CAPACITY: usize = 64;
