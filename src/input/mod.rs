//! Physical button input: sources, debouncing and the sampling loop.
//!
//! Buttons are polled rather than interrupt driven. Polling keeps one code
//! path for every wiring option and lets the detector be tested with
//! synthetic timestamps.

pub mod debounce;
pub mod monitor;
pub mod source;

pub use debounce::{DigitalInput, EdgeDetector};
pub use monitor::ButtonMonitor;
pub use source::{DefaultInputSource, InputSource, ScriptedInputs};

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Logical buttons on the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    On,
    Off,
}

impl Button {
    pub const ALL: [Button; 2] = [Button::On, Button::Off];
}

/// A debounced press of one button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressEvent {
    pub button: Button,
    /// When the edge was accepted
    pub at: Instant,
}
