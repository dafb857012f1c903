//! Digital input sources for the ON and OFF buttons.
//!
//! The Raspberry Pi back end is feature-gated so the crate builds on
//! machines without GPIO. [`ScriptedInputs`] is always available for tests
//! and simulation.

use super::Button;
use crate::config::InputConfig;
use crate::error::{RemoteError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// A pollable source of logical button levels.
///
/// `read` returns `true` while the button is pressed, after any
/// active-low inversion has been applied.
pub trait InputSource: Send {
    fn read(&mut self, button: Button) -> Result<bool>;

    /// Human readable description for logs.
    fn describe(&self) -> String;
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use crate::config::PullMode;
    use rppal::gpio::{Gpio, InputPin};

    /// Raspberry Pi button lines using rppal.
    pub struct RaspberryPiInputs {
        on: InputPin,
        off: InputPin,
        on_pin: u8,
        off_pin: u8,
        active_high: bool,
    }

    impl RaspberryPiInputs {
        /// Claim and configure both button pins.
        pub fn new(config: &InputConfig) -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| {
                RemoteError::setup_error(format!("Failed to initialize GPIO: {}", e))
            })?;

            let claim = |pin: u8| -> Result<InputPin> {
                let pin = gpio.get(pin).map_err(|e| {
                    RemoteError::setup_error(format!("Failed to claim pin {}: {}", pin, e))
                })?;
                Ok(match config.pull {
                    PullMode::Down => pin.into_input_pulldown(),
                    PullMode::Up => pin.into_input_pullup(),
                    PullMode::Off => pin.into_input(),
                })
            };

            Ok(Self {
                on: claim(config.on_pin)?,
                off: claim(config.off_pin)?,
                on_pin: config.on_pin,
                off_pin: config.off_pin,
                active_high: config.active_high,
            })
        }
    }

    impl InputSource for RaspberryPiInputs {
        fn read(&mut self, button: Button) -> Result<bool> {
            let pin = match button {
                Button::On => &self.on,
                Button::Off => &self.off,
            };
            Ok(pin.is_high() == self.active_high)
        }

        fn describe(&self) -> String {
            format!(
                "GPIO (ON=BCM{}, OFF=BCM{}, active {})",
                self.on_pin,
                self.off_pin,
                if self.active_high { "high" } else { "low" }
            )
        }
    }
}

#[cfg(not(feature = "gpio"))]
mod unavailable {
    use super::*;

    /// Placeholder for builds without GPIO support.
    pub struct UnavailableInputs;

    impl UnavailableInputs {
        pub fn new(config: &InputConfig) -> Result<Self> {
            Err(RemoteError::setup_error(format!(
                "GPIO not available on this build (wanted pins {} and {})",
                config.on_pin, config.off_pin
            )))
        }
    }

    impl InputSource for UnavailableInputs {
        fn read(&mut self, button: Button) -> Result<bool> {
            Err(RemoteError::input_error(format!(
                "GPIO not available (attempted to read {:?})",
                button
            )))
        }

        fn describe(&self) -> String {
            "unavailable".to_string()
        }
    }
}

// Re-export the appropriate input source
#[cfg(feature = "gpio")]
pub use raspberry_pi::RaspberryPiInputs as DefaultInputSource;

#[cfg(not(feature = "gpio"))]
pub use unavailable::UnavailableInputs as DefaultInputSource;

/// Scripted button levels.
///
/// Each button replays its queued samples in order; `None` simulates a
/// failed read. Once a queue is drained the last good level repeats.
/// Clones share the same queues, so samples can be pushed while a monitor
/// owns another handle.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInputs {
    state: Arc<Mutex<HashMap<Button, Script>>>,
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Option<bool>>,
    last: bool,
}

impl ScriptedInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue levels for `button`, given as 0/1 for readability.
    pub fn push_levels(&self, button: Button, levels: &[u8]) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let script = state.entry(button).or_default();
        script.queue.extend(levels.iter().map(|&l| Some(l != 0)));
    }

    /// Queue one failed read for `button`.
    pub fn push_failure(&self, button: Button) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entry(button).or_default().queue.push_back(None);
    }

    /// Samples not yet consumed for `button`.
    pub fn pending(&self, button: Button) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.get(&button).map_or(0, |s| s.queue.len())
    }
}

impl InputSource for ScriptedInputs {
    fn read(&mut self, button: Button) -> Result<bool> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let script = state.entry(button).or_default();
        match script.queue.pop_front() {
            Some(Some(level)) => {
                script.last = level;
                Ok(level)
            }
            Some(None) => Err(RemoteError::input_error(format!(
                "scripted read failure on {:?}",
                button
            ))),
            None => Ok(script.last),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_replays_then_holds() {
        let mut inputs = ScriptedInputs::new();
        inputs.push_levels(Button::On, &[0, 1]);
        assert!(!inputs.read(Button::On).unwrap());
        assert!(inputs.read(Button::On).unwrap());
        assert!(inputs.read(Button::On).unwrap());
        assert!(!inputs.read(Button::Off).unwrap());
    }

    #[test]
    fn test_scripted_failure() {
        let mut inputs = ScriptedInputs::new();
        inputs.push_levels(Button::Off, &[1]);
        inputs.push_failure(Button::Off);
        assert!(inputs.read(Button::Off).unwrap());
        assert!(inputs.read(Button::Off).is_err());
        assert!(inputs.read(Button::Off).unwrap());
    }

    #[test]
    fn test_clones_share_queues() {
        let inputs = ScriptedInputs::new();
        let mut reader = inputs.clone();
        inputs.push_levels(Button::On, &[1]);
        assert_eq!(inputs.pending(Button::On), 1);
        assert!(reader.read(Button::On).unwrap());
        assert_eq!(inputs.pending(Button::On), 0);
    }

    #[cfg(not(feature = "gpio"))]
    #[test]
    fn test_unavailable_source() {
        assert!(DefaultInputSource::new(&InputConfig::default()).is_err());
    }
}
