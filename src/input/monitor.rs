//! Periodic sampling task for the button lines.

use super::debounce::{DigitalInput, EdgeDetector};
use super::source::InputSource;
use super::{Button, PressEvent};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Samples both buttons on a fixed interval and forwards press events.
pub struct ButtonMonitor<S: InputSource> {
    source: S,
    detector: EdgeDetector,
    interval: Duration,
    inputs: Vec<(Button, Option<DigitalInput>)>,
}

impl<S: InputSource + 'static> ButtonMonitor<S> {
    pub fn new(source: S, interval: Duration, debounce: Duration) -> Self {
        Self {
            source,
            detector: EdgeDetector::new(debounce),
            interval,
            inputs: Button::ALL.iter().map(|&b| (b, None)).collect(),
        }
    }

    /// Take one sample of every button.
    ///
    /// An input is seeded by its first successful read and produces no event
    /// on that tick. Failed reads are logged and skipped.
    pub fn sample(&mut self) -> Vec<PressEvent> {
        let mut events = Vec::new();
        for (button, slot) in self.inputs.iter_mut() {
            let level = match self.source.read(*button) {
                Ok(level) => level,
                Err(e) => {
                    warn!("Failed to sample {:?} button: {}", button, e);
                    continue;
                }
            };
            match slot {
                Some(input) => {
                    if let Some(event) = self.detector.poll(input, level) {
                        events.push(event);
                    }
                }
                None => {
                    debug!("{:?} button initial level: {}", button, level);
                    *slot = Some(DigitalInput::new(*button, level));
                }
            }
        }
        events
    }

    /// Run the sampling loop until `stop` flips to true or is dropped.
    ///
    /// Events are handed off with `try_send` so a slow consumer never
    /// stretches the sampling period; a full queue drops the press.
    pub fn spawn(
        mut self,
        events: mpsc::Sender<PressEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Button monitor started on {} ({}ms interval, {}ms debounce)",
                self.source.describe(),
                self.interval.as_millis(),
                self.detector.debounce().as_millis()
            );
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for event in self.sample() {
                            info!("{:?} button pressed", event.button);
                            if let Err(e) = events.try_send(event) {
                                warn!("Dropping {:?} press: {}", event.button, e);
                            }
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Button monitor stopped");
        })
    }
}
