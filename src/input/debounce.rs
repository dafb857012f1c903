//! Debounced rising-edge detection over sampled button levels.

use super::{Button, PressEvent};
use std::time::{Duration, Instant};

/// Sampled state of one button line.
#[derive(Debug, Clone)]
pub struct DigitalInput {
    button: Button,
    level: bool,
    previous: bool,
    last_edge: Option<Instant>,
}

impl DigitalInput {
    /// Create an input from its first real sample.
    ///
    /// Seeding from an actual read means a button held down at boot does not
    /// produce a press.
    pub fn new(button: Button, first_sample: bool) -> Self {
        Self {
            button,
            level: first_sample,
            previous: first_sample,
            last_edge: None,
        }
    }

    pub fn button(&self) -> Button {
        self.button
    }

    /// Most recent sampled level.
    pub fn level(&self) -> bool {
        self.level
    }

    /// Level before the most recent sample.
    pub fn previous(&self) -> bool {
        self.previous
    }

    /// When the last press was accepted, if ever.
    pub fn last_edge(&self) -> Option<Instant> {
        self.last_edge
    }
}

/// Turns raw samples into press events.
#[derive(Debug, Clone, Copy)]
pub struct EdgeDetector {
    debounce: Duration,
}

impl EdgeDetector {
    pub fn new(debounce: Duration) -> Self {
        Self { debounce }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Feed a fresh sample taken now.
    pub fn poll(&self, input: &mut DigitalInput, sample: bool) -> Option<PressEvent> {
        self.poll_at(input, sample, Instant::now())
    }

    /// Feed a sample taken at `now`.
    ///
    /// A press fires on a low to high transition when the debounce window
    /// since this input's last accepted press has passed. The sample always
    /// becomes the new previous level, including when the edge is
    /// suppressed, so a button held through the window cannot fire again
    /// until it has been released.
    pub fn poll_at(&self, input: &mut DigitalInput, sample: bool, now: Instant) -> Option<PressEvent> {
        input.previous = input.level;
        input.level = sample;

        if !(sample && !input.previous) {
            return None;
        }

        let settled = input
            .last_edge
            .map_or(true, |edge| now.saturating_duration_since(edge) >= self.debounce);
        if !settled {
            tracing::trace!("{:?} edge suppressed inside debounce window", input.button);
            return None;
        }

        input.last_edge = Some(now);
        Some(PressEvent {
            button: input.button,
            at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(300);

    /// Feed `samples` spaced `step` apart, returning the indices that fired.
    fn run(samples: &[u8], step: Duration) -> Vec<usize> {
        let detector = EdgeDetector::new(DEBOUNCE);
        let start = Instant::now();
        let mut input = DigitalInput::new(Button::On, samples[0] == 1);
        let mut fired = Vec::new();
        for (i, &s) in samples.iter().enumerate().skip(1) {
            let now = start + step * i as u32;
            if detector.poll_at(&mut input, s == 1, now).is_some() {
                fired.push(i);
            }
        }
        fired
    }

    #[test]
    fn test_rising_edge_fires_once() {
        assert_eq!(run(&[0, 0, 1, 1, 1, 1], Duration::from_millis(20)), vec![2]);
    }

    #[test]
    fn test_release_never_fires() {
        assert!(run(&[1, 1, 0, 0], Duration::from_millis(500)).is_empty());
    }

    #[test]
    fn test_held_at_boot_does_not_fire() {
        assert!(run(&[1, 1, 1], Duration::from_millis(20)).is_empty());
    }

    #[test]
    fn test_bounce_inside_window_suppressed() {
        // Contact chatter within 60ms of the first edge.
        assert_eq!(run(&[0, 1, 0, 1, 0, 1], Duration::from_millis(20)), vec![1]);
    }

    #[test]
    fn test_second_press_after_window() {
        assert_eq!(run(&[0, 1, 0, 1], Duration::from_millis(200)), vec![1, 3]);
    }

    #[test]
    fn test_suppressed_edge_still_updates_previous() {
        let detector = EdgeDetector::new(DEBOUNCE);
        let t0 = Instant::now();
        let mut input = DigitalInput::new(Button::Off, false);

        assert!(detector.poll_at(&mut input, true, t0).is_some());
        assert!(detector.poll_at(&mut input, false, t0 + Duration::from_millis(50)).is_none());
        // Re-press inside the window is swallowed...
        assert!(detector.poll_at(&mut input, true, t0 + Duration::from_millis(100)).is_none());
        assert!(!input.previous() && input.level());
        // ...and holding it past the window does not fire late.
        assert!(detector.poll_at(&mut input, true, t0 + Duration::from_millis(400)).is_none());
        assert_eq!(input.last_edge(), Some(t0));
    }

    #[test]
    fn test_jittered_sampling_still_detects_press() {
        let detector = EdgeDetector::new(DEBOUNCE);
        let t0 = Instant::now();
        let mut input = DigitalInput::new(Button::On, false);
        let offsets = [0u64, 35, 51, 90, 104];
        let levels = [false, false, true, true, false];
        let mut presses = 0;
        for (ms, level) in offsets.iter().zip(levels) {
            if detector
                .poll_at(&mut input, level, t0 + Duration::from_millis(*ms))
                .is_some()
            {
                presses += 1;
            }
        }
        assert_eq!(presses, 1);
    }
}
