//! Shared cooldown guard in front of the control channel.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Rejects commands that arrive within `cooldown` of the last accepted one.
///
/// One limiter guards every source (buttons and API alike). This stops a
/// device's own CEC replies from re-triggering commands in a loop.
#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    last_accepted: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: Mutex::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Try to claim the channel now.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Try to claim the channel at `now`.
    ///
    /// The check and the timestamp update happen under one lock, so two
    /// callers racing inside the same window cannot both succeed.
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut last = self.last_accepted.lock().unwrap_or_else(|e| e.into_inner());
        let ready = last.map_or(true, |t| now.saturating_duration_since(t) >= self.cooldown);
        if ready {
            *last = Some(now);
        } else {
            tracing::warn!("Command rate limited to prevent looping");
        }
        ready
    }

    /// Time left until the next command would be accepted.
    pub fn remaining(&self) -> Duration {
        let last = self.last_accepted.lock().unwrap_or_else(|e| e.into_inner());
        last.map_or(Duration::ZERO, |t| self.cooldown.saturating_sub(t.elapsed()))
    }
}
