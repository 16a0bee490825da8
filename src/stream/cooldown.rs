//! Capture deduplication by time.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Shared "last capture time" with an atomic check-and-update.
#[derive(Debug)]
pub struct CooldownGate {
    cooldown: Duration,
    last: Mutex<Option<Instant>>,
}

impl CooldownGate {
    /// Gate that admits one capture per `cooldown`.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: Mutex::new(None),
        }
    }

    /// Configured cooldown.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Admit a capture at `now` if more than the cooldown has passed since
    /// the last admitted one. The first call is always admitted.
    pub fn try_acquire(&self, now: Instant) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let admitted = match *last {
            None => true,
            Some(prev) => now.saturating_duration_since(prev) > self.cooldown,
        };
        if admitted {
            *last = Some(now);
        }
        admitted
    }

    /// Time of the last admitted capture.
    pub fn last_capture(&self) -> Option<Instant> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
