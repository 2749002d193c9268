//! Per-user cooldowns
//!
//! Entries are created on `record` and evicted lazily the first time a
//! check finds their window elapsed. There is no background sweep.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Cooldown tracker keyed by case-insensitive username
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    last_trigger: HashMap<String, Instant>,
}

impl RateLimiter {
    /// A zero window disables limiting.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_trigger: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_enabled(&self) -> bool {
        !self.window.is_zero()
    }

    pub fn is_on_cooldown(&mut self, key: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let key = key.to_lowercase();
        let Some(last) = self.last_trigger.get(&key) else {
            return false;
        };

        if last.elapsed() >= self.window {
            self.last_trigger.remove(&key);
            return false;
        }

        true
    }

    pub fn record(&mut self, key: &str) {
        if !self.is_enabled() {
            return;
        }
        self.last_trigger.insert(key.to_lowercase(), Instant::now());
    }

    /// Forget every entry and adopt a (possibly new) window.
    pub fn reset(&mut self, window: Duration) {
        self.window = window;
        self.last_trigger.clear();
    }

    pub fn len(&self) -> usize {
        self.last_trigger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_trigger.is_empty()
    }
}

/// The two independent limiters used by the intake stage
#[derive(Debug)]
pub struct Cooldowns {
    pub trigger: RateLimiter,
    pub greet: RateLimiter,
}

impl Cooldowns {
    pub fn new(trigger_window: Duration, greet_window: Duration) -> Self {
        Self {
            trigger: RateLimiter::new(trigger_window),
            greet: RateLimiter::new(greet_window),
        }
    }

    pub fn reset(&mut self, trigger_window: Duration, greet_window: Duration) {
        self.trigger.reset(trigger_window);
        self.greet.reset(greet_window);
    }
}
