//! Coalesces bursts of configuration edits into one apply
//!
//! ```text
//! Idle --submit--> PendingDelayed --delay elapsed--> (applied) Idle
//!   \                   |
//!    \--submit(force)-->PendingForced --next poll--> (applied) Idle
//! ```
//!
//! Only the latest snapshot is kept. Once a forced submission is pending,
//! later unforced ones replace the snapshot but keep it forced.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::ChatConfig;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(750);

/// A snapshot released for applying
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub config: ChatConfig,
    pub forced: bool,
}

#[derive(Debug, Default)]
enum Pending {
    #[default]
    Idle,
    Delayed {
        config: ChatConfig,
        received_at: Instant,
    },
    Forced {
        config: ChatConfig,
    },
}

#[derive(Debug)]
pub struct ConfigDebouncer {
    delay: Duration,
    pending: Pending,
}

impl ConfigDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Pending::Idle,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self.pending, Pending::Idle)
    }

    /// Record `config` as the latest snapshot, overwriting any pending one.
    ///
    /// A pending forced snapshot stays forced, so an enable or disable is
    /// never held back by an edit submitted right after it.
    pub fn submit(&mut self, config: ChatConfig, force: bool) {
        let force = force || matches!(self.pending, Pending::Forced { .. });
        self.pending = if force {
            Pending::Forced { config }
        } else {
            Pending::Delayed {
                config,
                received_at: Instant::now(),
            }
        };
    }

    /// Release the pending snapshot if it is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<ConfigUpdate> {
        let due = match &self.pending {
            Pending::Idle => false,
            Pending::Delayed { received_at, .. } => {
                now.saturating_duration_since(*received_at) >= self.delay
            }
            Pending::Forced { .. } => true,
        };
        if !due {
            return None;
        }

        match std::mem::take(&mut self.pending) {
            Pending::Idle => None,
            Pending::Delayed { config, .. } => Some(ConfigUpdate {
                config,
                forced: false,
            }),
            Pending::Forced { config } => Some(ConfigUpdate {
                config,
                forced: true,
            }),
        }
    }
}

impl Default for ConfigDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
