//! Per-direction cooldown gates.

use std::time::{Duration, Instant};

/// Guards one scale direction: after an action fires, the gate stays
/// closed until the cooldown has elapsed.
///
/// Expiry is a pure function of the clock the caller passes in; the gate
/// holds no timer and is re-checked lazily on every tick.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown: Duration,
    last_fired: Option<Instant>,
}

impl CooldownGate {
    /// A gate that is ready immediately and closes for `cooldown` after
    /// every [`stamp`](Self::stamp).
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired: None,
        }
    }

    /// Whether an action in this direction may fire at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now.duration_since(last) >= self.cooldown,
        }
    }

    /// Record a successful action at `now`, closing the gate for the
    /// cooldown duration. Failed actions are never stamped.
    pub fn stamp(&mut self, now: Instant) {
        self.last_fired = Some(now);
    }
}
