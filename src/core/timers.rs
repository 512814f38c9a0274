// core/timers.rs

// Time-gated policies of the combat loop: the weapon cooldown and the hit reaction
// window. Both are keyed to a monotonic `now` measured from loop start, so they
// behave identically on hardware and under test.

use std::time::Duration;

/// Enforces the minimum interval between two honored fire commands
#[derive(Debug, Clone)]
pub struct FireCooldown {
    last_fire: Option<Duration>, // None until the first shot
    min_interval: Duration,
}

impl FireCooldown {
    /// Cooldown that allows the first shot immediately
    pub fn new(min_interval: Duration) -> Self {
        FireCooldown {
            last_fire: None,
            min_interval,
        }
    }

    /// Returns true and records `now` only if the cooldown has elapsed.
    /// A refused attempt leaves the gate untouched; nothing is queued.
    pub fn try_fire(&mut self, now: Duration) -> bool {
        if !self.is_ready(now) {
            return false;
        }
        self.last_fire = Some(now);
        true
    }

    /// True if a shot would be honored at `now`
    pub fn is_ready(&self, now: Duration) -> bool {
        match self.last_fire {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.min_interval,
        }
    }

    /// Time left before the next shot can be honored
    pub fn remaining(&self, now: Duration) -> Duration {
        self.last_fire.map_or(Duration::ZERO, |last| {
            self.min_interval.saturating_sub(now.saturating_sub(last))
        })
    }

    /// Time of the last honored shot
    pub fn last_fire(&self) -> Option<Duration> {
        self.last_fire
    }

    /// Configured minimum interval
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// Time-boxed override triggered by incoming fire
#[derive(Debug, Clone)]
pub struct HitReaction {
    triggered_at: Option<Duration>,
    duration: Duration,
}

impl HitReaction {
    /// Idle reaction window of the given length
    pub fn new(duration: Duration) -> Self {
        HitReaction {
            triggered_at: None,
            duration,
        }
    }

    /// (Re)starts the reaction window. A hit while reacting refreshes it, never stacks.
    pub fn on_hit(&mut self, now: Duration) {
        self.triggered_at = Some(now);
    }

    /// True while inside the window of the latest hit
    pub fn is_reacting(&self, now: Duration) -> bool {
        self.triggered_at
            .is_some_and(|t| now.saturating_sub(t) < self.duration)
    }

    /// Clears the timer once the window has fully elapsed. Returns true on the clearing call.
    pub fn expire(&mut self, now: Duration) -> bool {
        if self.triggered_at.is_some() && !self.is_reacting(now) {
            self.triggered_at = None;
            return true;
        }
        false
    }

    /// Time left in the current window
    pub fn remaining(&self, now: Duration) -> Duration {
        self.triggered_at.map_or(Duration::ZERO, |t| {
            self.duration.saturating_sub(now.saturating_sub(t))
        })
    }

    /// Time of the latest hit still on record
    pub fn triggered_at(&self) -> Option<Duration> {
        self.triggered_at
    }

    /// Configured window length
    pub fn duration(&self) -> Duration {
        self.duration
    }
}
