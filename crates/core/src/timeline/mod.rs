use std::time::Duration;

use crate::animation::{Animation, QueryReceiver, Timing};
use crate::Value;

/// Global clock shared by every animation of a test run.
///
/// Time only moves through [`advance`](TimeManager::advance), and not at all
/// while paused.
#[derive(Debug, Default, Clone)]
pub struct TimeManager {
    now: Duration,
    paused: bool,
    pauses: u64,
}

impl TimeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Number of times the clock has been paused since creation.
    pub fn pause_count(&self) -> u64 {
        self.pauses
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.pauses += 1;
        }
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Moves time forward. Returns `false` when paused or `delta` is zero.
    pub fn advance(&mut self, delta: Duration) -> bool {
        if self.paused || delta.is_zero() {
            return false;
        }
        self.now += delta;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockState {
    Stopped,
    Active,
}

/// Running instance of an animation bound to one property.
///
/// Tracks iteration and direction the way an auto-reversing, forever
/// repeating timeline does: iteration `n` covers one forward pass plus its
/// reverse pass, and the global speed is negative during the reverse pass.
#[derive(Debug)]
pub struct AnimationClock {
    animation: Animation,
    timing: Timing,
    state: ClockState,
    began_at: Duration,
    progress: f64,
    iteration: u64,
    speed: f64,
    invalidations: u64,
}

impl AnimationClock {
    pub fn new(animation: Animation, timing: Timing) -> Self {
        Self {
            animation,
            timing,
            state: ClockState::Stopped,
            began_at: Duration::ZERO,
            progress: 0.0,
            iteration: 0,
            speed: 0.0,
            invalidations: 0,
        }
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn is_enumerated(&self) -> bool {
        self.animation.is_enumerated()
    }

    pub fn is_active(&self) -> bool {
        self.state == ClockState::Active
    }

    /// Subscribes to per-query notifications. `None` for animations that do
    /// not count queries.
    pub fn subscribe_queries(&mut self) -> Option<QueryReceiver> {
        match &mut self.animation {
            Animation::Enumerated(animation) => Some(animation.subscribe()),
            Animation::Linear(_) => None,
        }
    }

    /// Starts the clock at global time `now`.
    pub fn begin(&mut self, now: Duration) {
        self.state = ClockState::Active;
        self.began_at = now;
        self.progress = 0.0;
        self.iteration = 1;
        self.speed = 1.0;
        self.invalidations = 0;
    }

    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
        self.speed = 0.0;
    }

    /// 1-based iteration; 0 before the clock has begun.
    pub fn current_iteration(&self) -> u64 {
        self.iteration
    }

    /// `1.0` forwards, `-1.0` while reversing, `0.0` when stopped.
    pub fn current_global_speed(&self) -> f64 {
        self.speed
    }

    pub fn current_progress(&self) -> f64 {
        self.progress
    }

    /// Number of time-invalidations since the clock began.
    pub fn invalidations(&self) -> u64 {
        self.invalidations
    }

    /// Recomputes the clock state for global time `now`. Returns `true` if
    /// the current time was invalidated.
    pub fn advance_to(&mut self, now: Duration) -> bool {
        if self.state != ClockState::Active {
            return false;
        }

        let duration = self.timing.duration.as_secs_f64();
        let elapsed = now.saturating_sub(self.began_at).as_secs_f64();
        if duration <= 0.0 {
            self.progress = 1.0;
            self.invalidations += 1;
            return true;
        }

        let period = if self.timing.auto_reverse {
            duration * 2.0
        } else {
            duration
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let completed = (elapsed / period).floor() as u64;
        let within = elapsed - completed as f64 * period;

        self.iteration = completed + 1;
        if within < duration {
            self.speed = 1.0;
            self.progress = within / duration;
        } else {
            self.speed = -1.0;
            self.progress = 1.0 - (within - duration) / duration;
        }
        self.invalidations += 1;
        true
    }

    /// Current animated value. For enumerated animations this is a query.
    pub fn current_value(&mut self) -> Value {
        self.animation.current_value(self.progress)
    }
}
