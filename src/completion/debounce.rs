//! Debounce timers for query dispatch and result merging.
//!
//! A [`Debounce`] does not sleep by itself. It records a deadline that the
//! engine loop waits on, so every timer the engine owns is driven from one
//! `tokio::select!` and observes paused time in tests.

use std::time::Duration;

use tokio::time::Instant;

/// Default debounce delay in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Maximum debounce delay in milliseconds.
pub const MAX_DEBOUNCE_MS: u64 = 2000;

/// A restartable one-shot deadline.
#[derive(Debug, Clone)]
pub struct Debounce {
    /// Delay between the last trigger and the deadline.
    delay: Duration,

    /// When the timer fires, if armed.
    deadline: Option<Instant>,

    /// Number of times the timer was armed (for tracing).
    generation: u64,
}

impl Debounce {
    /// Creates a disarmed timer. Delays above `MAX_DEBOUNCE_MS` are clamped.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: delay.min(Duration::from_millis(MAX_DEBOUNCE_MS)),
            deadline: None,
            generation: 0,
        }
    }

    /// Creates a timer with the default delay (50ms).
    #[must_use]
    pub fn with_default_delay() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }

    /// Arms the timer at `now + delay`, replacing any earlier deadline.
    ///
    /// Returns the new generation.
    pub fn trigger(&mut self, now: Instant) -> u64 {
        self.generation += 1;
        self.deadline = Some(now + self.delay);
        self.generation
    }

    /// Arms the timer unless it is already armed.
    pub fn arm_if_idle(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.trigger(now);
        }
    }

    /// Disarms the timer.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Disarms the timer if its deadline has passed.
    ///
    /// Returns whether it fired.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Returns the deadline, if armed.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns whether the timer is armed.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns the current generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the debounce delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for Debounce {
    fn default() -> Self {
        Self::with_default_delay()
    }
}
