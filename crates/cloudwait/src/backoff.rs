//! Delay schedules between attempts

use std::time::Duration;

/// Upper bound for any computed step, mirroring the refresh helper cloud
/// providers have long used.
pub const MAX_STEP: Duration = Duration::from_secs(10);

/// First step of the polling schedule before `min_poll_interval` is applied
pub const INITIAL_POLL_STEP: Duration = Duration::from_millis(100);

/// Backoff configuration for retrying a mutating call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay after the first failure
    pub initial_delay: Duration,

    /// Delay never grows past this
    pub max_delay: Duration,

    /// Growth factor; `1.0` gives a fixed interval
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: MAX_STEP,
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    /// Capped exponential backoff
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 2.0,
        }
    }

    /// The same delay between every attempt
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }

    /// Delay after the `attempt`-th failure (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            return self.max_delay.max(self.initial_delay);
        }
        Duration::from_secs_f64(delay)
    }
}

/// Sleep schedule for state polling
///
/// Without a fixed `poll_interval` the step starts at 100ms, is floored at
/// `min_poll_interval`, capped at 10s, and doubles after every sleep. The
/// floor always wins over the cap.
#[derive(Debug, Clone)]
pub(crate) struct PollSchedule {
    min_poll_interval: Duration,
    poll_interval: Option<Duration>,
    step: Duration,
}

impl PollSchedule {
    pub(crate) fn new(min_poll_interval: Duration, poll_interval: Option<Duration>) -> Self {
        Self {
            min_poll_interval,
            poll_interval,
            step: INITIAL_POLL_STEP,
        }
    }

    /// Next sleep, before clamping to the time remaining
    pub(crate) fn next_step(&mut self) -> Duration {
        if let Some(interval) = self.poll_interval {
            return interval.max(self.min_poll_interval);
        }
        let step = self.step.min(MAX_STEP).max(self.min_poll_interval);
        self.step = step.saturating_mul(2);
        step
    }
}
