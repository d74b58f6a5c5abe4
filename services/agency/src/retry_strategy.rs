//! Exponential backoff for result polling
//!
//! No sleeping here: the client decides what to do with each step. Jitter is
//! disabled so the schedule is exactly 1, 2, 4, ... up to the maximum.

use backoff::backoff::Backoff as _;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use shared::POLL_DELAY_MULTIPLIER;
use std::time::Duration;

use crate::config::PollingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    /// Wait this long before polling again
    Wait(Duration),
    /// The next delay would exceed the maximum; give up
    Exhausted,
}

#[derive(Debug)]
pub struct Backoff {
    schedule: ExponentialBackoff,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(initial)
            .with_randomization_factor(0.0)
            .with_multiplier(POLL_DELAY_MULTIPLIER)
            .with_max_interval(Duration::MAX)
            .with_max_elapsed_time(None)
            .build();

        Self { schedule, max }
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        Self::new(config.initial_delay(), config.max_delay())
    }

    /// Delay for the next retry, then grow it by the multiplier
    pub fn next_step(&mut self) -> BackoffStep {
        let delay = match self.schedule.next_backoff() {
            // Drop the sub-millisecond rounding left by the interval math
            Some(delay) => Duration::from_millis(delay.as_millis() as u64),
            None => return BackoffStep::Exhausted,
        };

        if delay > self.max {
            return BackoffStep::Exhausted;
        }
        BackoffStep::Wait(delay)
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}
