//! A scaled monotonic clock: ticks count fixed-size slices of elapsed
//! wall-clock time since construction (spec.md §4.7).
//!
//! Every public entry point takes `now: Instant` explicitly rather than
//! reading [`Instant::now`] internally, so callers (and this crate's own
//! tests) can drive the clock deterministically instead of sleeping.

use std::time::{Duration, Instant};

use kerpass_error::{Error, Result};

/// `T() = (now - t0).nanoseconds / step`. Construction fails if `step` is
/// zero (spec.md §4.7, "Initialization fails if step <= 0").
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    t0: Instant,
    step_nanos: u128,
}

impl Clock {
    /// Starts the clock at `Instant::now()`.
    pub fn new(step: Duration) -> Result<Self> {
        Self::starting_at(step, Instant::now())
    }

    /// Starts the clock at an explicit `t0`, for deterministic tests.
    pub fn starting_at(step: Duration, t0: Instant) -> Result<Self> {
        if step.is_zero() {
            return Err(Error::validation("clock step must be a positive duration"));
        }
        Ok(Clock {
            t0,
            step_nanos: step.as_nanos(),
        })
    }

    /// `T()` as observed at `now`.
    pub fn tick_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.t0).as_nanos();
        (elapsed / self.step_nanos) as u64
    }

    pub fn now_tick(&self) -> u64 {
        self.tick_at(Instant::now())
    }
}
