//! Dual-clock elapsed-time measurement.
//!
//! CPU time decides when a budget has been used up, so derivation cost does
//! not shrink or grow with system load. Wall-clock time bounds the answer on
//! both sides: nothing is reported as elapsed before the wall clock reaches
//! `d`, and everything is reported as elapsed once it reaches `2 * d`, which
//! covers platforms whose CPU-time accounting undercounts.

use crate::cputime::Clock;
use crate::error::KdfError;
use std::time::{Duration, Instant};

/// Start point of a time-bounded operation.
#[derive(Debug)]
pub struct Timer<'a, C: Clock> {
    clock: &'a C,
    wall: Instant,
    cpu: Duration,
}

impl<'a, C: Clock> Timer<'a, C> {
    /// Capture both clocks.
    ///
    /// # Errors
    ///
    /// Returns `KdfError::CpuClock` if the CPU-time source fails.
    pub fn start(clock: &'a C) -> Result<Self, KdfError> {
        let wall = clock.now();
        let cpu = clock.cpu_time()?;
        Ok(Self { clock, wall, cpu })
    }

    /// Wall-clock time since [`start`](Self::start).
    #[must_use]
    pub fn wall_elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.wall)
    }

    /// Returns `true` once `d` has elapsed since the timer started.
    ///
    /// # Errors
    ///
    /// Returns `KdfError::CpuClock` if the CPU-time source fails. The CPU
    /// clock is only consulted while the wall clock sits in `[d, 2d)`.
    pub fn elapsed(&self, d: Duration) -> Result<bool, KdfError> {
        let wall = self.wall_elapsed();
        if wall < d {
            return Ok(false);
        }
        if wall >= d.saturating_mul(2) {
            return Ok(true);
        }
        let cpu = self.clock.cpu_time()?.saturating_sub(self.cpu);
        Ok(cpu >= d)
    }
}
