//! Time-bounded derivation and key search.
//!
//! Both operations grow the iteration count exponentially until a time
//! budget is spent. The run starts with [`INITIAL_ITERATIONS`], then after
//! each batch adds `iters >> precision` more, so every batch is a fixed
//! fraction `1 / 2^precision` of the work done so far.
//!
//! The loop runs on a dedicated, named worker thread that borrows the state
//! for the whole run and is joined before returning. Per-thread CPU time
//! then measures the derivation and nothing else.
//!
//! Predicates are called after every batch, in strictly increasing order of
//! iteration count, with the key as of that count. Cancellation is
//! cooperative: a batch always runs to completion.

use crate::cputime::{Clock, SystemClock};
use crate::error::{KdfError, SearchError};
use crate::memory::DerivedKey;
use crate::pbkdf2::Pbkdf2;
use crate::prf::Prf;
use crate::timer::Timer;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::thread;
use std::time::Duration;

/// Size of the first batch of a time-bounded run.
pub const INITIAL_ITERATIONS: u64 = 1024;

/// Highest accepted precision (0.1% growth per batch).
pub const MAX_PRECISION: u32 = 10;

const WORKER_NAME: &str = "kiln-kdf-derive";

/// Growth rate of time-bounded runs.
///
/// Precision `p` grows the iteration count by `1 / 2^p` per batch. Higher
/// values stop closer to the requested duration at the cost of more
/// predicate calls. The expected timing error is `d * r / (r + 2)` with
/// `r = 1 / 2^p`; the default of 4 (6.25% growth) covers 2^32 iterations in
/// about 250 batches with a 3% error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Precision(u32);

impl Precision {
    /// 6.25% growth per batch.
    pub const DEFAULT: Self = Self(4);

    /// # Errors
    ///
    /// Returns `KdfError::InvalidArgument` if `p > 10`.
    pub fn new(p: u32) -> Result<Self, KdfError> {
        if p > MAX_PRECISION {
            return Err(KdfError::InvalidArgument(format!(
                "precision {p} outside 0..={MAX_PRECISION}"
            )));
        }
        Ok(Self(p))
    }

    /// Raw shift amount.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Growth ratio `r = 1 / 2^p`.
    #[must_use]
    pub fn rate(self) -> f64 {
        1.0 / f64::from(1u32.wrapping_shl(self.0))
    }

    /// Budget the loop actually aims for: `d - d * r / (r + 2)`.
    ///
    /// The last batch overshoots by `d * r / (r + 2)` on average; aiming
    /// short by that much keeps the expected total at `d`.
    #[must_use]
    pub fn adjusted_budget(self, d: Duration) -> Duration {
        let r = self.rate();
        d.mul_f64(2.0 / (r + 2.0))
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for Precision {
    type Error = KdfError;

    fn try_from(p: u32) -> Result<Self, Self::Error> {
        Self::new(p)
    }
}

impl From<Precision> for u32 {
    fn from(p: Precision) -> Self {
        p.0
    }
}

/// Verdict returned by a search predicate after each batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Probe<E = Infallible> {
    /// Not the key yet; keep deriving.
    Continue,
    /// The key matches; stop successfully.
    Found,
    /// Stop and hand `E` back to the caller.
    Abort(E),
}

impl<E> Probe<E> {
    /// `Found` if `matched`, `Continue` otherwise.
    #[must_use]
    pub const fn found_if(matched: bool) -> Self {
        if matched {
            Self::Found
        } else {
            Self::Continue
        }
    }
}

/// Why a time-bounded run stopped.
#[derive(Debug)]
enum Outcome<E> {
    Found,
    Aborted(E),
    Elapsed,
}

impl<P: Prf + Send> Pbkdf2<P> {
    /// Derive a new key in approximately `d` of CPU time.
    ///
    /// The state is reset first; afterwards [`iters`](Self::iters) reports
    /// the iteration count that was reached, which is what a later
    /// [`search`](Self::search) must rediscover.
    ///
    /// # Errors
    ///
    /// Returns `KdfError::CpuClock` if CPU time cannot be read, or
    /// `KdfError::Worker` if the worker thread cannot be started.
    pub fn derive(&mut self, d: Duration) -> Result<DerivedKey, KdfError> {
        self.derive_with_precision(d, Precision::DEFAULT)
    }

    /// [`derive`](Self::derive) with an explicit growth rate.
    ///
    /// # Errors
    ///
    /// See [`derive`](Self::derive).
    pub fn derive_with_precision(
        &mut self,
        d: Duration,
        precision: Precision,
    ) -> Result<DerivedKey, KdfError> {
        let (key, _) =
            self.run_controlled(&SystemClock, d, precision, |_| Probe::<Infallible>::Continue)?;
        Ok(key)
    }

    /// Look for a previously derived key within `d`.
    ///
    /// `f` is called with the current key after every batch and should be
    /// cheap: its running time counts against the budget. The search stops
    /// when `f` returns [`Probe::Found`] (the key is returned),
    /// [`Probe::Abort`] (the signal is returned as
    /// [`SearchError::Aborted`]), or when `d` has elapsed
    /// ([`SearchError::Timeout`]).
    ///
    /// Give a search more time than the derivation it is looking for,
    /// typically three to five times as much, especially across machines.
    ///
    /// # Errors
    ///
    /// See above; derivation failures surface as [`SearchError::Kdf`].
    pub fn search<F, E>(&mut self, d: Duration, f: F) -> Result<DerivedKey, SearchError<E>>
    where
        F: FnMut(&[u8]) -> Probe<E> + Send,
        E: Send,
    {
        self.search_with_precision(d, Precision::DEFAULT, f)
    }

    /// [`search`](Self::search) with an explicit growth rate.
    ///
    /// # Errors
    ///
    /// See [`search`](Self::search).
    pub fn search_with_precision<F, E>(
        &mut self,
        d: Duration,
        precision: Precision,
        f: F,
    ) -> Result<DerivedKey, SearchError<E>>
    where
        F: FnMut(&[u8]) -> Probe<E> + Send,
        E: Send,
    {
        match self.run_controlled(&SystemClock, d, precision, f)? {
            (key, Outcome::Found) => Ok(key),
            (_, Outcome::Aborted(e)) => Err(SearchError::Aborted(e)),
            (_, Outcome::Elapsed) => Err(SearchError::Timeout),
        }
    }

    /// Shared engine behind derive and search.
    fn run_controlled<C, F, E>(
        &mut self,
        clock: &C,
        d: Duration,
        precision: Precision,
        mut probe: F,
    ) -> Result<(DerivedKey, Outcome<E>), KdfError>
    where
        C: Clock + Sync,
        F: FnMut(&[u8]) -> Probe<E> + Send,
        E: Send,
    {
        let budget = precision.adjusted_budget(d);
        let shift = precision.get();
        self.clear();

        let state = &mut *self;
        let probe = &mut probe;
        thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name(WORKER_NAME.into())
                .spawn_scoped(scope, move || {
                    let timer = Timer::start(clock)?;
                    let mut key = state.next(INITIAL_ITERATIONS)?;
                    let outcome = loop {
                        match probe(key.expose()) {
                            Probe::Continue => {}
                            Probe::Found => break Outcome::Found,
                            Probe::Abort(e) => break Outcome::Aborted(e),
                        }
                        if timer.elapsed(budget)? {
                            break Outcome::Elapsed;
                        }
                        let batch = state.iters().wrapping_shr(shift);
                        tracing::trace!(iters = state.iters(), batch, "kdf batch");
                        key = state.next(batch)?;
                    };
                    tracing::debug!(
                        iters = state.iters(),
                        wall = ?timer.wall_elapsed(),
                        budget = ?budget,
                        outcome = outcome.label(),
                        "time-bounded derivation finished"
                    );
                    Ok((key, outcome))
                })
                .map_err(|e| KdfError::Worker(format!("failed to spawn {WORKER_NAME}: {e}")))?;
            worker
                .join()
                .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
        })
    }
}

impl<E> Outcome<E> {
    const fn label(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::Aborted(_) => "aborted",
            Self::Elapsed => "elapsed",
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prf::PrfAlgorithm;
    use crate::timer::tests::ManualClock;

    fn state() -> Pbkdf2 {
        Pbkdf2::new(b"pass", b"salt", 16, PrfAlgorithm::Sha256).unwrap()
    }

    #[test]
    fn precision_bounds() {
        assert!(Precision::new(0).is_ok());
        assert!(Precision::new(10).is_ok());
        let err = Precision::new(11).unwrap_err();
        assert!(matches!(err, KdfError::InvalidArgument(_)));
        assert_eq!(Precision::default().get(), 4);
    }

    #[test]
    fn precision_rate_and_budget() {
        let p0 = Precision::new(0).unwrap();
        assert!((p0.rate() - 1.0).abs() < f64::EPSILON);
        // r = 1: d - d/3
        let d = Duration::from_millis(300);
        let got = p0.adjusted_budget(d);
        assert!(got.abs_diff(Duration::from_millis(200)) < Duration::from_micros(1));

        let p4 = Precision::DEFAULT;
        assert!((p4.rate() - 0.0625).abs() < f64::EPSILON);
        assert!(p4.adjusted_budget(d) < d);
        assert_eq!(p4.adjusted_budget(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn precision_serde_rejects_out_of_range() {
        let p: Precision = serde_json::from_str("7").unwrap();
        assert_eq!(p.get(), 7);
        assert!(serde_json::from_str::<Precision>("11").is_err());
        assert_eq!(serde_json::to_string(&p).unwrap(), "7");
    }

    #[test]
    fn probe_found_if() {
        assert_eq!(Probe::<()>::found_if(true), Probe::Found);
        assert_eq!(Probe::<()>::found_if(false), Probe::Continue);
    }

    #[test]
    fn zero_budget_runs_one_batch_and_probes_once() {
        let mut kdf = state();
        let clock = ManualClock::new();
        let mut calls = 0;
        let (key, outcome) = kdf
            .run_controlled(&clock, Duration::ZERO, Precision::DEFAULT, |_| {
                calls += 1;
                Probe::<()>::Continue
            })
            .unwrap();
        assert!(matches!(outcome, Outcome::Elapsed));
        assert_eq!(calls, 1);
        assert_eq!(kdf.iters(), INITIAL_ITERATIONS);
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn found_in_first_batch_with_zero_budget() {
        let mut kdf = state();
        let target = state().next(INITIAL_ITERATIONS).unwrap();
        let key = kdf
            .search(Duration::ZERO, |dk| Probe::<()>::found_if(dk == target.expose()))
            .unwrap();
        assert_eq!(key.expose(), target.expose());
    }

    #[test]
    fn batches_grow_by_shifted_iteration_count() {
        let mut kdf = state();
        let clock = ManualClock::new();
        let mut seen = Vec::new();
        let precision = Precision::new(2).unwrap();
        let (_, outcome) = kdf
            .run_controlled(&clock, Duration::from_secs(1), precision, |_| {
                seen.push(0u64);
                if seen.len() == 5 {
                    Probe::Abort("enough")
                } else {
                    Probe::Continue
                }
            })
            .unwrap();
        assert!(matches!(outcome, Outcome::Aborted("enough")));
        // 1024, +256, +320, +400, +500
        assert_eq!(kdf.iters(), 2500);
    }

    #[test]
    fn probe_sees_keys_in_iteration_order() {
        let mut kdf = state();
        let clock = ManualClock::new();
        let mut keys = Vec::new();
        kdf.run_controlled(&clock, Duration::from_secs(1), Precision::new(0).unwrap(), |dk| {
            keys.push(dk.to_vec());
            if keys.len() == 3 {
                Probe::Abort(())
            } else {
                Probe::Continue
            }
        })
        .unwrap();
        // p = 0 doubles: 1024, 2048, 4096.
        for (key, iters) in keys.iter().zip([1024u64, 2048, 4096]) {
            let expected = state().next(iters).unwrap();
            assert_eq!(key.as_slice(), expected.expose());
        }
    }

    #[test]
    fn elapsed_clock_stops_loop() {
        let mut kdf = state();
        let clock = ManualClock::new();
        let mut calls = 0;
        let (_, outcome) = kdf
            .run_controlled(&clock, Duration::from_millis(10), Precision::DEFAULT, |_| {
                calls += 1;
                if calls == 3 {
                    clock.advance(Duration::from_millis(50), Duration::ZERO);
                }
                Probe::<()>::Continue
            })
            .unwrap();
        assert!(matches!(outcome, Outcome::Elapsed));
        assert_eq!(calls, 3);
    }

    #[test]
    fn cpu_clock_failure_is_fatal() {
        let mut kdf = state();
        let clock = ManualClock::failing();
        let err = kdf
            .run_controlled(&clock, Duration::from_millis(10), Precision::DEFAULT, |_| {
                Probe::<()>::Continue
            })
            .unwrap_err();
        assert!(matches!(err, KdfError::CpuClock(_)));
    }

    #[test]
    fn search_abort_passes_signal_through() {
        let mut kdf = state();
        let err = kdf
            .search(Duration::from_secs(5), |_| Probe::Abort("cancelled"))
            .unwrap_err();
        assert!(matches!(err, SearchError::Aborted("cancelled")));
        assert_eq!(kdf.iters(), INITIAL_ITERATIONS);
    }

    #[test]
    fn derive_resets_previous_progress() {
        let mut kdf = state();
        kdf.next(5000).unwrap();
        let clock = ManualClock::new();
        kdf.run_controlled(&clock, Duration::ZERO, Precision::DEFAULT, |_| {
            Probe::<()>::Continue
        })
        .unwrap();
        assert_eq!(kdf.iters(), INITIAL_ITERATIONS);
    }

    #[test]
    fn worker_runs_on_named_thread() {
        let mut kdf = state();
        let clock = ManualClock::new();
        let mut name = None;
        kdf.run_controlled(&clock, Duration::ZERO, Precision::DEFAULT, |_| {
            name = thread::current().name().map(str::to_owned);
            Probe::<()>::Continue
        })
        .unwrap();
        assert_eq!(name.as_deref(), Some(WORKER_NAME));
    }

    #[test]
    #[should_panic(expected = "predicate exploded")]
    fn predicate_panic_reaches_caller() {
        let mut kdf = state();
        let _ = kdf.search(Duration::from_secs(1), |_| -> Probe<()> {
            panic!("predicate exploded")
        });
    }
}
