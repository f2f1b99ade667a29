//! Wall-clock and CPU-time sources for time-bounded derivation.
//!
//! On Unix CPU time is read with `getrusage`. Linux, Android and FreeBSD
//! prefer the per-thread counter (`RUSAGE_THREAD`); if the kernel rejects
//! it, the process-wide counter (`RUSAGE_SELF`) is used instead. The choice
//! is made once per process and never revisited.
//!
//! On Windows the calling thread's user time comes from `GetThreadTimes`.
//! Other targets have no CPU-time source and report [`KdfError::CpuClock`].

use crate::error::KdfError;
use std::time::{Duration, Instant};

/// Length of one `FILETIME` tick.
const FILETIME_TICK_NANOS: u64 = 100;

/// Clock pair consumed by [`Timer`](crate::timer::Timer).
pub trait Clock {
    /// Current wall-clock instant.
    fn now(&self) -> Instant;

    /// User CPU time consumed so far by the calling thread (or process).
    ///
    /// Must be monotonic non-decreasing across calls from the same thread.
    ///
    /// # Errors
    ///
    /// Returns `KdfError::CpuClock` if the platform query fails.
    fn cpu_time(&self) -> Result<Duration, KdfError>;
}

/// The real clocks: [`Instant::now`] and [`cpu_time`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn cpu_time(&self) -> Result<Duration, KdfError> {
        cpu_time()
    }
}

/// User CPU time consumed by the current thread, or by the whole process
/// where per-thread accounting is unavailable.
///
/// # Errors
///
/// Returns `KdfError::CpuClock` if the platform query fails or the
/// platform has no CPU-time source.
pub fn cpu_time() -> Result<Duration, KdfError> {
    platform::user_time()
}

/// Returns `true` if [`cpu_time`] measures the calling thread only.
#[must_use]
pub fn is_thread_scoped() -> bool {
    platform::is_thread_scoped()
}

/// Convert a `FILETIME` (100 ns ticks split into two halves) to a duration.
#[cfg_attr(not(windows), allow(dead_code))]
fn filetime_to_duration(high: u32, low: u32) -> Duration {
    let ticks = (u64::from(high) << 32) | u64::from(low);
    let nanos = (ticks % 10_000_000).saturating_mul(FILETIME_TICK_NANOS);
    Duration::from_secs(ticks / 10_000_000).saturating_add(Duration::from_nanos(nanos))
}

// ---------------------------------------------------------------------------
// Platform-specific implementations
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod platform {
    use crate::error::KdfError;
    use std::sync::OnceLock;
    use std::time::Duration;

    static WHO: OnceLock<libc::c_int> = OnceLock::new();

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    fn select_who() -> libc::c_int {
        match getrusage(libc::RUSAGE_THREAD) {
            Err(e) if e.raw_os_error() == Some(libc::EINVAL) => {
                tracing::debug!("RUSAGE_THREAD rejected, falling back to process CPU time");
                libc::RUSAGE_SELF
            }
            _ => libc::RUSAGE_THREAD,
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    const fn select_who() -> libc::c_int {
        libc::RUSAGE_SELF
    }

    fn who() -> libc::c_int {
        *WHO.get_or_init(select_who)
    }

    fn getrusage(who: libc::c_int) -> std::io::Result<Duration> {
        // SAFETY: rusage is a plain C struct; all-zero is a valid value.
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        // SAFETY: getrusage only writes into the provided struct.
        let ret = unsafe { libc::getrusage(who, &raw mut usage) };
        if ret != 0 {
            return Err(std::io::Error::last_os_error());
        }
        let secs = u64::try_from(usage.ru_utime.tv_sec).unwrap_or(0);
        let micros = u32::try_from(usage.ru_utime.tv_usec).unwrap_or(0);
        Ok(Duration::from_secs(secs).saturating_add(Duration::from_micros(u64::from(micros))))
    }

    pub(super) fn user_time() -> Result<Duration, KdfError> {
        getrusage(who()).map_err(|e| KdfError::CpuClock(format!("getrusage failed: {e}")))
    }

    pub(super) fn is_thread_scoped() -> bool {
        #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
        {
            who() == libc::RUSAGE_THREAD
        }
        #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
        {
            false
        }
    }
}

#[cfg(windows)]
mod platform {
    use crate::error::KdfError;
    use std::time::Duration;
    use windows_sys::Win32::Foundation::FILETIME;
    use windows_sys::Win32::System::Threading::{GetCurrentThread, GetThreadTimes};

    const fn zero() -> FILETIME {
        FILETIME {
            dwLowDateTime: 0,
            dwHighDateTime: 0,
        }
    }

    pub(super) fn user_time() -> Result<Duration, KdfError> {
        let (mut creation, mut exit, mut kernel, mut user) = (zero(), zero(), zero(), zero());
        // SAFETY: GetCurrentThread returns a pseudo handle that needs no
        // closing; GetThreadTimes only writes into the four out-structs.
        let ok = unsafe {
            GetThreadTimes(
                GetCurrentThread(),
                &raw mut creation,
                &raw mut exit,
                &raw mut kernel,
                &raw mut user,
            )
        };
        if ok == 0 {
            return Err(KdfError::CpuClock(format!(
                "GetThreadTimes failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(super::filetime_to_duration(
            user.dwHighDateTime,
            user.dwLowDateTime,
        ))
    }

    pub(super) const fn is_thread_scoped() -> bool {
        true
    }
}

#[cfg(not(any(unix, windows)))]
mod platform {
    use crate::error::KdfError;
    use std::time::Duration;

    pub(super) fn user_time() -> Result<Duration, KdfError> {
        Err(KdfError::CpuClock(
            "no CPU-time source on this platform".into(),
        ))
    }

    pub(super) const fn is_thread_scoped() -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
