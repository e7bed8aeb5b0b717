//! Relative-timeout to deadline conversion.
//!
//! Waits are expressed as a relative `Duration` at the API boundary and turned
//! into a [`Deadline`] once, so retries inside a wait never extend the total
//! time a caller can block.

use std::time::{Duration, Instant};

/// An opaque point in monotonic time after which a timed wait gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Deadline(Instant);

impl Deadline {
  /// Returns the deadline `timeout` from now, or `None` if that instant is not
  /// representable (the wait is then effectively unbounded).
  pub(crate) fn after(timeout: Duration) -> Option<Self> {
    Instant::now().checked_add(timeout).map(Deadline)
  }

  /// Time left until the deadline, zero once it has passed.
  pub(crate) fn remaining(&self) -> Duration {
    self.0.saturating_duration_since(Instant::now())
  }

  pub(crate) fn has_elapsed(&self) -> bool {
    Instant::now() >= self.0
  }
}

/// Converts a deadline into the absolute `CLOCK_MONOTONIC` time expected by
/// `pthread_cond_timedwait` on a condition variable configured for that clock.
#[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
pub(crate) fn monotonic_timespec(deadline: Deadline) -> libc::timespec {
  let mut now = libc::timespec { tv_sec: 0, tv_nsec: 0 };
  // CLOCK_MONOTONIC is always available on these targets.
  let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut now) };
  debug_assert_eq!(rc, 0, "clock_gettime(CLOCK_MONOTONIC) failed");
  add_duration(now, deadline.remaining())
}

#[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
fn add_duration(base: libc::timespec, offset: Duration) -> libc::timespec {
  const NANOS_PER_SEC: libc::c_long = 1_000_000_000;

  let secs = libc::time_t::try_from(offset.as_secs()).unwrap_or(libc::time_t::MAX);
  let mut tv_sec = base.tv_sec.saturating_add(secs);
  let mut tv_nsec = base.tv_nsec + offset.subsec_nanos() as libc::c_long;
  if tv_nsec >= NANOS_PER_SEC {
    tv_nsec -= NANOS_PER_SEC;
    tv_sec = tv_sec.saturating_add(1);
  }
  if tv_sec == libc::time_t::MAX {
    // Saturated: clamp the sub-second part so the value stays valid.
    tv_nsec = NANOS_PER_SEC - 1;
  }
  libc::timespec { tv_sec, tv_nsec }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;

  #[test]
  fn deadline_counts_down() {
    let deadline = Deadline::after(Duration::from_millis(50)).unwrap();
    assert!(!deadline.has_elapsed());
    assert!(deadline.remaining() <= Duration::from_millis(50));

    thread::sleep(Duration::from_millis(60));
    assert!(deadline.has_elapsed());
    assert_eq!(deadline.remaining(), Duration::ZERO);
  }

  #[test]
  fn zero_timeout_is_already_due() {
    let deadline = Deadline::after(Duration::ZERO).unwrap();
    assert!(deadline.has_elapsed());
  }

  #[test]
  fn unrepresentable_timeout_is_unbounded() {
    assert!(Deadline::after(Duration::MAX).is_none());
  }

  #[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
  #[test]
  fn timespec_carries_nanoseconds() {
    let base = libc::timespec {
      tv_sec: 10,
      tv_nsec: 900_000_000,
    };
    let ts = add_duration(base, Duration::from_millis(250));
    assert_eq!(ts.tv_sec, 11);
    assert_eq!(ts.tv_nsec, 150_000_000);
  }

  #[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
  #[test]
  fn timespec_saturates() {
    let base = libc::timespec {
      tv_sec: libc::time_t::MAX - 1,
      tv_nsec: 0,
    };
    let ts = add_duration(base, Duration::from_secs(u64::MAX));
    assert_eq!(ts.tv_sec, libc::time_t::MAX);
    assert_eq!(ts.tv_nsec, 999_999_999);
  }
}
