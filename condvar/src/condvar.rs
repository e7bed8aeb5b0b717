use std::fmt;
use std::ptr;
use std::time::Duration;

use parking_lot::lock_api::{self, MutexGuard};

use crate::backend::{Backend, BackendKind};
use crate::builder::CondvarBuilder;
use crate::error::Result;
use crate::mutex::RawLock;
use crate::time::Deadline;

/// A condition variable bound to one mutex for its whole lifetime.
///
/// Waiting requires the guard of that mutex, which proves the caller holds
/// it. Notifications follow Mesa semantics: a woken waiter is only made
/// runnable and must re-check its predicate, and a notify issued while nobody
/// is waiting is lost rather than saved for a later waiter.
///
/// ```
/// use fibre_condvar::{ConditionVariable, Mutex};
/// use std::thread;
///
/// let ready = Mutex::new(false);
/// let cv = ConditionVariable::new(&ready).unwrap();
///
/// thread::scope(|s| {
///   s.spawn(|| {
///     *ready.lock() = true;
///     cv.notify_one().unwrap();
///   });
///
///   let mut guard = ready.lock();
///   cv.wait_while(&mut guard, |ready| !*ready).unwrap();
///   assert!(*guard);
/// });
/// ```
pub struct ConditionVariable<'m, R: RawLock, T: ?Sized> {
  mutex: &'m lock_api::Mutex<R, T>,
  backend: Box<dyn Backend<R>>,
}

impl<R: RawLock, T: ?Sized> fmt::Debug for ConditionVariable<'_, R, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConditionVariable")
      .field("backend", &self.backend.kind())
      .finish_non_exhaustive()
  }
}

impl<'m, R: RawLock, T: ?Sized> ConditionVariable<'m, R, T> {
  /// Creates a condition variable for `mutex` with the default configuration.
  ///
  /// Uses the native backend when the platform and the mutex support it. Use
  /// [`CondvarBuilder`] for other configurations.
  pub fn new(mutex: &'m lock_api::Mutex<R, T>) -> Result<Self> {
    CondvarBuilder::new().build(mutex)
  }

  pub(crate) fn from_parts(mutex: &'m lock_api::Mutex<R, T>, backend: Box<dyn Backend<R>>) -> Self {
    Self { mutex, backend }
  }

  /// Which backend this condition variable runs on.
  pub fn backend_kind(&self) -> BackendKind {
    self.backend.kind()
  }

  /// Blocks until notified.
  ///
  /// The mutex is released only once this thread is registered as a waiter,
  /// and is held again when this returns, on success and on error alike.
  ///
  /// # Panics
  /// Panics if `guard` belongs to a different mutex.
  pub fn wait(&self, guard: &mut MutexGuard<'_, R, T>) -> Result<()> {
    self.wait_until(guard, None).map(|_| ())
  }

  /// Blocks until notified or until `timeout` elapses.
  ///
  /// Returns `true` if a notification woke this thread and `false` on timeout.
  /// When a timeout races a notification, exactly one of the two is reported,
  /// and a notification this thread does not report is left for another
  /// waiter.
  pub fn wait_timeout(&self, guard: &mut MutexGuard<'_, R, T>, timeout: Duration) -> Result<bool> {
    self.wait_until(guard, Deadline::after(timeout))
  }

  /// [`wait_timeout`](Self::wait_timeout) with the timeout in nanoseconds.
  ///
  /// # Panics
  /// Panics if `timeout_nanos` is negative.
  pub fn wait_timeout_nanos(&self, guard: &mut MutexGuard<'_, R, T>, timeout_nanos: i64) -> Result<bool> {
    assert!(
      timeout_nanos >= 0,
      "wait timeout must be non-negative, got {timeout_nanos}ns"
    );
    self.wait_timeout(guard, Duration::from_nanos(timeout_nanos as u64))
  }

  /// Blocks while `condition` returns `true`, re-checking it after every
  /// wakeup.
  pub fn wait_while<F>(&self, guard: &mut MutexGuard<'_, R, T>, mut condition: F) -> Result<()>
  where
    F: FnMut(&mut T) -> bool,
  {
    while condition(&mut **guard) {
      self.wait_until(guard, None)?;
    }
    Ok(())
  }

  /// Blocks while `condition` returns `true`, for at most `timeout` in total.
  ///
  /// Returns `false` if the timeout elapsed with the condition still holding.
  pub fn wait_timeout_while<F>(
    &self,
    guard: &mut MutexGuard<'_, R, T>,
    timeout: Duration,
    mut condition: F,
  ) -> Result<bool>
  where
    F: FnMut(&mut T) -> bool,
  {
    let deadline = Deadline::after(timeout);
    while condition(&mut **guard) {
      if deadline.is_some_and(|d| d.has_elapsed()) {
        return Ok(false);
      }
      self.wait_until(guard, deadline)?;
    }
    Ok(true)
  }

  /// Wakes one waiter, if any is blocked. Which one is unspecified.
  pub fn notify_one(&self) -> Result<()> {
    self.backend.notify_one()
  }

  /// Wakes every waiter blocked at the time of the call.
  pub fn notify_all(&self) -> Result<()> {
    self.backend.notify_all()
  }

  fn wait_until(&self, guard: &mut MutexGuard<'_, R, T>, deadline: Option<Deadline>) -> Result<bool> {
    assert!(
      ptr::eq(MutexGuard::mutex(guard), self.mutex),
      "guard does not belong to this condition variable's mutex"
    );
    // Safety: the guard proves this thread holds the mutex, and the mutable
    // borrow keeps it from being used until the backend has re-locked.
    let raw = unsafe { self.mutex.raw() };
    self.backend.wait(raw, deadline)
  }
}
