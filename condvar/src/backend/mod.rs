//! The two implementations behind [`ConditionVariable`](crate::ConditionVariable).

mod emulated;
#[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
mod native;

pub(crate) use emulated::{EmulatedBackend, DEFAULT_GONE_THRESHOLD};
#[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
pub(crate) use native::NativeBackend;

use crate::error::Result;
use crate::mutex::RawLock;
use crate::time::Deadline;

/// Which implementation a condition variable ended up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
  /// Delegates to the platform condition variable.
  Native,
  /// Built from two semaphores and a lock.
  Emulated,
}

/// Which implementation to ask for at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendPreference {
  /// Native when the platform and the mutex support it, emulated otherwise.
  #[default]
  Auto,
  /// Native or fail with [`SyncError::Unsupported`](crate::SyncError::Unsupported).
  Native,
  /// Always the emulated backend.
  Emulated,
}

/// The wait/notify contract every backend implements.
///
/// `lock` is the raw lock of the associated mutex; the caller holds it on
/// entry to `wait`, and `wait` must hold it again on every return path.
pub(crate) trait Backend<R: RawLock>: Send + Sync {
  /// Blocks until notified or until `deadline` passes. Returns `false` only on
  /// timeout.
  fn wait(&self, lock: &R, deadline: Option<Deadline>) -> Result<bool>;

  fn notify_one(&self) -> Result<()>;

  fn notify_all(&self) -> Result<()>;

  fn kind(&self) -> BackendKind;
}

/// Re-locks the associated mutex when dropped, so every exit from a wait
/// (including errors and unwinding) gives the caller its lock back.
pub(crate) struct Relock<'a, R: RawLock> {
  lock: &'a R,
}

impl<'a, R: RawLock> Relock<'a, R> {
  /// Unlocks `lock` now and re-locks it when the returned value drops.
  ///
  /// # Safety
  /// The current thread must hold `lock`.
  pub(crate) unsafe fn unlock(lock: &'a R) -> Self {
    lock.unlock();
    Self { lock }
  }
}

impl<R: RawLock> Drop for Relock<'_, R> {
  fn drop(&mut self) {
    self.lock.lock();
  }
}
