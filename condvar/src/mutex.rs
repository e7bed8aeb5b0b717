//! The mutex a condition variable is associated with.
//!
//! Any `lock_api` raw mutex can back the association by implementing
//! [`RawLock`]. The emulated backend only needs `lock`/`unlock`; the native
//! backend additionally needs the OS mutex handle, which a raw lock advertises
//! through [`RawLock::native_handle`].

use parking_lot::lock_api;

/// A raw mutex usable as the associated lock of a
/// [`ConditionVariable`](crate::ConditionVariable).
pub trait RawLock: lock_api::RawMutex + Send + Sync + 'static {
  /// The `pthread_mutex_t` behind this lock, if it has one.
  ///
  /// Returning `Some` lets the native backend hand the mutex straight to
  /// `pthread_cond_wait`. The default is `None`, which restricts the lock to
  /// the emulated backend.
  #[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
  fn native_handle(&self) -> Option<std::ptr::NonNull<libc::pthread_mutex_t>> {
    None
  }
}

impl RawLock for parking_lot::RawMutex {}

impl RawLock for parking_lot::RawFairMutex {}

cfg_if::cfg_if! {
  if #[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))] {
    pub use self::sys::SysRawMutex;

    /// A mutex backed by the platform's `pthread_mutex_t`.
    pub type Mutex<T> = lock_api::Mutex<SysRawMutex, T>;
    /// Guard for [`Mutex`].
    pub type MutexGuard<'a, T> = lock_api::MutexGuard<'a, SysRawMutex, T>;
  } else {
    /// The default mutex on platforms without a native condition variable.
    pub type Mutex<T> = parking_lot::Mutex<T>;
    /// Guard for [`Mutex`].
    pub type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;
  }
}

#[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
mod sys {
  use std::cell::UnsafeCell;
  use std::fmt;
  use std::ptr::NonNull;

  use parking_lot::lock_api;

  use super::RawLock;

  /// A raw lock over a statically initialized `pthread_mutex_t`.
  ///
  /// The mutex must not be moved while locked; `lock_api::Mutex` only hands
  /// out guards by reference, so a locked mutex is always borrowed in place.
  pub struct SysRawMutex {
    inner: UnsafeCell<libc::pthread_mutex_t>,
  }

  // Safety: pthread mutexes are designed to be shared between threads; all
  // access goes through the pthread calls.
  unsafe impl Send for SysRawMutex {}
  unsafe impl Sync for SysRawMutex {}

  impl fmt::Debug for SysRawMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("SysRawMutex").finish_non_exhaustive()
    }
  }

  unsafe impl lock_api::RawMutex for SysRawMutex {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self {
      inner: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
    };

    type GuardMarker = lock_api::GuardNoSend;

    fn lock(&self) {
      let rc = unsafe { libc::pthread_mutex_lock(self.inner.get()) };
      assert_eq!(rc, 0, "pthread_mutex_lock failed");
    }

    fn try_lock(&self) -> bool {
      unsafe { libc::pthread_mutex_trylock(self.inner.get()) == 0 }
    }

    unsafe fn unlock(&self) {
      let rc = libc::pthread_mutex_unlock(self.inner.get());
      debug_assert_eq!(rc, 0, "pthread_mutex_unlock failed");
    }
  }

  impl RawLock for SysRawMutex {
    fn native_handle(&self) -> Option<NonNull<libc::pthread_mutex_t>> {
      NonNull::new(self.inner.get())
    }
  }

  impl Drop for SysRawMutex {
    fn drop(&mut self) {
      // Statically initialized mutexes hold no resources on Linux; destroy
      // anyway so a mutex dropped while locked is caught in debug builds.
      let rc = unsafe { libc::pthread_mutex_destroy(self.inner.get()) };
      debug_assert_eq!(rc, 0, "pthread_mutex_destroy failed");
    }
  }

}
