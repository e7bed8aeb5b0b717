use parking_lot::lock_api;
use tracing::debug;

use crate::backend::{Backend, BackendPreference, EmulatedBackend, DEFAULT_GONE_THRESHOLD};
use crate::condvar::ConditionVariable;
use crate::error::{Result, SyncError};
use crate::mutex::RawLock;

#[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
use crate::backend::NativeBackend;

/// Configures and creates a [`ConditionVariable`].
///
/// ```
/// use fibre_condvar::{BackendKind, BackendPreference, CondvarBuilder};
///
/// let state = parking_lot::Mutex::new(0u32);
/// let cv = CondvarBuilder::new()
///   .backend(BackendPreference::Emulated)
///   .gone_threshold(1024)
///   .build(&state)
///   .unwrap();
/// assert_eq!(cv.backend_kind(), BackendKind::Emulated);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondvarBuilder {
  backend: BackendPreference,
  gone_threshold: usize,
}

impl Default for CondvarBuilder {
  fn default() -> Self {
    Self {
      backend: BackendPreference::Auto,
      gone_threshold: DEFAULT_GONE_THRESHOLD,
    }
  }
}

impl CondvarBuilder {
  /// Creates a builder with automatic backend selection.
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets which backend to use.
  pub fn backend(mut self, backend: BackendPreference) -> Self {
    self.backend = backend;
    self
  }

  /// Sets how many timed-out waiters the emulated backend lets accumulate
  /// before folding them out of its parked count. Clamped to at least 1.
  ///
  /// This only bounds internal bookkeeping; it has no observable effect on
  /// wait or notify outcomes.
  pub fn gone_threshold(mut self, threshold: usize) -> Self {
    self.gone_threshold = threshold.max(1);
    self
  }

  /// Builds a condition variable associated with `mutex`.
  ///
  /// Fails if the backend's resources cannot be created, or with
  /// [`SyncError::Unsupported`] if [`BackendPreference::Native`] was requested
  /// and is not available for this platform or mutex.
  pub fn build<'m, R: RawLock, T: ?Sized>(
    &self,
    mutex: &'m lock_api::Mutex<R, T>,
  ) -> Result<ConditionVariable<'m, R, T>> {
    // Safety: only used to probe for an OS handle.
    let raw = unsafe { mutex.raw() };
    let backend = self.select_backend(raw)?;
    debug!(backend = ?backend.kind(), "condition variable created");
    Ok(ConditionVariable::from_parts(mutex, backend))
  }

  fn select_backend<R: RawLock>(&self, raw: &R) -> Result<Box<dyn Backend<R>>> {
    let native = native_available(raw);
    match (self.backend, native) {
      (BackendPreference::Native, false) => Err(SyncError::Unsupported),
      (BackendPreference::Emulated, _) | (BackendPreference::Auto, false) => {
        Ok(Box::new(EmulatedBackend::new(self.gone_threshold)?))
      }
      (BackendPreference::Native, true) | (BackendPreference::Auto, true) => new_native(),
    }
  }
}

#[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
fn native_available<R: RawLock>(raw: &R) -> bool {
  raw.native_handle().is_some()
}

#[cfg(not(all(feature = "native", any(target_os = "linux", target_os = "android"))))]
fn native_available<R: RawLock>(_raw: &R) -> bool {
  false
}

#[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
fn new_native<R: RawLock>() -> Result<Box<dyn Backend<R>>> {
  Ok(Box::new(NativeBackend::new()?))
}

#[cfg(not(all(feature = "native", any(target_os = "linux", target_os = "android"))))]
fn new_native<R: RawLock>() -> Result<Box<dyn Backend<R>>> {
  Err(SyncError::Unsupported)
}
