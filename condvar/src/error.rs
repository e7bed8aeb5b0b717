//! Error types for the condition variable and its semaphores.

use thiserror::Error;

/// Errors reported by the condition variable and its building blocks.
///
/// Timeouts are not errors; they are reported as `Ok(false)` by the timed
/// wait operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
  /// An OS resource needed by the selected backend could not be created.
  /// Anything acquired before the failure has already been released.
  #[error("failed to initialize {resource} (os error {code})")]
  Init {
    /// The resource that failed.
    resource: &'static str,
    /// The OS result code.
    code: i32,
  },

  /// A semaphore was constructed with an initial count above its maximum,
  /// or with a maximum of zero.
  #[error("invalid semaphore counts: initial {initial}, maximum {max}")]
  SemaphoreBounds {
    /// Requested initial count.
    initial: usize,
    /// Requested maximum count.
    max: usize,
  },

  /// A release would push a semaphore past its maximum count.
  #[error("semaphore release would exceed maximum count {max}")]
  SemaphoreOverflow {
    /// The semaphore's maximum count.
    max: usize,
  },

  /// The native backend was requested but this platform or mutex cannot
  /// provide it.
  #[error("native condition variable is unavailable for this mutex or platform")]
  Unsupported,

  /// The blocking primitive returned an unexpected result code.
  #[error("condition wait failed (os error {code})")]
  Wait {
    /// The OS result code.
    code: i32,
  },

  /// A signal or broadcast returned an unexpected result code.
  #[error("condition notify failed (os error {code})")]
  Notify {
    /// The OS result code.
    code: i32,
  },
}

/// A specialized `Result` type for condition variable operations.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
