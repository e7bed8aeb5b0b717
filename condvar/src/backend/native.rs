//! Adapter over the platform `pthread_cond_t`.
//!
//! The condition variable is configured for `CLOCK_MONOTONIC`, so deadlines
//! are unaffected by wall-clock adjustments.

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;

use tracing::error;

use super::{Backend, BackendKind};
use crate::error::{Result, SyncError};
use crate::mutex::RawLock;
use crate::time::{self, Deadline};

/// Condition attributes, destroyed when dropped.
struct CondAttr(MaybeUninit<libc::pthread_condattr_t>);

impl CondAttr {
  fn monotonic() -> Result<Self> {
    let mut attr = MaybeUninit::uninit();
    let rc = unsafe { libc::pthread_condattr_init(attr.as_mut_ptr()) };
    if rc != 0 {
      return Err(SyncError::Init {
        resource: "condition attributes",
        code: rc,
      });
    }
    let mut attr = CondAttr(attr);
    // From here on `attr` is destroyed on every exit path.
    let rc = unsafe { libc::pthread_condattr_setclock(attr.0.as_mut_ptr(), libc::CLOCK_MONOTONIC) };
    if rc != 0 {
      return Err(SyncError::Init {
        resource: "condition clock",
        code: rc,
      });
    }
    Ok(attr)
  }
}

impl Drop for CondAttr {
  fn drop(&mut self) {
    unsafe { libc::pthread_condattr_destroy(self.0.as_mut_ptr()) };
  }
}

pub(crate) struct NativeBackend {
  // Boxed so the address handed to pthread never moves.
  cond: Box<UnsafeCell<libc::pthread_cond_t>>,
}

// Safety: pthread condition variables are designed for concurrent use; all
// access goes through the pthread calls.
unsafe impl Send for NativeBackend {}
unsafe impl Sync for NativeBackend {}

impl fmt::Debug for NativeBackend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NativeBackend").finish_non_exhaustive()
  }
}

impl NativeBackend {
  pub(crate) fn new() -> Result<Self> {
    let attr = CondAttr::monotonic()?;
    let cond = Box::new(UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER));
    let rc = unsafe { libc::pthread_cond_init(cond.get(), attr.0.as_ptr()) };
    if rc != 0 {
      return Err(SyncError::Init {
        resource: "condition variable",
        code: rc,
      });
    }
    Ok(Self { cond })
  }
}

impl<R: RawLock> Backend<R> for NativeBackend {
  fn wait(&self, lock: &R, deadline: Option<Deadline>) -> Result<bool> {
    let mutex = lock.native_handle().ok_or(SyncError::Unsupported)?;
    match deadline {
      None => {
        let rc = unsafe { libc::pthread_cond_wait(self.cond.get(), mutex.as_ptr()) };
        match rc {
          0 => Ok(true),
          code => Err(SyncError::Wait { code }),
        }
      }
      Some(deadline) => {
        let ts = time::monotonic_timespec(deadline);
        let rc = unsafe { libc::pthread_cond_timedwait(self.cond.get(), mutex.as_ptr(), &ts) };
        match rc {
          0 => Ok(true),
          libc::ETIMEDOUT => Ok(false),
          code => Err(SyncError::Wait { code }),
        }
      }
    }
  }

  fn notify_one(&self) -> Result<()> {
    match unsafe { libc::pthread_cond_signal(self.cond.get()) } {
      0 => Ok(()),
      code => Err(SyncError::Notify { code }),
    }
  }

  fn notify_all(&self) -> Result<()> {
    match unsafe { libc::pthread_cond_broadcast(self.cond.get()) } {
      0 => Ok(()),
      code => Err(SyncError::Notify { code }),
    }
  }

  fn kind(&self) -> BackendKind {
    BackendKind::Native
  }
}

impl Drop for NativeBackend {
  fn drop(&mut self) {
    let rc = unsafe { libc::pthread_cond_destroy(self.cond.get()) };
    if rc != 0 {
      error!(code = rc, "pthread_cond_destroy failed");
      std::process::abort();
    }
  }
}
