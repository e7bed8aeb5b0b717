//! A counting semaphore with a maximum count and timed acquisition.
//!
//! The state (available permits plus a FIFO queue of parked threads) lives
//! behind a `parking_lot::Mutex`. A release with waiters queued hands its
//! permit directly to the oldest waiter instead of incrementing the count, so
//! a thread arriving later can never steal a permit that was meant for a
//! parked one. A timed-out waiter re-checks its slot under the same lock
//! before withdrawing, which makes "granted" and "timed out" mutually
//! exclusive.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Result, SyncError};
use crate::time::Deadline;

/// A parked thread and the flag its releaser sets when handing it a permit.
#[derive(Debug)]
struct WaitSlot {
  thread: Thread,
  granted: AtomicBool,
}

impl WaitSlot {
  fn grant(&self) {
    self.granted.store(true, Ordering::Release);
    self.thread.unpark();
  }

  fn is_granted(&self) -> bool {
    self.granted.load(Ordering::Acquire)
  }
}

#[derive(Debug)]
struct SemaphoreState {
  permits: usize,
  waiters: VecDeque<Arc<WaitSlot>>,
}

/// A counting semaphore bounded by a maximum count.
///
/// A semaphore created with `new(1, 1)` behaves as a binary semaphore.
pub struct Semaphore {
  max: usize,
  state: Mutex<SemaphoreState>,
}

impl fmt::Debug for Semaphore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("Semaphore")
      .field("max", &self.max)
      .field("permits", &state.permits)
      .field("waiters", &state.waiters.len())
      .finish()
  }
}

impl Semaphore {
  /// Creates a semaphore holding `initial` permits that never holds more than
  /// `max`.
  ///
  /// Fails with [`SyncError::SemaphoreBounds`] if `max` is zero or `initial`
  /// exceeds `max`.
  pub fn new(initial: usize, max: usize) -> Result<Self> {
    if max == 0 || initial > max {
      return Err(SyncError::SemaphoreBounds { initial, max });
    }
    Ok(Self {
      max,
      state: Mutex::new(SemaphoreState {
        permits: initial,
        waiters: VecDeque::new(),
      }),
    })
  }

  /// Returns the maximum count.
  pub fn max(&self) -> usize {
    self.max
  }

  /// Returns the number of permits currently available.
  pub fn available(&self) -> usize {
    self.state.lock().permits
  }

  /// Takes a permit if one is available and nobody is queued ahead.
  pub fn try_acquire(&self) -> bool {
    let mut state = self.state.lock();
    if state.waiters.is_empty() && state.permits > 0 {
      state.permits -= 1;
      true
    } else {
      false
    }
  }

  /// Takes a permit, blocking the current thread until one is released.
  pub fn acquire(&self) {
    let acquired = self.acquire_inner(None);
    debug_assert!(acquired);
  }

  /// Takes a permit, giving up after `timeout`.
  ///
  /// Returns `true` if a permit was taken and `false` on timeout.
  pub fn acquire_timeout(&self, timeout: Duration) -> bool {
    match Deadline::after(timeout) {
      Some(deadline) => self.acquire_until(deadline),
      None => {
        self.acquire();
        true
      }
    }
  }

  /// Takes a permit, giving up once `deadline` passes.
  ///
  /// Returns `true` if a permit was taken and `false` on timeout.
  pub(crate) fn acquire_until(&self, deadline: Deadline) -> bool {
    self.acquire_inner(Some(deadline))
  }

  fn acquire_inner(&self, deadline: Option<Deadline>) -> bool {
    let slot = {
      let mut state = self.state.lock();
      if state.waiters.is_empty() && state.permits > 0 {
        state.permits -= 1;
        return true;
      }
      let slot = Arc::new(WaitSlot {
        thread: thread::current(),
        granted: AtomicBool::new(false),
      });
      state.waiters.push_back(slot.clone());
      slot
    };

    loop {
      // Unparks can be spurious, so the slot flag is the only source of truth.
      match deadline {
        None => thread::park(),
        Some(deadline) => {
          let remaining = deadline.remaining();
          if remaining.is_zero() {
            return self.withdraw(&slot);
          }
          thread::park_timeout(remaining);
        }
      }
      if slot.is_granted() {
        return true;
      }
    }
  }

  /// Removes a timed-out waiter from the queue. Returns `true` if a releaser
  /// granted the slot before we got the lock.
  fn withdraw(&self, slot: &Arc<WaitSlot>) -> bool {
    let mut state = self.state.lock();
    if slot.is_granted() {
      return true;
    }
    if let Some(pos) = state.waiters.iter().position(|w| Arc::ptr_eq(w, slot)) {
      state.waiters.remove(pos);
    }
    false
  }

  /// Releases one permit, waking the oldest waiter if there is one.
  ///
  /// Fails with [`SyncError::SemaphoreOverflow`] if nobody is waiting and the
  /// semaphore already holds `max` permits.
  pub fn release(&self) -> Result<()> {
    let mut state = self.state.lock();
    if let Some(waiter) = state.waiters.pop_front() {
      // Direct handoff; the permit count is untouched.
      waiter.grant();
      return Ok(());
    }
    if state.permits == self.max {
      return Err(SyncError::SemaphoreOverflow { max: self.max });
    }
    state.permits += 1;
    Ok(())
  }
}
