//! Condition variable emulation over two semaphores and a lock.
//!
//! `gate` is a binary semaphore that admits new waiters. `queue` is a counting
//! semaphore waiters park on. The counters in [`WaiterAccounting`] decide, for
//! every wait exit and every notify, who is released and how a timeout that
//! races a notification is reconciled.
//!
//! A notify that finds parked waiters closes the gate, moves the waiters it
//! selects from `blocked` to `to_unblock`, and posts a single token on
//! `queue`. Each waiter that consumes the token decrements `to_unblock` and
//! either posts the token again for the next selected waiter or, being the
//! last of the generation, reopens the gate. Waiters arriving while the gate
//! is closed cannot register, so they can never take a token meant for a
//! waiter that was parked when the notify happened.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use super::{Backend, BackendKind, Relock};
use crate::coord::Semaphore;
use crate::error::Result;
use crate::mutex::RawLock;
use crate::time::Deadline;

/// Default number of departed waiters tolerated before they are subtracted
/// from `blocked`.
pub(crate) const DEFAULT_GONE_THRESHOLD: usize = usize::MAX / 2;

#[derive(Debug, Default)]
struct UnblockState {
  /// Waiters selected by a notify that have not yet left their wait.
  to_unblock: usize,
  /// Waiters that timed out outside a generation and are still counted in
  /// `blocked`. Always zero while `to_unblock > 0`.
  gone: usize,
}

#[derive(Debug, Default)]
struct WaiterAccounting {
  /// Parked waiters not yet selected. Incremented while holding the gate;
  /// every other write happens under `unblock` with the gate closed, so plain
  /// relaxed loads and stores are serialized by the gate.
  blocked: AtomicUsize,
  unblock: Mutex<UnblockState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
  One,
  All,
}

impl Wake {
  fn count(self, parked: usize) -> usize {
    match self {
      Wake::One => parked.min(1),
      Wake::All => parked,
    }
  }
}

/// What a departing waiter still owes the generation once it has left the
/// accounting lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handoff {
  Nothing,
  /// More selected waiters remain: post the token for the next one.
  PassToken,
  /// Last of the generation: reopen the gate.
  OpenGate,
  /// Last of the generation, but the token was never consumed (the last
  /// selected waiter left by timeout). Take it back, then reopen the gate.
  DrainThenOpenGate,
}

pub(crate) struct EmulatedBackend {
  gate: Semaphore,
  queue: Semaphore,
  accounting: WaiterAccounting,
  gone_threshold: usize,
}

impl fmt::Debug for EmulatedBackend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.accounting.unblock.lock();
    f.debug_struct("EmulatedBackend")
      .field("blocked", &self.accounting.blocked.load(Ordering::Relaxed))
      .field("to_unblock", &state.to_unblock)
      .field("gone", &state.gone)
      .finish()
  }
}

impl EmulatedBackend {
  pub(crate) fn new(gone_threshold: usize) -> Result<Self> {
    // A failure creating `queue` drops `gate` on the way out.
    let gate = Semaphore::new(1, 1)?;
    let queue = Semaphore::new(0, usize::MAX)?;
    Ok(Self {
      gate,
      queue,
      accounting: WaiterAccounting::default(),
      gone_threshold: gone_threshold.max(1),
    })
  }

  /// Counts the calling thread as parked. Blocks while a generation is being
  /// released.
  fn register(&self) -> Result<()> {
    self.gate.acquire();
    self.accounting.blocked.fetch_add(1, Ordering::Relaxed);
    self.gate.release()
  }

  /// Accounts for a waiter leaving `queue`, either with a token (`consumed`)
  /// or by timeout. Returns whether the wait counts as notified and what is
  /// left to do after the lock is released.
  fn depart(&self, consumed: bool) -> Result<(bool, Handoff)> {
    let blocked = &self.accounting.blocked;
    let mut state = self.accounting.unblock.lock();

    if state.to_unblock > 0 {
      debug_assert_eq!(state.gone, 0);
      if !consumed {
        let parked = blocked.load(Ordering::Relaxed);
        if parked > 0 {
          // Not selected yet: leave the pool, the generation is untouched.
          blocked.store(parked - 1, Ordering::Relaxed);
          return Ok((false, Handoff::Nothing));
        }
        // Everyone left was selected, this thread included. The notification
        // wins over the timeout.
        state.to_unblock -= 1;
        if state.to_unblock == 0 {
          return Ok((true, Handoff::DrainThenOpenGate));
        }
        return Ok((true, Handoff::Nothing));
      }

      state.to_unblock -= 1;
      let handoff = if state.to_unblock > 0 {
        Handoff::PassToken
      } else {
        Handoff::OpenGate
      };
      return Ok((true, handoff));
    }

    // No generation in flight. `blocked` may only shrink with the gate held,
    // so record the departure and settle it later.
    state.gone += 1;
    if state.gone >= self.gone_threshold {
      self.gate.acquire();
      let gone = mem::take(&mut state.gone);
      blocked.fetch_sub(gone, Ordering::Relaxed);
      trace!(gone, "collected departed waiters");
      self.gate.release()?;
    }
    Ok((consumed, Handoff::Nothing))
  }

  fn finish(&self, handoff: Handoff) -> Result<()> {
    match handoff {
      Handoff::Nothing => Ok(()),
      Handoff::PassToken => self.queue.release(),
      Handoff::OpenGate => self.gate.release(),
      Handoff::DrainThenOpenGate => {
        trace!("draining unclaimed release token");
        // The token is queued or about to be; nobody else is parked to take it.
        self.queue.acquire();
        self.gate.release()
      }
    }
  }

  fn notify(&self, wake: Wake) -> Result<()> {
    let blocked = &self.accounting.blocked;
    let mut state = self.accounting.unblock.lock();

    if state.to_unblock > 0 {
      // The gate is already closed; extend the running generation. The token
      // in flight reaches the extra waiters.
      let parked = blocked.load(Ordering::Relaxed);
      let n = wake.count(parked);
      blocked.store(parked - n, Ordering::Relaxed);
      state.to_unblock += n;
      return Ok(());
    }

    if blocked.load(Ordering::Relaxed) <= state.gone {
      return Ok(());
    }

    self.gate.acquire();
    let parked = blocked.load(Ordering::Relaxed) - mem::take(&mut state.gone);
    let n = wake.count(parked);
    blocked.store(parked - n, Ordering::Relaxed);
    state.to_unblock = n;
    trace!(parked, releasing = n, "starting release generation");
    drop(state);

    self.queue.release()
  }
}

impl<R: RawLock> Backend<R> for EmulatedBackend {
  fn wait(&self, lock: &R, deadline: Option<Deadline>) -> Result<bool> {
    self.register()?;

    // Safety: the caller holds `lock`. Registration came first, so a notify
    // issued as soon as the lock is free already counts this thread.
    let relock = unsafe { Relock::unlock(lock) };

    let consumed = match deadline {
      None => {
        self.queue.acquire();
        true
      }
      Some(deadline) => self.queue.acquire_until(deadline),
    };

    let (notified, handoff) = self.depart(consumed)?;
    self.finish(handoff)?;

    drop(relock);
    Ok(notified)
  }

  fn notify_one(&self) -> Result<()> {
    self.notify(Wake::One)
  }

  fn notify_all(&self) -> Result<()> {
    self.notify(Wake::All)
  }

  fn kind(&self) -> BackendKind {
    BackendKind::Emulated
  }
}
