mod common;
use common::*;

use fibre_condvar::{
  BackendKind, BackendPreference, CondvarBuilder, ConditionVariable, Mutex, RawLock, SyncError,
};
use parking_lot::lock_api;
use serial_test::serial;
use std::thread;
use std::time::{Duration, Instant};

const THREADS: usize = 10;
const ROUNDS: usize = 10;

fn condvar_for<R: RawLock, T>(
  mutex: &lock_api::Mutex<R, T>,
  backend: BackendPreference,
) -> ConditionVariable<'_, R, T> {
  CondvarBuilder::new().backend(backend).build(mutex).unwrap()
}

#[derive(Debug, Default)]
struct Rounds {
  arrived: usize,
  round: usize,
  woken: usize,
}

#[test]
#[serial]
fn notify_one_rounds_wake_every_waiter() {
  init_tracing();
  for backend in backends() {
    let state = Mutex::new(Rounds::default());
    let cv = condvar_for(&state, backend);

    thread::scope(|s| {
      for _ in 0..THREADS {
        s.spawn(|| {
          for i in 0..ROUNDS {
            let mut guard = state.lock();
            guard.arrived += 1;
            cv.wait_while(&mut guard, |st| st.round <= i).unwrap();
            guard.woken += 1;
          }
        });
      }

      for r in 0..ROUNDS {
        poll_until(&state, STRESS_TIMEOUT, |st| st.arrived == THREADS * (r + 1));
        // Holding the lock keeps woken waiters from re-registering before the
        // round's last notify.
        let mut guard = state.lock();
        guard.round = r + 1;
        for _ in 0..THREADS {
          cv.notify_one().unwrap();
        }
        drop(guard);
      }
    });

    assert_eq!(state.lock().woken, THREADS * ROUNDS, "backend {backend:?}");
  }
}

#[derive(Debug, Default)]
struct Broadcast {
  waiting: usize,
  go: bool,
  timed_out: usize,
}

#[test]
#[serial]
fn notify_all_wakes_all_waiters() {
  init_tracing();
  for backend in backends() {
    let state = Mutex::new(Broadcast::default());
    let cv = condvar_for(&state, backend);

    thread::scope(|s| {
      for _ in 0..THREADS {
        s.spawn(|| {
          let mut guard = state.lock();
          guard.waiting += 1;
          if !cv.wait_timeout_while(&mut guard, STRESS_TIMEOUT, |st| !st.go).unwrap() {
            guard.timed_out += 1;
          }
        });
      }

      poll_until(&state, LONG_TIMEOUT, |st| st.waiting == THREADS);
      let mut guard = state.lock();
      guard.go = true;
      cv.notify_all().unwrap();
    });

    assert_eq!(state.lock().timed_out, 0, "backend {backend:?}");
  }
}

#[test]
#[serial]
fn timed_wait_reports_notify_then_timeout() {
  init_tracing();
  for backend in backends() {
    let state = Mutex::new(false);
    let cv = condvar_for(&state, backend);

    thread::scope(|s| {
      let waiter = s.spawn(|| {
        let mut guard = state.lock();
        *guard = true;
        let first = cv.wait_timeout(&mut guard, Duration::from_secs(1)).unwrap();

        let start = Instant::now();
        let second = cv.wait_timeout(&mut guard, Duration::from_secs(1)).unwrap();
        (first, second, start.elapsed())
      });

      poll_until(&state, LONG_TIMEOUT, |waiting| *waiting);
      cv.notify_one().unwrap();

      let (first, second, elapsed) = waiter.join().unwrap();
      assert!(first, "backend {backend:?}: first wait should be notified");
      assert!(!second, "backend {backend:?}: second wait should time out");
      assert!(elapsed >= Duration::from_millis(950), "backend {backend:?}: woke after {elapsed:?}");
    });
  }
}

#[test]
fn notify_with_no_waiters_is_not_remembered() {
  for backend in backends() {
    let state = Mutex::new(());
    let cv = condvar_for(&state, backend);
    cv.notify_one().unwrap();
    cv.notify_all().unwrap();

    let mut guard = state.lock();
    assert!(!cv.wait_timeout(&mut guard, Duration::from_millis(50)).unwrap());
  }
}

#[test]
fn lock_is_held_again_after_wait() {
  for backend in backends() {
    let state = Mutex::new(0u32);
    let cv = condvar_for(&state, backend);

    let mut guard = state.lock();
    assert!(!cv.wait_timeout(&mut guard, Duration::from_millis(10)).unwrap());
    assert!(state.is_locked());
    *guard += 1;
    drop(guard);
    assert!(!state.is_locked());
  }
}

#[test]
fn zero_timeout_returns_promptly() {
  for backend in backends() {
    let state = Mutex::new(());
    let cv = condvar_for(&state, backend);

    let mut guard = state.lock();
    let start = Instant::now();
    assert!(!cv.wait_timeout_nanos(&mut guard, 0).unwrap());
    assert!(start.elapsed() < SHORT_TIMEOUT);
  }
}

#[test]
#[should_panic(expected = "wait timeout must be non-negative")]
fn negative_timeout_panics() {
  let state = Mutex::new(());
  let cv = condvar_for(&state, BackendPreference::Emulated);
  let mut guard = state.lock();
  let _ = cv.wait_timeout_nanos(&mut guard, -1);
}

#[test]
#[should_panic(expected = "guard does not belong")]
fn foreign_guard_panics() {
  let ours = Mutex::new(());
  let theirs = Mutex::new(());
  let cv = condvar_for(&ours, BackendPreference::Emulated);
  let mut guard = theirs.lock();
  let _ = cv.wait_timeout(&mut guard, Duration::from_millis(1));
}

#[test]
#[serial]
fn wait_timeout_while_gives_up_at_deadline() {
  for backend in backends() {
    let state = Mutex::new(false);
    let cv = condvar_for(&state, backend);

    let mut guard = state.lock();
    let start = Instant::now();
    let satisfied = cv
      .wait_timeout_while(&mut guard, Duration::from_millis(100), |ready| !*ready)
      .unwrap();
    assert!(!satisfied);
    assert!(start.elapsed() >= Duration::from_millis(95));
  }
}

#[test]
fn wait_timeout_while_skips_wait_when_satisfied() {
  for backend in backends() {
    let state = Mutex::new(true);
    let cv = condvar_for(&state, backend);
    let mut guard = state.lock();
    assert!(cv.wait_timeout_while(&mut guard, LONG_TIMEOUT, |ready| !*ready).unwrap());
  }
}

#[test]
#[serial]
fn parking_lot_mutex_uses_emulation() {
  init_tracing();
  let state = parking_lot::Mutex::new(0usize);
  let cv = ConditionVariable::new(&state).unwrap();
  assert_eq!(cv.backend_kind(), BackendKind::Emulated);

  thread::scope(|s| {
    s.spawn(|| {
      let mut guard = state.lock();
      *guard = 1;
      cv.wait_while(&mut guard, |v| *v != 2).unwrap();
    });

    poll_until_parking_lot(&state, |v| *v == 1);
    *state.lock() = 2;
    cv.notify_one().unwrap();
  });
}

fn poll_until_parking_lot(mutex: &parking_lot::Mutex<usize>, mut ready: impl FnMut(&usize) -> bool) {
  let start = Instant::now();
  while !ready(&mutex.lock()) {
    assert!(start.elapsed() < LONG_TIMEOUT, "condition not reached");
    thread::sleep(Duration::from_millis(1));
  }
}

#[test]
fn requesting_native_for_parking_lot_mutex_fails() {
  let state = parking_lot::Mutex::new(());
  let err = CondvarBuilder::new()
    .backend(BackendPreference::Native)
    .build(&state)
    .unwrap_err();
  assert_eq!(err, SyncError::Unsupported);
}

#[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
#[test]
fn default_for_sys_mutex_is_native() {
  let state = Mutex::new(());
  let cv = ConditionVariable::new(&state).unwrap();
  assert_eq!(cv.backend_kind(), BackendKind::Native);
}
