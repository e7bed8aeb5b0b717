#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};

use fibre_condvar::{BackendPreference, Mutex};
use tracing_subscriber::EnvFilter;

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(500);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(3);
pub const STRESS_TIMEOUT: Duration = Duration::from_secs(15);

/// Installs a test-writer subscriber filtered by `RUST_LOG`. Safe to call from
/// every test.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

/// Every backend available in this build.
pub fn backends() -> Vec<BackendPreference> {
  let mut all = vec![BackendPreference::Emulated];
  if cfg!(all(feature = "native", any(target_os = "linux", target_os = "android"))) {
    all.push(BackendPreference::Native);
  }
  all
}

/// Polls `mutex` until `ready` holds, panicking after `timeout`.
///
/// Waiter threads update the shared state and start waiting under a single
/// hold of the lock, so once `ready` observes the update the waiter is
/// already registered with the condition variable.
pub fn poll_until<T>(mutex: &Mutex<T>, timeout: Duration, mut ready: impl FnMut(&T) -> bool) {
  let start = Instant::now();
  loop {
    if ready(&mutex.lock()) {
      return;
    }
    assert!(start.elapsed() < timeout, "condition not reached within {timeout:?}");
    thread::sleep(Duration::from_millis(1));
  }
}
