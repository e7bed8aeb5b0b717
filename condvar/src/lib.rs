#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! A Mesa-style condition variable bound to a single mutex.
//!
//! [`ConditionVariable`] offers `wait`, timed waits and `notify_one` /
//! `notify_all` for one associated mutex. Two backends sit behind it:
//!
//! - **Native** delegates to the platform `pthread_cond_t`. It is used on
//!   Linux and Android when the mutex exposes its `pthread_mutex_t`, as
//!   [`Mutex`] does.
//! - **Emulated** builds the condition variable from two semaphores and a
//!   lock, for mutexes without an OS handle (such as `parking_lot::Mutex`) or
//!   when asked for explicitly through [`CondvarBuilder`]. It never loses a
//!   wakeup, never delivers one notification twice when a timeout races it,
//!   and keeps its internal counters bounded.

pub mod coord;
pub mod error;

mod backend;
mod builder;
mod condvar;
mod mutex;
mod time;

pub use backend::{BackendKind, BackendPreference};
pub use builder::CondvarBuilder;
pub use condvar::ConditionVariable;
pub use error::{Result, SyncError};
pub use mutex::{Mutex, MutexGuard, RawLock};

#[cfg(all(feature = "native", any(target_os = "linux", target_os = "android")))]
pub use mutex::SysRawMutex;

#[allow(dead_code)]
fn assert_send_sync<T: Send + Sync>() {}

#[allow(dead_code)]
fn condition_variable_is_send_sync() {
  assert_send_sync::<ConditionVariable<'static, parking_lot::RawMutex, ()>>();
  assert_send_sync::<coord::Semaphore>();
}
