//! Blocking coordination primitives the emulated backend is built from.

mod semaphore;

pub use semaphore::Semaphore;
