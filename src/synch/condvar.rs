//! A condition variable that parks tasks rather than OS threads, paired
//! with this crate's own [`super::mutex::Mutex`] (spec §4.7).
//!
//! Grounded in `examples/hermit-os-kernel/src/synch/mod.rs`'s condvar,
//! itself a thin wrapper over the same wait-queue pattern as its mutex.

use super::mutex::{Mutex, MutexGuard};
use super::WaitQueue;

#[derive(Default)]
pub struct Condvar {
    waiters: WaitQueue,
}

impl Condvar {
    pub fn new() -> Self {
        Self { waiters: WaitQueue::new() }
    }

    /// Atomically releases `guard` and blocks the calling task, returning a
    /// freshly reacquired guard once woken. Spurious wakeups are possible
    /// (same contract as `std::sync::Condvar`): callers must re-check their
    /// condition in a loop.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        let mutex: &'a Mutex<T> = guard.mutex();
        self.waiters.wait_and_release(|| drop(guard));
        mutex.lock()
    }

    /// Atomically releases `mutex` and blocks, without a guard to hand
    /// back — for callers across an FFI boundary that can't carry a Rust
    /// binding with them (the `sl_pthread_cond_wait` shim).
    pub(crate) fn wait_raw(&self, mutex: &Mutex<()>) {
        self.waiters.wait_and_release(|| mutex.unlock_raw());
        mutex.lock_raw();
    }

    pub fn notify_one(&self) -> bool {
        self.waiters.wake_one()
    }

    pub fn notify_all(&self) {
        self.waiters.wake_all();
    }
}
