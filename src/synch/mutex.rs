//! A task-blocking mutual-exclusion lock: unlike [`super::spinlock::Spinlock`],
//! a contended `lock()` blocks the calling *task* (through the scheduler)
//! rather than busy-waiting the whole CPU (spec §4.7).
//!
//! Grounded in `examples/hermit-os-kernel/src/synch/mod.rs`'s blocking
//! primitives: state guarded by a spinlock, contenders parked on a wait
//! queue, `unlock` handing ownership directly to the next waiter rather
//! than reopening the lock for anyone to grab (avoids starving a waiter
//! that's been parked the longest).

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};

use super::spinlock::Spinlock;
use super::WaitQueue;

struct State {
    locked: bool,
}

pub struct Mutex<T: ?Sized> {
    state: Spinlock<State>,
    waiters: WaitQueue,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}

pub struct MutexGuard<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,
}

impl<'a, T: ?Sized> MutexGuard<'a, T> {
    /// Exposes the guarded mutex, for `Condvar::wait` to reacquire after
    /// parking.
    pub(crate) fn mutex(&self) -> &'a Mutex<T> {
        self.mutex
    }
}

impl<T> Mutex<T> {
    pub fn new(data: T) -> Self {
        Self {
            state: Spinlock::new(State { locked: false }),
            waiters: WaitQueue::new(),
            data: UnsafeCell::new(data),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        loop {
            let mut state = self.state.lock();
            if !state.locked {
                state.locked = true;
                return MutexGuard { mutex: self };
            }
            // Queue ourselves, then drop the state lock only once we're on
            // the wait list, closing the wakeup race (see `WaitQueue`).
            self.waiters.wait_and_release(|| drop(state));
        }
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let mut state = self.state.lock();
        if state.locked {
            None
        } else {
            state.locked = true;
            Some(MutexGuard { mutex: self })
        }
    }

    /// Acquires the lock without producing a guard, for callers across an
    /// FFI boundary that can't carry a Rust binding back with them (the
    /// `sl_pthread_mutex_*` shim). Must be paired with exactly one
    /// `unlock_raw` call.
    pub(crate) fn lock_raw(&self) {
        std::mem::forget(self.lock());
    }

    /// Releases a lock previously acquired via `lock_raw`.
    pub(crate) fn unlock_raw(&self) {
        self.unlock();
    }
}

impl<T: ?Sized> Mutex<T> {
    fn unlock(&self) {
        let mut state = self.state.lock();
        // Hand off directly: if anyone's waiting, the lock stays held on
        // their behalf so no third task can sneak in between.
        if self.waiters.wake_one() {
            return;
        }
        state.locked = false;
    }
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}
