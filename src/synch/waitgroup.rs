//! A counting wait group: `add` bumps an outstanding-work counter, `done`
//! decrements it, and `wait` blocks until it reaches zero (spec §4.7).
//!
//! Grounded in the same wait-queue pattern as [`super::mutex::Mutex`];
//! there is no equivalent primitive in the teacher's `synch` module, so
//! this one follows the shape of its `Semaphore` (a spinlock-guarded
//! counter plus a wait queue) with subtraction-to-zero instead of a
//! down-to-negative check.

use super::spinlock::Spinlock;
use super::WaitQueue;

pub struct WaitGroup {
    count: Spinlock<i64>,
    waiters: WaitQueue,
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitGroup {
    pub fn new() -> Self {
        Self { count: Spinlock::new(0), waiters: WaitQueue::new() }
    }

    pub fn add(&self, delta: i64) {
        let mut count = self.count.lock();
        *count += delta;
        if *count <= 0 {
            drop(count);
            self.waiters.wake_all();
        }
    }

    pub fn done(&self) {
        self.add(-1);
    }

    pub fn wait(&self) {
        loop {
            let count = self.count.lock();
            if *count <= 0 {
                return;
            }
            self.waiters.wait_and_release(|| drop(count));
        }
    }
}
