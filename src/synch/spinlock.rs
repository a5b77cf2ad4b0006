//! A fair ticket spinlock, the building block every other primitive in
//! this module uses to protect its wait queue (spec §4.7).
//!
//! Grounded in `examples/hermit-os-kernel/src/synch/spinlock.rs`'s
//! `Spinlock`: two `CachePadded<AtomicUsize>` counters (`queue`/`dequeue`)
//! implement a ticket lock, spinning with `crossbeam_utils::Backoff`
//! between checks. The kernel version disables interrupts around the
//! critical section since it can be entered from IRQ context; this
//! userspace version has no IRQs to mask, so it only disables preemption
//! (`crate::preempt`) for the same reason: a task must not be switched out
//! while holding a spinlock another CPU might be waiting on.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

use crate::preempt::PreemptGuard;

pub struct Spinlock<T: ?Sized> {
    queue: CachePadded<AtomicUsize>,
    dequeue: CachePadded<AtomicUsize>,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Sync for Spinlock<T> {}
unsafe impl<T: ?Sized + Send> Send for Spinlock<T> {}

pub struct SpinlockGuard<'a, T: ?Sized> {
    dequeue: &'a CachePadded<AtomicUsize>,
    ticket: usize,
    data: &'a mut T,
    _no_preempt: PreemptGuard,
}

impl<T: Default> Default for Spinlock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Spinlock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            queue: CachePadded::new(AtomicUsize::new(0)),
            dequeue: CachePadded::new(AtomicUsize::new(1)),
            data: UnsafeCell::new(data),
        }
    }

    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        let guard = PreemptGuard::new();
        let ticket = self.queue.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let backoff = Backoff::new();
        while self.dequeue.load(Ordering::Acquire) != ticket {
            backoff.snooze();
        }
        SpinlockGuard {
            dequeue: &self.dequeue,
            ticket,
            data: unsafe { &mut *self.data.get() },
            _no_preempt: guard,
        }
    }

    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        let guard = PreemptGuard::new();
        let queue = self.queue.load(Ordering::Relaxed);
        let dequeue = self.dequeue.load(Ordering::Acquire);
        if queue.wrapping_add(1) != dequeue {
            return None;
        }
        let ticket = queue.wrapping_add(1);
        if self
            .queue
            .compare_exchange(queue, ticket, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinlockGuard {
                dequeue: &self.dequeue,
                ticket,
                data: unsafe { &mut *self.data.get() },
                _no_preempt: guard,
            })
        } else {
            None
        }
    }
}

impl<T: ?Sized> Deref for SpinlockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.data
    }
}

impl<T: ?Sized> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.data
    }
}

impl<T: ?Sized> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        self.dequeue.store(self.ticket.wrapping_add(1), Ordering::Release);
    }
}
