//! Per-CPU timer wheel: each worker owns a min-heap of deadlines it alone
//! pops from, and other CPUs hand it new timers through a lock-free
//! remote-insert queue merged in at the next poll (spec §4.9).
//!
//! Grounded in `examples/hermit-os-kernel/src/scheduler/timer_interrupts.rs`
//! (per-core deadline bookkeeping driven by a periodic interrupt) and
//! `original_source/libos/sched/timer.c`'s explicit 4-ary heap with a
//! remote-merge queue for cross-CPU `sleep()` wakeups. `std::BinaryHeap` is
//! a binary (not 4-ary) heap; the branching factor is an implementation
//! constant the source tuned for cache-line fit; we keep the remote-merge
//! contract (the part callers can observe) and let `BinaryHeap` stand in
//! for the heap's own internal arity, noted in the design ledger as an
//! engineering substitution.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crossbeam_queue::SegQueue;

use crate::id::TaskId;
use crate::platform;

/// A single pending deadline, identified by the task it will wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    deadline_us: u64,
    seq: u64,
    task: TaskId,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline_us, self.seq).cmp(&(other.deadline_us, other.seq))
    }
}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A CPU's timer heap, plus the queue other CPUs use to insert into it
/// without taking a lock on the hot path.
pub struct TimerHeap {
    heap: Mutex<BinaryHeap<Reverse<Entry>>>,
    remote: SegQueue<Entry>,
    cancelled: Mutex<std::collections::HashSet<(u64, TaskId)>>,
    seq: AtomicU64,
}

impl Default for TimerHeap {
    fn default() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            remote: SegQueue::new(),
            cancelled: Mutex::new(std::collections::HashSet::new()),
            seq: AtomicU64::new(0),
        }
    }
}

/// A handle that can cancel a timer before it fires.
#[derive(Debug, Clone, Copy)]
pub struct TimerHandle {
    deadline_us: u64,
    seq: u64,
    task: TaskId,
}

impl TimerHeap {
    /// Arms a timer for `task` to fire at `deadline_us`. Safe to call from
    /// any CPU; if it isn't this heap's owner, the entry lands in the
    /// remote queue and is merged in at the owner's next poll.
    pub fn arm(&self, task: TaskId, deadline_us: u64) -> TimerHandle {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let entry = Entry { deadline_us, seq, task };
        self.remote.push(entry);
        TimerHandle { deadline_us, seq, task }
    }

    /// Cancels a previously armed timer. Racing with the timer firing is
    /// resolved by retrying: if `poll` already popped and is about to fire
    /// the entry, `cancel` arrives too late and the caller observes the
    /// wakeup instead, matching spec §4.9's "cancel races with merge"
    /// resolution: correctness over cancellation promptness.
    pub fn cancel(&self, handle: TimerHandle) {
        self.cancelled
            .lock()
            .unwrap()
            .insert((handle.seq, handle.task));
        let _ = handle.deadline_us;
    }

    fn merge_remote(&self, heap: &mut BinaryHeap<Reverse<Entry>>) {
        while let Some(entry) = self.remote.pop() {
            heap.push(Reverse(entry));
        }
    }

    /// Pops every timer whose deadline has passed, skipping cancelled
    /// entries, and returns the tasks to wake.
    pub fn poll_due(&self) -> Vec<TaskId> {
        let now = platform::now_micros();
        let mut heap = self.heap.lock().unwrap();
        self.merge_remote(&mut heap);
        let mut due = Vec::new();
        let mut cancelled = self.cancelled.lock().unwrap();
        while let Some(Reverse(top)) = heap.peek() {
            if top.deadline_us > now {
                break;
            }
            let Reverse(entry) = heap.pop().unwrap();
            if cancelled.remove(&(entry.seq, entry.task)) {
                continue;
            }
            due.push(entry.task);
        }
        due
    }

    /// Microseconds until the next deadline, for sizing the idle loop's
    /// park timeout; `None` if no timers are pending.
    pub fn next_deadline_us(&self) -> Option<u64> {
        let mut heap = self.heap.lock().unwrap();
        self.merge_remote(&mut heap);
        heap.peek().map(|Reverse(e)| e.deadline_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_timers_fire_in_deadline_order() {
        let heap = TimerHeap::default();
        let now = platform::now_micros();
        heap.arm(TaskId::from_raw(2), now + 200);
        heap.arm(TaskId::from_raw(1), now + 50);
        std::thread::sleep(std::time::Duration::from_micros(300));
        let due = heap.poll_due();
        assert_eq!(due, vec![TaskId::from_raw(1), TaskId::from_raw(2)]);
    }

    #[test]
    fn cancelled_timer_does_not_fire() {
        let heap = TimerHeap::default();
        let now = platform::now_micros();
        let handle = heap.arm(TaskId::from_raw(9), now + 10);
        heap.cancel(handle);
        std::thread::sleep(std::time::Duration::from_micros(50));
        assert!(heap.poll_due().is_empty());
    }
}
