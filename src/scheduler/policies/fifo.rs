//! FIFO-steal: per-CPU FIFO ring, idle CPUs steal from the back of a
//! random victim's queue (spec §4.4.1).
//!
//! Grounded in `examples/hermit-os-kernel/src/scheduler/mod.rs`'s
//! `PriorityTaskQueue`, a bitmap-indexed array of `VecDeque`s guarded by a
//! per-core spinlock; adapted here into one `Mutex<VecDeque>` per CPU (no
//! priority levels in this policy) plus a shared table the balancer can
//! index into for stealing, which hermit's single-core-only queue has no
//! need for.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Result, SkyloftError};
use crate::id::CoreId;
use crate::task::Task;

use super::super::policy::{Pick, Policy};

/// Fast path capacity per CPU; a ring this deep should never fill under
/// normal stealing, so spillover into `overflow` is already the rare case.
const RING_CAPACITY: usize = 64;
/// Backstop for bursts the ring can't absorb before a steal drains it.
const OVERFLOW_CAPACITY: usize = 256;

struct Ring {
    queue: Mutex<VecDeque<Arc<Task>>>,
    overflow: Mutex<VecDeque<Arc<Task>>>,
}

pub struct FifoSteal {
    rings: Vec<Ring>,
    steal_cursor: AtomicUsize,
}

impl FifoSteal {
    pub fn new(num_cpus: usize) -> Self {
        Self {
            rings: (0..num_cpus)
                .map(|_| Ring { queue: Mutex::new(VecDeque::new()), overflow: Mutex::new(VecDeque::new()) })
                .collect(),
            steal_cursor: AtomicUsize::new(0),
        }
    }
}

impl Policy for FifoSteal {
    fn enqueue(&self, cpu: CoreId, task: Arc<Task>) -> Result<()> {
        let ring = &self.rings[cpu.0 as usize];
        let mut queue = ring.queue.lock().unwrap();
        if queue.len() < RING_CAPACITY {
            queue.push_back(task);
            return Ok(());
        }
        drop(queue);
        let mut overflow = ring.overflow.lock().unwrap();
        if overflow.len() < OVERFLOW_CAPACITY {
            overflow.push_back(task);
            return Ok(());
        }
        Err(SkyloftError::QueueFull(cpu))
    }

    fn pick_next(&self, cpu: CoreId) -> Pick {
        let ring = &self.rings[cpu.0 as usize];
        if let Some(task) = ring.queue.lock().unwrap().pop_front() {
            return Pick::Task(task);
        }
        match ring.overflow.lock().unwrap().pop_front() {
            Some(task) => Pick::Task(task),
            None => Pick::Idle,
        }
    }

    fn balance(&self, cpu: CoreId) -> bool {
        let n = self.rings.len();
        if n <= 1 {
            return false;
        }
        let start = self.steal_cursor.fetch_add(1, Ordering::Relaxed) % n;
        for offset in 1..n {
            let victim = (start + offset) % n;
            if victim == cpu.0 as usize {
                continue;
            }
            let stolen = {
                let mut overflow = self.rings[victim].overflow.lock().unwrap();
                overflow.pop_back().or_else(|| self.rings[victim].queue.lock().unwrap().pop_back())
            };
            if let Some(task) = stolen {
                // The local ring has room for a task that just came out of
                // another CPU's queue; overflow only ever fills under a
                // burst on a single CPU, so this push_back can't recurse
                // into QueueFull.
                self.rings[cpu.0 as usize].queue.lock().unwrap().push_back(task);
                return true;
            }
        }
        false
    }

    fn dump_tasks(&self, cpu: CoreId) -> Vec<crate::id::TaskId> {
        let ring = &self.rings[cpu.0 as usize];
        ring.queue
            .lock()
            .unwrap()
            .iter()
            .chain(ring.overflow.lock().unwrap().iter())
            .map(|t| t.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{AppId, TaskId};
    use crate::task::stack::StackAllocator;

    fn dummy_task(id: u64) -> Arc<Task> {
        let alloc = StackAllocator::new(64 * 1024, 2);
        let stack = alloc.alloc().unwrap();
        unsafe extern "C" fn noop(_: usize) {}
        Task::spawn(TaskId::from_raw(id), AppId(0), stack, noop, 0)
    }

    #[test]
    fn fifo_order_preserved_without_stealing() {
        let policy = FifoSteal::new(1);
        let cpu = CoreId(0);
        policy.enqueue(cpu, dummy_task(1)).unwrap();
        policy.enqueue(cpu, dummy_task(2)).unwrap();
        let first = match policy.pick_next(cpu) {
            Pick::Task(t) => t.id,
            Pick::Idle => panic!("expected a task"),
        };
        assert_eq!(first, TaskId::from_raw(1));
    }

    #[test]
    fn idle_cpu_steals_from_busy_neighbor() {
        let policy = FifoSteal::new(2);
        policy.enqueue(CoreId(1), dummy_task(7)).unwrap();
        assert!(matches!(policy.pick_next(CoreId(0)), Pick::Idle));
        assert!(policy.balance(CoreId(0)));
        assert!(matches!(policy.pick_next(CoreId(0)), Pick::Task(_)));
    }

    #[test]
    fn enqueue_past_both_capacities_reports_queue_full() {
        let policy = FifoSteal::new(1);
        let cpu = CoreId(0);
        for i in 0..(RING_CAPACITY + OVERFLOW_CAPACITY) as u64 {
            policy.enqueue(cpu, dummy_task(i)).unwrap();
        }
        match policy.enqueue(cpu, dummy_task(999_999)) {
            Err(SkyloftError::QueueFull(c)) => assert_eq!(c, cpu),
            other => panic!("expected QueueFull, got {other:?}"),
        }
    }
}
