//! Round-robin: per-CPU FIFO ring plus a fixed tick quantum re-queued on
//! expiry, no stealing (spec §4.4.2).
//!
//! Grounded the same way as [`super::fifo::FifoSteal`], minus the balance
//! hook, plus the quantum bookkeeping kept in each task's
//! [`crate::task::PolicyState::RoundRobin`] slot.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::id::CoreId;
use crate::task::{PolicyState, Task};

use super::super::policy::{Pick, Policy};

const QUANTUM_TICKS: u32 = 1;

pub struct RoundRobin {
    rings: Vec<Mutex<VecDeque<Arc<Task>>>>,
}

impl RoundRobin {
    pub fn new(num_cpus: usize) -> Self {
        Self {
            rings: (0..num_cpus).map(|_| Mutex::new(VecDeque::new())).collect(),
        }
    }
}

impl Policy for RoundRobin {
    fn init_task(&self, _cpu: CoreId, task: &Arc<Task>) {
        unsafe {
            *task.policy_state() = PolicyState::RoundRobin { ticks_left: QUANTUM_TICKS };
        }
    }

    fn enqueue(&self, cpu: CoreId, task: Arc<Task>) -> Result<()> {
        unsafe {
            if !matches!(*task.policy_state(), PolicyState::RoundRobin { .. }) {
                *task.policy_state() = PolicyState::RoundRobin { ticks_left: QUANTUM_TICKS };
            }
        }
        self.rings[cpu.0 as usize].lock().unwrap().push_back(task);
        Ok(())
    }

    fn pick_next(&self, cpu: CoreId) -> Pick {
        match self.rings[cpu.0 as usize].lock().unwrap().pop_front() {
            Some(task) => Pick::Task(task),
            None => Pick::Idle,
        }
    }

    fn should_preempt(&self, _cpu: CoreId, running: &Arc<Task>) -> bool {
        unsafe {
            match running.policy_state() {
                PolicyState::RoundRobin { ticks_left } => {
                    if *ticks_left == 0 {
                        *ticks_left = QUANTUM_TICKS;
                        true
                    } else {
                        *ticks_left -= 1;
                        false
                    }
                }
                _ => false,
            }
        }
    }

    fn dump_tasks(&self, cpu: CoreId) -> Vec<crate::id::TaskId> {
        self.rings[cpu.0 as usize].lock().unwrap().iter().map(|t| t.id).collect()
    }
}
