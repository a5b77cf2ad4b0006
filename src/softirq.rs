//! Softirq dispatch: the per-CPU work the idle loop drains between task
//! switches — due timers and inbound NIC ring commands (spec §4.10).
//!
//! Grounded in `original_source/libos/sched/softirq.c`'s handler table;
//! adapted from a registrable table of handlers down to the two concrete
//! sources this crate has an implementation for. The NIC ring itself
//! (`CommandRing`) is grounded in spec's own description of the
//! scheduler↔iokernel boundary (spec §1: "its only scheduler-facing
//! interface is a MPSC command ring yielding `(cmd,payload)` pairs") and on
//! `examples/Redstone-OS-forge/src/ipc/port/port.rs`'s bounded
//! `Port`/`try_recv` pattern; a real producer (DPDK/AF_XDP-style poll-mode
//! driver) is out of scope (spec's Non-goals exclude the NIC I/O path
//! itself), so nothing but tests ever calls [`CommandRing::push`] today.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{Result, SkyloftError};
use crate::id::{CoreId, TaskId};
use crate::timer::TimerHeap;

/// One NIC-ring entry: a dispatcher-assigned command tag plus its raw
/// payload word (spec §1's `(cmd,payload)` pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NicCommand {
    pub cmd: u32,
    pub payload: u64,
}

const RING_CAPACITY: usize = 1024;

/// A bounded, per-CPU MPSC ring of [`NicCommand`]s. The iokernel thread is
/// the only producer; the owning CPU's softirq pass is the only consumer.
pub struct CommandRing {
    cpu: CoreId,
    queue: Mutex<VecDeque<NicCommand>>,
}

impl CommandRing {
    pub fn new(cpu: CoreId) -> Self {
        Self { cpu, queue: Mutex::new(VecDeque::new()) }
    }

    /// Pushes a command from the producer side. Fails once the ring has
    /// backed up past capacity, meaning the consuming CPU isn't draining it
    /// fast enough.
    pub fn push(&self, cmd: NicCommand) -> Result<()> {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() >= RING_CAPACITY {
            return Err(SkyloftError::QueueFull(self.cpu));
        }
        queue.push_back(cmd);
        Ok(())
    }

    /// Pops the oldest pending command, or `Err(ChannelEmpty)` if none are
    /// queued right now.
    pub fn try_recv(&self) -> Result<NicCommand> {
        self.queue.lock().unwrap().pop_front().ok_or(SkyloftError::ChannelEmpty)
    }
}

/// Runs one softirq pass for `cpu`: drains due timers and wakes their
/// tasks. Returns the tasks that should be woken.
pub fn poll(timers: &TimerHeap) -> Vec<TaskId> {
    timers.poll_due()
}

/// Drains up to `budget` entries from `ring` (spec §4.10's "the factory
/// drains up to *budget* NIC-ring entries"), stopping early once it runs
/// dry. Returns how many were drained.
pub fn poll_nic_ring(ring: &CommandRing, budget: usize) -> usize {
    let mut drained = 0;
    while drained < budget {
        if ring.try_recv().is_err() {
            break;
        }
        drained += 1;
    }
    drained
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_recv_on_empty_ring_reports_channel_empty() {
        let ring = CommandRing::new(CoreId(0));
        match ring.try_recv() {
            Err(SkyloftError::ChannelEmpty) => {}
            other => panic!("expected ChannelEmpty, got {other:?}"),
        }
    }

    #[test]
    fn push_past_capacity_reports_queue_full() {
        let ring = CommandRing::new(CoreId(2));
        for i in 0..RING_CAPACITY {
            ring.push(NicCommand { cmd: 0, payload: i as u64 }).unwrap();
        }
        match ring.push(NicCommand { cmd: 0, payload: 0 }) {
            Err(SkyloftError::QueueFull(cpu)) => assert_eq!(cpu, CoreId(2)),
            other => panic!("expected QueueFull, got {other:?}"),
        }
    }

    #[test]
    fn poll_drains_up_to_budget_and_stops_when_dry() {
        let ring = CommandRing::new(CoreId(0));
        for i in 0..5 {
            ring.push(NicCommand { cmd: 1, payload: i }).unwrap();
        }
        assert_eq!(poll_nic_ring(&ring, 3), 3);
        assert_eq!(poll_nic_ring(&ring, 10), 2);
        assert_eq!(poll_nic_ring(&ring, 10), 0);
    }
}
