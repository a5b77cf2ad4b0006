//! The `Policy` trait: the pluggable scheduling algorithm surface every
//! per-CPU scheduler core dispatches through (spec §4.4).
//!
//! Grounded in `examples/hermit-os-kernel/src/scheduler/mod.rs`'s
//! `PerCoreScheduler`, which hardcodes one algorithm; Skyloft needs six, so
//! the algorithm is factored out behind a trait object chosen once at
//! `Config` time (spec §9's "construct-once `Box<dyn Policy>`" design note)
//! rather than hermit's inline logic or a generic parameter, since the
//! policy is a runtime choice, not a compile-time one.

use std::sync::Arc;

use crate::error::Result;
use crate::id::CoreId;
use crate::task::Task;

/// What a worker should do after asking its policy for work.
pub enum Pick {
    /// Run this task next.
    Task(Arc<Task>),
    /// No runnable work; park and enter the slowpath.
    Idle,
}

/// A pluggable scheduling algorithm.
///
/// Every method has a default no-op so a policy only needs to override the
/// hooks it actually uses (spec §4.4's per-policy capability table: FIFO
/// implements balance/steal, CFS/EEVDF don't, SQ's `pick_next` only ever
/// runs on the dispatcher CPU, etc).
pub trait Policy: Send + Sync {
    /// One-time, whole-runtime setup (e.g. allocating the SQ dispatcher's
    /// central queue).
    fn init(&self, _cpus: &[CoreId]) {}

    /// Per-CPU setup, called once by each worker before its first
    /// `pick_next`.
    fn init_percpu(&self, _cpu: CoreId) {}

    /// Initializes a task's policy-private state just before its first
    /// enqueue.
    fn init_task(&self, _cpu: CoreId, _task: &Arc<Task>) {}

    /// Called when a task is permanently leaving the runtime (after
    /// `task_exit`, before its stack is freed).
    fn finish_task(&self, _cpu: CoreId, _task: &Arc<Task>) {}

    /// Places a newly runnable task (spawned, woken, or handed off by
    /// `balance`) onto `cpu`'s runqueue. Fails if the policy's queue is at
    /// capacity (spec §7's `QueueFull`); a policy for which overflow is
    /// fatal instead aborts the process and never returns `Err` here.
    fn enqueue(&self, cpu: CoreId, task: Arc<Task>) -> Result<()>;

    /// Picks the next task to run on `cpu`, or `Pick::Idle` if none is
    /// ready. Called with the per-CPU runqueue lock held (fastpath,
    /// spec §4.3) — must not block.
    fn pick_next(&self, cpu: CoreId) -> Pick;

    /// Called when the currently running task on `cpu` blocks (voluntarily,
    /// via a synchronization primitive). The task has already been removed
    /// from the ready set by the caller; this is the policy's chance to
    /// clear any "currently running" bookkeeping (spec §9's CFS/EEVDF
    /// `block()` open question: both dequeue and clear `curr`).
    fn on_block(&self, _cpu: CoreId, _task: &Arc<Task>) {}

    /// Called by the timer/preemption path to ask whether the currently
    /// running task on `cpu` should be preempted in favor of picking again.
    fn should_preempt(&self, _cpu: CoreId, _running: &Arc<Task>) -> bool {
        false
    }

    /// Charges `delta_ns` of elapsed execution time to `task`, the currently
    /// running task on `cpu`. Called by the scheduler core at every point a
    /// running task's accounting needs to be brought up to date before a
    /// preemption or placement decision: voluntary yield/block/exit and each
    /// preemption-ticker pass (spec §4.4.3/§4.4.4's `vruntime`/`deadline`
    /// bookkeeping, §4.4.6's LC `active_time`).
    fn account_runtime(&self, _cpu: CoreId, _task: &Arc<Task>, _delta_ns: u64) {}

    /// Opportunity to steal or redistribute work across CPUs; called by the
    /// slowpath when `pick_next` returned `Idle` (spec §4.4.1's
    /// work-stealing hook). Returns `true` if work was found.
    fn balance(&self, _cpu: CoreId) -> bool {
        false
    }

    /// Periodic policy-driven maintenance independent of any single task
    /// transition (SQ-LCBE's congestion re-evaluation, spec §4.4.6).
    fn poll(&self, _cpu: CoreId) {}

    /// Applies policy-specific tunables from `sched_set_params`.
    fn set_params(&self, _params: crate::config::PolicyParams) {}

    /// Diagnostic dump of this policy's view of `cpu`'s runqueue, for the
    /// RCU-protected introspection path (spec §9).
    fn dump_tasks(&self, _cpu: CoreId) -> Vec<crate::id::TaskId> {
        Vec::new()
    }
}
