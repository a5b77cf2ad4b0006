//! Public entry points: the surface an embedding application links
//! against, re-exported at the crate root (spec §5).
//!
//! Grounded in `examples/hermit-os-kernel/src/scheduler/mod.rs`'s free
//! functions (`block_current_task`, `wakeup_task`, ...) that sit alongside
//! `PerCoreScheduler`; this module is the equivalent thin, app-facing
//! surface over [`crate::scheduler`]'s internals.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, PolicyParams};
use crate::error::Result;
use crate::id::{AppId, CoreId, TaskId};
use crate::scheduler;
use crate::task::EntryFn;

/// Starts the runtime with `config`, blocking the calling thread forever
/// as one of the worker threads (spec §4.3).
pub fn libos_start(config: Config) -> Result<()> {
    scheduler::start(config)
}

pub fn current_cpu_id() -> CoreId {
    scheduler::current_core_id()
}

pub fn current_task_id() -> TaskId {
    scheduler::current_task().id
}

pub fn current_app_id() -> AppId {
    scheduler::current_app_id()
}

/// Spawns a task on the calling CPU.
pub fn task_spawn(entry: EntryFn, arg: usize) -> Result<TaskId> {
    scheduler::task_spawn(entry, arg)
}

/// Spawns a task pinned to a specific CPU.
pub fn task_spawn_oncpu(cpu: CoreId, entry: EntryFn, arg: usize) -> Result<TaskId> {
    scheduler::task_spawn_oncpu(cpu, scheduler::current_app_id(), entry, arg)
}

/// Voluntarily yields the calling task.
pub fn task_yield() {
    scheduler::task_yield()
}

/// Terminates the calling task.
pub fn task_exit(code: i32) -> ! {
    scheduler::task_exit(code)
}

/// Checks and consumes a pending host-timer preemption request for the
/// calling task, yielding if one is set (spec §4.5's "yield happens at the
/// next safe point"). CPU-bound task bodies should call this periodically
/// in long-running loops; blocking calls elsewhere in this crate already
/// reach a safe point on their own.
pub fn maybe_yield() {
    if scheduler::take_preempt_request() {
        task_yield();
    }
}

/// Blocks the calling task until `duration` has elapsed, via this CPU's
/// timer heap rather than a blocking OS syscall (spec §4.9).
pub fn sleep(duration: Duration) {
    usleep(duration.as_micros() as u64);
}

pub fn usleep(micros: u64) {
    let cpu = scheduler::current_core_id();
    let task = scheduler::current_task();
    let deadline = crate::platform::now_micros() + micros;
    arm_and_block(cpu, task, deadline);
}

fn arm_and_block(cpu: CoreId, task: Arc<crate::task::Task>, deadline_us: u64) {
    let task_id = task.id;
    let handle = crate::scheduler::arm_timer(cpu, task, deadline_us);
    scheduler::task_block();
    // Waking up via the timer already consumed the sleepers entry; a wakeup
    // from elsewhere (e.g. a future `wake` API) would need this cancel to
    // avoid firing a stale timer into an unrelated later sleep.
    crate::scheduler::cancel_timer(cpu, task_id, handle);
}

/// Applies policy-specific tunables (spec §6's `sched_set_params`).
pub fn sched_set_params(params: PolicyParams) {
    scheduler::set_policy_params(params);
}

/// Manually drives one softirq pass (due timers, NIC ring) on the calling
/// CPU; useful for an app embedding a single worker without its own idle
/// loop cadence.
pub fn sched_poll() {
    scheduler::poll_softirq();
}

/// Defers `free` until every CPU has passed a quiescent state since this
/// call (spec §4.8's `rcu_free`).
pub fn rcu_free<T: Send + 'static>(ptr: *mut T, free: fn(*mut T)) {
    scheduler::rcu_free(ptr, free);
}

/// Blocks the calling task until it is safe to free an object read before
/// this call (spec §4.8's `synchronize_rcu`).
pub fn synchronize_rcu() {
    scheduler::synchronize_rcu();
}

/// Registers a new app sharing this CPU pool, returning its id (spec
/// §4.11). Pair with [`cpu_handoff`] to actually hand it a worker's CPU.
pub fn register_app(name: impl Into<String>, cpus: Vec<CoreId>) -> AppId {
    scheduler::register_app(name, cpus)
}

pub fn unregister_app(id: AppId) -> Result<()> {
    scheduler::unregister_app(id)
}

/// Hands `cpu` over to `new_owner`, parking the outgoing app's worker
/// thread until the CPU is handed back (spec §4.6).
pub fn cpu_handoff(cpu: CoreId, new_owner: AppId) {
    scheduler::cpu_handoff(cpu, new_owner);
}

/// Blocks the calling worker thread until it owns `cpu` (spec §4.6).
pub fn wait_for_cpu_ownership(cpu: CoreId, app: AppId) {
    scheduler::wait_for_cpu_ownership(cpu, app);
}

/// Wakes a sleeping task by id, e.g. from a cross-app control path that
/// doesn't otherwise hold a reference to it (spec §7).
pub fn wake_task(id: TaskId) -> Result<()> {
    scheduler::wake_sleeper(id)
}

/// Pushes a command onto `cpu`'s inbound NIC ring (spec §4.10).
pub fn nic_ring_push(cpu: CoreId, cmd: crate::softirq::NicCommand) -> Result<()> {
    scheduler::nic_ring_push(cpu, cmd)
}
