//! The per-CPU scheduler core: fastpath/slowpath dispatch, task lifecycle
//! (spawn/yield/block/wakeup/exit), and the cross-app CPU hand-off that
//! lets Skyloft pull a CPU out from under one app's worker and give it to
//! another's (spec §4.3).
//!
//! Grounded in `examples/hermit-os-kernel/src/scheduler/mod.rs`'s
//! `PerCoreScheduler`/`reschedule` split between a lock-free fast path and
//! a slower one that walks the ready queue; adapted from hermit's
//! single-algorithm, single-app kernel scheduler into a policy-parameterized
//! one that also answers to another app's CPU-ownership claim.

pub mod policies;
pub mod policy;

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, SkyloftError};
use crate::id::{AppId, CoreId, TaskId};
use crate::platform::{self, CpuSlot};
use crate::rcu::RcuState;
use crate::task::{self, EntryFn, Task, TaskStatus};
use crate::timer::{TimerHandle, TimerHeap};
use crossbeam_queue::SegQueue;
use policy::{Pick, Policy};

/// Whole-runtime state shared by every worker.
struct Runtime {
    policy: Arc<dyn Policy>,
    cpus: Vec<CoreId>,
    stacks: task::stack::StackAllocator,
    cpu_slots: Vec<CpuSlot>,
    timers: Vec<TimerHeap>,
    rcu: RcuState,
    config: Config,
    /// Exited tasks whose stacks haven't been freed yet. A task can never
    /// safely free its own stack (it's still executing on it up to the
    /// moment it switches away for good), so `task_exit` defers the actual
    /// free to whichever CPU next runs the idle loop (spec §4.3's deferred
    /// reclamation note).
    zombies: SegQueue<Arc<Task>>,
    /// Tasks parked in `usleep`, keyed by id so the timer heap (which only
    /// knows ids, per spec §4.9) can find the `Arc` to wake.
    sleepers: std::sync::Mutex<hashbrown::HashMap<TaskId, Arc<Task>>>,
    /// Registry of apps sharing this CPU pool (spec §4.11).
    apps: crate::app::AppTable,
    /// The task currently dispatched on each CPU, visible to the
    /// preemption ticker thread (which runs on neither worker's stack, so
    /// it can't read a worker's thread-local `CURRENT`).
    running: Vec<std::sync::Mutex<Option<Arc<Task>>>>,
    /// Set by the preemption ticker when a CPU's running task should yield
    /// at its next safe point (spec §4.5).
    preempt_requested: Vec<AtomicBool>,
    /// Microsecond timestamp of the last runtime-accounting checkpoint on
    /// each CPU (dispatch, yield, block, exit, or ticker pass), so
    /// `charge_elapsed` can bill the policy for exactly the time since the
    /// last checkpoint rather than since the task started running.
    running_since: Vec<AtomicU64>,
    /// Per-CPU inbound NIC command ring, drained by the softirq pass
    /// (spec §4.10).
    nic_rings: Vec<crate::softirq::CommandRing>,
}

/// How many NIC-ring entries a single softirq pass drains before giving
/// the CPU back to task scheduling (spec §4.10's "up to *budget*").
const NIC_RING_BUDGET: usize = 64;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn runtime() -> &'static Runtime {
    RUNTIME.get().expect("libos_start was not called")
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<Task>>> = const { RefCell::new(None) };
    static CURRENT_CORE: Cell<Option<CoreId>> = const { Cell::new(None) };
    static IDLE_RSP: Cell<usize> = const { Cell::new(0) };
}

/// Starts the runtime: builds the configured policy, allocates per-CPU
/// state, and spawns one pinned worker OS thread per CPU in `config.cpus`.
/// Blocks the calling thread forever (the last worker is run inline on it),
/// matching spec §4.3's "the runtime owns every worker thread" model.
pub fn start(config: Config) -> Result<()> {
    config.validate()?;
    let cpus: Vec<CoreId> = config.cpus.iter().map(|&c| CoreId(c)).collect();
    let num_cpus = cpus.len();
    let policy = policies::build(&config, num_cpus)?;
    policy.init(&cpus);

    let new_runtime = Runtime {
        policy,
        cpus: cpus.clone(),
        stacks: task::stack::StackAllocator::new(config.stack_size, config.magazine_size),
        cpu_slots: (0..num_cpus).map(|_| CpuSlot::new(crate::id::DAEMON_APP)).collect(),
        timers: (0..num_cpus).map(|_| TimerHeap::default()).collect(),
        rcu: RcuState::new(num_cpus),
        config,
        zombies: SegQueue::new(),
        sleepers: std::sync::Mutex::new(hashbrown::HashMap::new()),
        apps: crate::app::AppTable::new(),
        running: (0..num_cpus).map(|_| std::sync::Mutex::new(None)).collect(),
        preempt_requested: (0..num_cpus).map(|_| AtomicBool::new(false)).collect(),
        running_since: (0..num_cpus).map(|_| AtomicU64::new(platform::now_micros())).collect(),
        nic_rings: cpus.iter().map(|&c| crate::softirq::CommandRing::new(c)).collect(),
    };
    RUNTIME.set(new_runtime).map_err(|_| SkyloftError::InvalidArgument("libos_start called twice"))?;

    crate::logging::install(runtime().config.log_level);

    if let Some(tick) = runtime().config.preempt_tick {
        if !preempt_backend_available() {
            std::thread::Builder::new()
                .name("skyloft-preempt".to_string())
                .spawn(move || preempt_ticker(tick))
                .map_err(|_| SkyloftError::Unrecoverable("failed to spawn preemption ticker"))?;
        }
    }

    if let Some((entry, arg)) = runtime().config.app_main {
        task_spawn_oncpu(cpus[0], crate::id::DAEMON_APP, entry, arg)?;
    }

    for &cpu in &cpus[1..] {
        std::thread::Builder::new()
            .name(format!("skyloft-{cpu}"))
            .spawn(move || run_worker(cpu))
            .map_err(|_| SkyloftError::Unrecoverable("failed to spawn worker thread"))?;
    }
    STARTED.store(true, Ordering::Release);
    run_worker(cpus[0]);
    Ok(())
}

/// The id of the CPU the calling (worker) thread is pinned to.
pub fn current_core_id() -> CoreId {
    try_current_core_id().expect("not running on a skyloft worker thread")
}

/// Like [`current_core_id`], but `None` off a worker thread instead of
/// panicking — used by the logger, which may be invoked from any thread.
pub fn try_current_core_id() -> Option<CoreId> {
    CURRENT_CORE.with(|c| c.get())
}

/// The task currently running on the calling worker thread.
pub fn current_task() -> Arc<Task> {
    CURRENT.with(|c| c.borrow().clone()).expect("no current task")
}

pub fn current_app_id() -> AppId {
    current_task().app
}

fn set_current(cpu: CoreId, task: Arc<Task>) {
    *runtime().running[cpu.0 as usize].lock().unwrap() = Some(task.clone());
    runtime().running_since[cpu.0 as usize].store(platform::now_micros(), Ordering::Release);
    CURRENT.with(|c| *c.borrow_mut() = Some(task));
}

/// Bills the policy for the time `task` has spent running on `cpu` since
/// the last checkpoint (a prior dispatch, charge, or ticker pass), then
/// resets the checkpoint to now (spec §4.4.3/§4.4.4's `vruntime`/`deadline`
/// accounting, §4.4.6's LC `active_time`). Called from every point a
/// running task's accounting must be current before a scheduling decision:
/// voluntary yield/block/exit, and each preemption-ticker pass.
fn charge_elapsed(cpu: CoreId, task: &Arc<Task>) {
    let now = platform::now_micros();
    let prev = runtime().running_since[cpu.0 as usize].swap(now, Ordering::AcqRel);
    let delta_ns = now.saturating_sub(prev) * 1_000;
    runtime().policy.account_runtime(cpu, task, delta_ns);
}

/// Probes for a user-interrupt preemption backend, only when the `uintr`
/// feature is enabled (spec §4.5, option 2). Without the feature, the
/// probe is skipped entirely and the host-timer ticker always runs; with
/// it, [`platform::uintr::is_available`] is consulted first and the
/// ticker is only spawned if it reports no hardware support.
#[cfg(feature = "uintr")]
fn preempt_backend_available() -> bool {
    crate::platform::uintr::is_available()
}

#[cfg(not(feature = "uintr"))]
fn preempt_backend_available() -> bool {
    false
}

/// Host-timer preemption backend (spec §4.5, option 1): a dedicated thread
/// that periodically asks each CPU's policy whether its running task should
/// yield, and if so, only sets a flag for that task to observe at its own
/// next safe point — it never switches stacks itself (spec's "a handler
/// never switches directly from interrupt context into another task"
/// invariant).
fn preempt_ticker(tick: Duration) {
    loop {
        std::thread::sleep(tick);
        let Some(rt) = RUNTIME.get() else { return };
        for (i, cpu) in rt.cpus.iter().enumerate() {
            let running = rt.running[i].lock().unwrap().clone();
            let Some(task) = running else { continue };
            charge_elapsed(*cpu, &task);
            if rt.policy.should_preempt(*cpu, &task) {
                rt.preempt_requested[i].store(true, Ordering::Release);
            }
        }
    }
}

/// Consumes a pending preemption request for the calling CPU's currently
/// running task, respecting both the per-task [`Task::allow_preempt`] gate
/// and the thread-local [`crate::preempt`] disable count.
pub fn take_preempt_request() -> bool {
    if !crate::preempt::is_enabled() {
        return false;
    }
    if !current_task().allow_preempt.load(Ordering::Acquire) {
        return false;
    }
    let cpu = current_core_id();
    runtime().preempt_requested[cpu.0 as usize].swap(false, Ordering::AcqRel)
}

/// A worker's entire lifetime: pin to `cpu`, build its idle task, capture
/// its native stack as the idle/slowpath stack, and enter the scheduling
/// loop. Never returns under normal operation.
fn run_worker(cpu: CoreId) {
    CURRENT_CORE.with(|c| c.set(Some(cpu)));
    let _ = platform::pin_current_thread(cpu.0);
    runtime().policy.init_percpu(cpu);
    let idle = Task::new_idle(cpu);
    set_current(cpu, idle);

    let idle_rsp = task::context::capture_rsp();
    IDLE_RSP.with(|c| c.set(idle_rsp));
    unsafe {
        task::context::enter_idle(idle_rsp, schedule_entry, cpu);
    }
}

/// The slowpath: repeatedly asks the policy for work, polls due timers and
/// cross-app hand-off requests when there is none, and jumps into whatever
/// task it finds. Runs entirely on the worker's native stack (spec §4.3).
extern "C" fn schedule_entry(cpu: CoreId) -> ! {
    loop {
        reap_zombies();

        for task_id in crate::softirq::poll(&runtime().timers[cpu.0 as usize]) {
            wake_by_id(task_id);
        }
        crate::softirq::poll_nic_ring(&runtime().nic_rings[cpu.0 as usize], NIC_RING_BUDGET);

        match runtime().policy.pick_next(cpu) {
            Pick::Task(next) => {
                if ensure_cpu_owner(cpu, next.app) {
                    dispatch(cpu, next);
                } else {
                    runtime()
                        .policy
                        .enqueue(cpu, next)
                        .expect("requeue after failed cross-app hand-off");
                }
            }
            Pick::Idle => {
                if !runtime().policy.balance(cpu) {
                    let timeout = runtime().timers[cpu.0 as usize]
                        .next_deadline_us()
                        .map(|us| Duration::from_micros(us.saturating_sub(platform::now_micros())))
                        .unwrap_or(Duration::from_millis(1))
                        .max(Duration::from_micros(50));
                    runtime().cpu_slots[cpu.0 as usize].park_timeout(timeout);
                }
            }
        }
        runtime().policy.poll(cpu);
    }
}

/// Frees the stacks of any tasks that exited since the last reap. Only
/// ever called from the idle/slowpath stack, never from a task's own stack
/// (see [`Runtime::zombies`]).
fn reap_zombies() {
    while let Some(task) = runtime().zombies.pop() {
        if let Some(stack) = task.take_stack() {
            runtime().stacks.free(stack);
        }
    }
}

/// Jumps the calling (idle-loop) thread into `next`. Never returns: control
/// only leaves `next`'s stack again via `switch`/`switch_to_idle`, which
/// resumes somewhere inside this very function's callers at a much later
/// point in time, not by falling through here.
fn dispatch(cpu: CoreId, next: Arc<Task>) -> ! {
    set_current(cpu, next.clone());
    next.set_status(TaskStatus::Running);
    runtime().rcu.enter(cpu);
    unsafe {
        task::context::resume_task(next.stack_pointer());
    }
}

/// Switches away from the currently running task, either directly into
/// another runnable task (fastpath) or back to the idle/slowpath loop.
fn reschedule(cpu: CoreId, prev: Arc<Task>) {
    runtime().rcu.exit(cpu);
    let pick = match runtime().policy.pick_next(cpu) {
        Pick::Task(next) if Arc::ptr_eq(&next, &prev) => {
            prev.set_status(TaskStatus::Running);
            runtime().rcu.enter(cpu);
            return;
        }
        // `next` belongs to a different app than the one currently owning
        // `cpu`: perform the automatic hand-off spec §4.3 requires before
        // dispatching it. A failed hand-off (the app has since exited)
        // reverts the slot to the daemon and falls back to idle, having
        // requeued `next` for a later retry.
        Pick::Task(next) if !ensure_cpu_owner(cpu, next.app) => {
            runtime()
                .policy
                .enqueue(cpu, next)
                .expect("requeue after failed cross-app hand-off");
            Pick::Idle
        }
        other => other,
    };
    match pick {
        Pick::Task(next) => {
            set_current(cpu, next.clone());
            next.set_status(TaskStatus::Running);
            // Spin until the target's previous switch-out finished saving
            // its registers; only matters when `next` was just stolen from
            // another CPU's runqueue (spec §4.2's busy-flag contract).
            while next.stack_busy.load(Ordering::Acquire) {
                std::hint::spin_loop();
            }
            runtime().rcu.enter(cpu);
            unsafe {
                task::context::switch(prev.sp_ptr(), next.stack_pointer(), &prev.stack_busy);
            }
        }
        Pick::Idle => {
            let idle_rsp = IDLE_RSP.with(|c| c.get());
            unsafe {
                task::context::switch_to_idle(
                    prev.sp_ptr(),
                    &prev.stack_busy,
                    idle_rsp,
                    schedule_entry,
                    cpu,
                );
            }
        }
    }
}

/// Ensures `cpu`'s ownership slot matches `app` before a task of that app
/// runs there, performing the automatic cross-app hand-off spec §4.3
/// requires (P11). Returns `false` if `app` has since been unregistered,
/// in which case the slot is instead reverted to the daemon (spec's "if
/// target app exited, revert to daemon and retry" fallback) and the caller
/// must not dispatch `next`.
fn ensure_cpu_owner(cpu: CoreId, app: AppId) -> bool {
    let slot = &runtime().cpu_slots[cpu.0 as usize];
    if slot.owner() == app {
        return true;
    }
    if app != crate::id::DAEMON_APP && !runtime().apps.contains(app) {
        slot.switch_to(crate::id::DAEMON_APP);
        return false;
    }
    slot.switch_to(app);
    true
}

/// Spawns a new task on `cpu` and marks it runnable.
pub fn task_spawn_oncpu(cpu: CoreId, app: AppId, entry: EntryFn, arg: usize) -> Result<TaskId> {
    let stack = runtime()
        .stacks
        .alloc()
        .map_err(|_| SkyloftError::OutOfMemory("task stack"))?;
    let id = TaskId::next();
    let task = Task::spawn(id, app, stack, entry, arg);
    runtime().policy.init_task(cpu, &task);
    task.set_status(TaskStatus::Runnable);
    runtime().policy.enqueue(cpu, task)?;
    wake_all_cpus();
    Ok(id)
}

/// Wakes every CPU's idle loop. Plain per-CPU policies only ever need the
/// one CPU a task was enqueued against woken, but SQ/SQ-LCBE share a
/// single queue that isn't tied to the CPU named at enqueue time (spec
/// §4.4.5) — waking only that one CPU can leave a runnable task sitting in
/// the shared queue while every worker is parked. A spurious wakeup under
/// the other policies just costs one extra idle-loop pass.
fn wake_all_cpus() {
    for slot in &runtime().cpu_slots {
        slot.wakeup();
    }
}

/// Spawns a new task on the calling worker's own CPU.
pub fn task_spawn(entry: EntryFn, arg: usize) -> Result<TaskId> {
    task_spawn_oncpu(current_core_id(), current_app_id(), entry, arg)
}

/// Voluntarily gives up the CPU, re-enqueuing the caller as runnable.
pub fn task_yield() {
    let cpu = current_core_id();
    let prev = current_task();
    charge_elapsed(cpu, &prev);
    prev.set_status(TaskStatus::Runnable);
    runtime()
        .policy
        .enqueue(cpu, prev.clone())
        .expect("runqueue full re-enqueuing the task that was just running on it");
    reschedule(cpu, prev);
}

/// Removes the calling task from scheduling entirely until some other task
/// calls [`task_wakeup`] with its id. The caller is responsible for having
/// already recorded `task`'s id on whatever wait list will wake it (spec
/// §4.7's synchronization primitives call this after enqueueing onto their
/// own wait queue under a spinlock).
pub fn task_block() {
    let cpu = current_core_id();
    let prev = current_task();
    if !prev.try_transition_to_blocked() {
        unreachable!("task_block called on a task that wasn't Running");
    }
    if prev.take_pending_wakeup() {
        // A wakeup raced ahead of us: the condition we were about to wait
        // on was already signaled, so don't actually suspend.
        prev.set_status(TaskStatus::Runnable);
        prev.set_status(TaskStatus::Running);
        return;
    }
    charge_elapsed(cpu, &prev);
    runtime().policy.on_block(cpu, &prev);
    reschedule(cpu, prev);
}

/// Marks a blocked task runnable again and enqueues it on its last CPU. If
/// the task hasn't actually blocked yet, records the wakeup instead so the
/// eventual `task_block` call sees it and skips suspending (spec §4.7).
pub fn task_wakeup(task: Arc<Task>) {
    if !task.try_wake() {
        task.set_pending_wakeup();
        return;
    }
    let cpu = task.last_core().unwrap_or(runtime().cpus[0]);
    runtime()
        .policy
        .enqueue(cpu, task)
        .expect("runqueue full waking a task that was already accounted for");
    wake_all_cpus();
}

/// Wakes a sleeping task by id from outside the scheduler, surfacing the
/// failure modes spec §7 enumerates for a cross-app wakeup: `NoSuchTask`
/// if nothing is parked under `id` (already woken, or never slept), and
/// `Busy` if the task's owning app has since exited. Unlike the internal
/// [`wake_by_id`]/[`task_wakeup`] path used by timers and synchronization
/// primitives — which only ever wake a task whose liveness they've already
/// established under their own lock — this is the entry point for a
/// wakeup issued by code with no such guarantee.
pub fn wake_sleeper(id: TaskId) -> Result<()> {
    let task = runtime()
        .sleepers
        .lock()
        .unwrap()
        .remove(&id)
        .ok_or(SkyloftError::NoSuchTask(id))?;
    if !runtime().apps.contains(task.app) {
        return Err(SkyloftError::Busy);
    }
    task_wakeup(task);
    Ok(())
}

/// Resolves a timer-fired task id back to its `Arc` via [`Runtime::sleepers`]
/// and wakes it. A miss means the sleep was already cancelled or the task
/// woke through some other path first.
fn wake_by_id(task_id: TaskId) {
    if let Some(task) = runtime().sleepers.lock().unwrap().remove(&task_id) {
        task_wakeup(task);
    }
}

/// Arms a timer to wake `task` at `deadline_us`, registering it in
/// [`Runtime::sleepers`] so the owning CPU's softirq poll can find it again
/// (spec §4.9's `usleep`).
pub fn arm_timer(cpu: CoreId, task: Arc<Task>, deadline_us: u64) -> TimerHandle {
    let id = task.id;
    runtime().sleepers.lock().unwrap().insert(id, task);
    runtime().timers[cpu.0 as usize].arm(id, deadline_us)
}

/// Cancels a previously armed sleep timer, e.g. when a task is woken by
/// something other than its own deadline.
pub fn cancel_timer(cpu: CoreId, task_id: TaskId, handle: TimerHandle) {
    runtime().sleepers.lock().unwrap().remove(&task_id);
    runtime().timers[cpu.0 as usize].cancel(handle);
}

/// Applies policy-specific tunables from `sched_set_params`.
pub fn set_policy_params(params: crate::config::PolicyParams) {
    runtime().policy.set_params(params);
}

/// Runs one softirq pass (due timers, NIC ring) on the calling CPU.
pub fn poll_softirq() {
    let cpu = current_core_id();
    for task_id in crate::softirq::poll(&runtime().timers[cpu.0 as usize]) {
        wake_by_id(task_id);
    }
    crate::softirq::poll_nic_ring(&runtime().nic_rings[cpu.0 as usize], NIC_RING_BUDGET);
}

/// Pushes a command onto `cpu`'s inbound NIC ring, to be drained by its
/// next softirq pass (spec §4.10). The real producer is the iokernel
/// thread, out of scope for this crate; this entry point exists for
/// whatever embeds a poll-mode driver against it.
pub fn nic_ring_push(cpu: CoreId, cmd: crate::softirq::NicCommand) -> Result<()> {
    runtime().nic_rings[cpu.0 as usize].push(cmd)
}

/// Defers `free` until every CPU has passed a quiescent state since this
/// call, i.e. until no reader could still hold a pointer obtained before
/// `ptr` was detached from whatever structure readers walk (spec §4.8,
/// P7). Grounded on `original_source/libos/sync/rcu.c`'s `rcu_free`.
pub fn rcu_free<T: Send + 'static>(ptr: *mut T, free: fn(*mut T)) {
    let addr = ptr as usize;
    if runtime().rcu.defer(Box::new(move || free(addr as *mut T))) {
        spawn_rcu_worker();
    }
}

/// Blocks the calling task until it is safe to free an object read before
/// this call (spec §4.8's `synchronize_rcu`). Grounded on
/// `original_source/libos/sync/rcu.c`'s `synchronize_rcu`: a callback
/// wakes this task once the runtime's generation counters have gone
/// quiescent, rather than busy-spinning the calling CPU.
pub fn synchronize_rcu() {
    let task = current_task();
    if runtime().rcu.defer(Box::new(move || task_wakeup(task))) {
        spawn_rcu_worker();
    }
    task_block();
}

/// Spawns the one RCU worker task that drains deferred frees, the first
/// time `rcu_free`/`synchronize_rcu` is ever called (spec §4.8's
/// "spawns the RCU worker once").
fn spawn_rcu_worker() {
    let cpu = runtime().cpus[0];
    task_spawn_oncpu(cpu, crate::id::DAEMON_APP, rcu_worker_entry, 0)
        .expect("failed to spawn rcu worker task");
}

unsafe extern "C" fn rcu_worker_entry(_arg: usize) {
    loop {
        runtime().rcu.run_pending();
        crate::runtime::usleep(crate::rcu::RCU_SLEEP_PERIOD_US);
    }
}

/// Terminates the calling task with `exit_code` and never returns.
pub fn task_exit(exit_code: i32) -> ! {
    let cpu = current_core_id();
    let prev = current_task();
    prev.set_exit_code(exit_code);
    prev.set_status(TaskStatus::Exited);
    charge_elapsed(cpu, &prev);
    runtime().policy.finish_task(cpu, &prev);
    if !prev.skip_free() {
        // Deferred: this task is still executing on its own stack until
        // the `reschedule` call below switches away for good, so the
        // actual free happens later, off this stack (`reap_zombies`).
        runtime().zombies.push(prev.clone());
    }
    reschedule(cpu, prev);
    unreachable!("a freshly exited task is never resumed");
}

/// Hands `cpu` over to a different app, parking the calling (outgoing)
/// app's worker thread until the CPU comes back (spec §4.6's cross-app
/// hand-off, backed by [`CpuSlot::switch_to`]).
pub fn cpu_handoff(cpu: CoreId, new_owner: AppId) {
    let slot = &runtime().cpu_slots[cpu.0 as usize];
    slot.switch_to(new_owner);
}

/// Blocks the calling worker thread until it is handed ownership of its
/// pinned CPU, used by an app's worker before it starts pulling tasks for
/// a CPU it doesn't yet own (spec §4.6).
pub fn wait_for_cpu_ownership(cpu: CoreId, app: AppId) {
    let slot = &runtime().cpu_slots[cpu.0 as usize];
    while slot.owner() != app {
        slot.park();
    }
}

/// Registers a new app in the CPU-pool registry, returning its id (spec
/// §4.11). Does not by itself grant ownership of any CPU; pair with
/// [`cpu_handoff`] to actually hand a worker's CPU to it.
pub fn register_app(name: impl Into<String>, cpus: Vec<CoreId>) -> AppId {
    runtime().apps.register(name, cpus)
}

pub fn unregister_app(id: AppId) -> Result<()> {
    runtime().apps.unregister(id)
}

/// The app the registry believes owns `cpu`, if any.
pub fn app_owner(cpu: CoreId) -> Option<AppId> {
    runtime().apps.owner_of(cpu)
}

/// The CPUs the registry believes `app` owns.
pub fn app_cpus(app: AppId) -> Vec<CoreId> {
    runtime().apps.cpus_of(app)
}

static STARTED: AtomicBool = AtomicBool::new(false);

/// Whether [`start`] has completed successfully.
pub fn is_started() -> bool {
    STARTED.load(Ordering::Acquire)
}
