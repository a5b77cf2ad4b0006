//! Tasks: the schedulable unit, its stack, and the policy-private state each
//! scheduling algorithm threads through it (spec §3).
//!
//! Grounded in `examples/hermit-os-kernel/src/scheduler/task.rs`'s `Task`
//! struct, adapted from a `Box`-owned, single-core-affine kernel thread
//! descriptor into an `Arc`-shared, cross-worker one: Skyloft tasks can be
//! stolen, woken, or torn down from a CPU other than the one they last ran
//! on, so every field another worker may touch is behind an atomic rather
//! than relying on the hermit model's "owner core never changes" invariant.

pub mod context;
pub mod stack;

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::id::{AppId, CoreId, TaskId};
use stack::Stack;

/// Per-policy inline state, sized and laid out like a tagged union so a
/// `Task` never needs a second allocation for scheduler bookkeeping (spec
/// §4.1's "fixed-size inline buffer reserved for the active policy").
#[derive(Debug, Clone, Copy)]
pub enum PolicyState {
    None,
    RoundRobin {
        ticks_left: u32,
    },
    Cfs {
        vruntime: u64,
        weight: u32,
    },
    Eevdf {
        vruntime: u64,
        deadline: u64,
        slice: u64,
    },
    Sq {
        /// Ingress timestamp: when this task was last placed on the SQ/
        /// SQ-LCBE queue (spec §3's "SQ ingress ... timestamp").
        enqueued_at: u64,
        is_latency_critical: bool,
        /// Start timestamp: when this task was last dispatched onto a
        /// worker, `0` while not running (spec §3's "SQ ... start
        /// timestamp"). Compared against the preemption quantum.
        running_since: u64,
        /// Active timestamp: total microseconds this task has actually run
        /// across every dispatch since its last enqueue (spec §3's "SQ
        /// ... active timestamp"), the numerator of SQ-LCBE's congestion
        /// ratio.
        active_time_us: u64,
    },
}

impl Default for PolicyState {
    fn default() -> Self {
        PolicyState::None
    }
}

/// Coarse task lifecycle state. Fine-grained queue membership (which
/// runqueue, which wait list) lives in the scheduler/policy, not here; this
/// is only what `stack_busy` spin-waiters and diagnostics need to see
/// without taking any lock (spec §4.3, §9's RCU-protected "dump" flow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskStatus {
    Idle = 0,
    Runnable = 1,
    Running = 2,
    Blocked = 3,
    Exited = 4,
}

impl TaskStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskStatus::Idle,
            1 => TaskStatus::Runnable,
            2 => TaskStatus::Running,
            3 => TaskStatus::Blocked,
            _ => TaskStatus::Exited,
        }
    }
}

/// Function pointer + argument a freshly spawned task starts running.
pub type EntryFn = unsafe extern "C" fn(usize);

/// A schedulable unit of work: an id, an owning app, a stack, and whatever
/// bookkeeping the active policy threads through it.
///
/// Laid out with `#[repr(align(64))]` so hot fields (`status`,
/// `stack_busy`, `last_stack_pointer`) don't false-share a cache line with
/// a neighboring task in a contiguous arena, mirroring hermit's
/// `#[repr(align(64))] pub struct Task`.
#[repr(align(64))]
pub struct Task {
    pub id: TaskId,
    pub app: AppId,
    status: AtomicU8,
    /// Set while this task's registers/stack are being saved or restored;
    /// cleared only after the save half of a context switch completes, so a
    /// thief on another CPU must spin until it sees this drop to zero
    /// before touching `last_stack_pointer` (spec §4.2).
    pub stack_busy: AtomicBool,
    /// Cooperative preemption gate: cleared while running code that must
    /// not be preempted (spec §4.5's critical-section carve-out).
    pub allow_preempt: AtomicBool,
    /// Set for tasks whose stack must not be returned to the allocator on
    /// exit (e.g. the idle/bootstrap task, which owns the worker's native
    /// stack rather than an allocated one).
    skip_free: bool,
    /// Set by [`crate::scheduler::task_wakeup`] when it races ahead of the
    /// matching `task_block` (the condition was already signaled before
    /// the task managed to suspend itself). `task_block` consumes this
    /// instead of blocking when it's set, closing the classic
    /// check-then-block lost-wakeup window (spec §4.7).
    pending_wakeup: AtomicBool,
    last_stack_pointer: AtomicU64,
    last_core: AtomicU32,
    exit_code: AtomicI32,
    entry: std::cell::UnsafeCell<Option<(EntryFn, usize)>>,
    /// Written only by the CPU that currently owns this task in a runqueue
    /// or wait list; that single-writer discipline is the same invariant
    /// that protects `last_stack_pointer` between switches.
    policy_state: std::cell::UnsafeCell<PolicyState>,
    /// `None` after [`Task::take_stack`] has reclaimed it on exit.
    stack: std::sync::Mutex<Option<Stack>>,
}

// SAFETY: `entry` and `policy_state` are only written by the single CPU
// that currently owns the task (enforced by the scheduler's runqueue
// ownership invariant, spec §4.3); `stack_busy` gates cross-CPU access to
// the stack itself.
unsafe impl Sync for Task {}
unsafe impl Send for Task {}

impl Task {
    fn new(id: TaskId, app: AppId, stack: Option<Stack>) -> Self {
        Self {
            id,
            app,
            status: AtomicU8::new(TaskStatus::Idle as u8),
            stack_busy: AtomicBool::new(false),
            allow_preempt: AtomicBool::new(true),
            skip_free: stack.is_none(),
            pending_wakeup: AtomicBool::new(false),
            last_stack_pointer: AtomicU64::new(0),
            last_core: AtomicU32::new(u32::MAX),
            exit_code: AtomicI32::new(0),
            entry: std::cell::UnsafeCell::new(None),
            policy_state: std::cell::UnsafeCell::new(PolicyState::None),
            stack: std::sync::Mutex::new(stack),
        }
    }

    /// Builds a freshly spawned task with an initial register frame that,
    /// when resumed via [`context::resume_task`], lands in `task_trampoline`
    /// (spec §4.2's "Initial stack frame" contract).
    pub fn spawn(id: TaskId, app: AppId, stack: Stack, entry: EntryFn, arg: usize) -> Arc<Self> {
        let sp = build_initial_frame(&stack, trampoline_addr());
        let task = Self::new(id, app, Some(stack));
        unsafe {
            *task.entry.get() = Some((entry, arg));
        }
        task.last_stack_pointer.store(sp as u64, Ordering::Relaxed);
        Arc::new(task)
    }

    /// Builds the idle/bootstrap task for a worker: no allocated stack (it
    /// runs on the worker's native OS stack) and no entry function (it is
    /// entered directly via [`context::enter_idle`], never resumed through
    /// the usual trampoline path).
    pub fn new_idle(core: CoreId) -> Arc<Self> {
        let task = Self::new(TaskId::from_raw(0), crate::id::DAEMON_APP, None);
        task.last_core.store(core.0, Ordering::Relaxed);
        task.status.store(TaskStatus::Running as u8, Ordering::Relaxed);
        Arc::new(task)
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: TaskStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Atomically moves the task from `Running` to `Blocked`. Fails (and
    /// leaves the status untouched) if it isn't currently `Running`.
    pub fn try_transition_to_blocked(&self) -> bool {
        self.status
            .compare_exchange(
                TaskStatus::Running as u8,
                TaskStatus::Blocked as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Atomically moves the task from `Blocked` to `Runnable`. Fails if it
    /// hasn't actually blocked yet (the wakeup arrived first).
    pub fn try_wake(&self) -> bool {
        self.status
            .compare_exchange(
                TaskStatus::Blocked as u8,
                TaskStatus::Runnable as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Records that a wakeup arrived before the task managed to block.
    pub fn set_pending_wakeup(&self) {
        self.pending_wakeup.store(true, Ordering::Release);
    }

    /// Consumes a previously recorded early wakeup, if any.
    pub fn take_pending_wakeup(&self) -> bool {
        self.pending_wakeup.swap(false, Ordering::AcqRel)
    }

    pub fn last_core(&self) -> Option<CoreId> {
        let v = self.last_core.load(Ordering::Relaxed);
        if v == u32::MAX {
            None
        } else {
            Some(CoreId(v))
        }
    }

    pub fn set_last_core(&self, core: CoreId) {
        self.last_core.store(core.0, Ordering::Relaxed);
    }

    pub fn stack_pointer(&self) -> usize {
        self.last_stack_pointer.load(Ordering::Acquire) as usize
    }

    pub fn set_stack_pointer(&self, sp: usize) {
        self.last_stack_pointer.store(sp as u64, Ordering::Release);
    }

    /// Raw pointer to the saved-stack-pointer slot, for the asm context
    /// switch primitives in [`context`] to write into directly.
    pub(crate) fn sp_ptr(&self) -> *mut usize {
        self.last_stack_pointer.as_ptr() as *mut usize
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::Relaxed)
    }

    pub fn set_exit_code(&self, code: i32) {
        self.exit_code.store(code, Ordering::Relaxed);
    }

    pub fn skip_free(&self) -> bool {
        self.skip_free
    }

    /// Reclaims ownership of this task's stack, leaving it without one.
    /// Called exactly once, by `task_exit`, after the task has permanently
    /// left scheduling.
    pub fn take_stack(&self) -> Option<Stack> {
        self.stack.lock().unwrap().take()
    }

    /// Takes the (entry, arg) pair for a one-shot trampoline call. Only the
    /// task's own first run ever calls this.
    ///
    /// # Safety
    /// Must only be called from the task's own trampoline, exactly once.
    pub unsafe fn take_entry(&self) -> Option<(EntryFn, usize)> {
        (*self.entry.get()).take()
    }

    /// Reads the policy-private state.
    ///
    /// # Safety
    /// Caller must be the single CPU currently holding this task in a
    /// runqueue or wait list (spec §4.3's ownership invariant).
    pub unsafe fn policy_state(&self) -> &mut PolicyState {
        &mut *self.policy_state.get()
    }
}

/// Reserves `size` bytes for the initial register frame at the top of
/// `stack`, writes zeroed callee-saved registers and `entry` as the return
/// address, and returns the resulting stack pointer.
///
/// Layout (low to high address, matching the `pop` order in
/// `skyloft_resume_task`): `r15, r14, r13, r12, rbx, rbp, return_addr`.
fn build_initial_frame(stack: &Stack, entry: usize) -> usize {
    #[repr(C)]
    struct InitialFrame {
        r15: u64,
        r14: u64,
        r13: u64,
        r12: u64,
        rbx: u64,
        rbp: u64,
        ret_addr: u64,
    }

    let top = stack.top();
    let addr = (top - std::mem::size_of::<InitialFrame>()) & !0xf;
    let frame = addr as *mut InitialFrame;
    unsafe {
        frame.write(InitialFrame {
            r15: 0,
            r14: 0,
            r13: 0,
            r12: 0,
            rbx: 0,
            rbp: 0,
            ret_addr: entry as u64,
        });
    }
    addr
}

fn trampoline_addr() -> usize {
    task_trampoline as usize
}

/// The first code every spawned task runs: fetches its entry point from the
/// scheduler's notion of "the task that just got resumed" and calls it. If
/// the entry function returns, the task exits with status 0, matching spec
/// §4.3's fallthrough for a task body that returns normally.
extern "C" fn task_trampoline() -> ! {
    let task = crate::scheduler::current_task();
    let entry = unsafe { task.take_entry() };
    if let Some((func, arg)) = entry {
        unsafe {
            func(arg);
        }
    }
    crate::scheduler::task_exit(0);
}
