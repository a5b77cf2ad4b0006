//! Preemption gating: a per-thread disable counter tasks hold while running
//! code that must not be interrupted, and the host-timer backend that
//! drives the periodic preemption check when `uintr` hardware isn't
//! available (spec §4.5).
//!
//! Grounded in `examples/hermit-os-kernel/src/scheduler/mod.rs`'s
//! preemption-counter pattern (`CoreScheduler::reschedule` only acts when
//! the counter is zero). `uintr` delivery needs a real interrupt handler
//! context this crate can't get in userspace without the kernel module
//! spec §1 scopes out, so "host-timer" here means a periodic check at
//! existing safe points (task_yield, task_block, timer poll) rather than an
//! asynchronous signal handler; [`crate::platform::uintr::is_available`]
//! always returns `false`, so this is the only backend ever selected.

use std::cell::Cell;

thread_local! {
    static DISABLE_COUNT: Cell<u32> = const { Cell::new(0) };
}

/// Raises the calling thread's preemption-disable count.
pub fn disable() {
    DISABLE_COUNT.with(|c| c.set(c.get() + 1));
}

/// Lowers the calling thread's preemption-disable count.
pub fn enable() {
    DISABLE_COUNT.with(|c| {
        let v = c.get();
        debug_assert!(v > 0, "preempt::enable without a matching disable");
        c.set(v.saturating_sub(1));
    });
}

/// Whether the calling thread currently allows preemption.
pub fn is_enabled() -> bool {
    DISABLE_COUNT.with(|c| c.get() == 0)
}

/// RAII guard pairing `disable`/`enable`.
pub struct PreemptGuard(());

impl PreemptGuard {
    pub fn new() -> Self {
        disable();
        Self(())
    }
}

impl Default for PreemptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PreemptGuard {
    fn drop(&mut self) {
        enable();
    }
}
