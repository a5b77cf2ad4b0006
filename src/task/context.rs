//! x86_64 context switch primitives.
//!
//! Grounded in `examples/hermit-os-kernel/src/arch/x86_64/kernel/switch.rs`,
//! which switches stacks by pushing/popping the System V callee-saved
//! register set around a plain `ret`. That file uses `#[naked]`, which is
//! nightly-only; this crate gets the same effect on stable Rust through
//! `global_asm!` plus `extern "C"` declarations, the pattern used by
//! `crossbeam`-style stack-switching crates.
//!
//! Three primitives, matching the three named in spec §4.2:
//! - [`switch`]: save the caller's registers and stack pointer, clear its
//!   `stack_busy` flag, and resume `next` (a previously parked task).
//! - [`switch_to_idle`]: like `switch`, but the destination is the per-CPU
//!   idle entry point rather than a saved task context, so there is no
//!   `next_rsp` to restore from — only a fresh call into `entry`.
//! - [`resume_task`]: the other half of `switch_to_idle` symmetry: jump into
//!   a previously saved task context without saving anything for the
//!   caller, because the idle loop's own call frame is never resumed (every
//!   re-entry into idle starts `schedule` fresh from [`enter_idle`]).

use std::arch::global_asm;

use crate::id::CoreId;

#[cfg(not(target_arch = "x86_64"))]
compile_error!("skyloft's context switch is implemented for x86_64 only");

extern "C" {
    fn skyloft_switch(prev_rsp_out: *mut usize, next_rsp: usize, prev_busy_out: *const u8);
    fn skyloft_switch_to_idle(
        prev_rsp_out: *mut usize,
        prev_busy_out: *const u8,
        idle_rsp: usize,
        entry: extern "C" fn(CoreId) -> !,
        arg: CoreId,
    );
    fn skyloft_resume_task(next_rsp: usize) -> !;
    fn skyloft_enter_idle(idle_rsp: usize, entry: extern "C" fn(CoreId) -> !, arg: CoreId) -> !;
}

global_asm!(
    r#"
.text
.global skyloft_switch
skyloft_switch:
    push rbp
    push rbx
    push r12
    push r13
    push r14
    push r15
    mov [rdi], rsp
    test rdx, rdx
    jz 1f
    mov byte ptr [rdx], 0
1:
    mov rsp, rsi
    pop r15
    pop r14
    pop r13
    pop r12
    pop rbx
    pop rbp
    ret

.global skyloft_switch_to_idle
skyloft_switch_to_idle:
    push rbp
    push rbx
    push r12
    push r13
    push r14
    push r15
    mov [rdi], rsp
    mov byte ptr [rsi], 0
    mov rsp, rdx
    and rsp, -16
    mov edi, r8d
    call rcx
    ud2

.global skyloft_resume_task
skyloft_resume_task:
    mov rsp, rdi
    pop r15
    pop r14
    pop r13
    pop r12
    pop rbx
    pop rbp
    ret

.global skyloft_enter_idle
skyloft_enter_idle:
    mov rsp, rdi
    and rsp, -16
    mov edi, edx
    call rsi
    ud2
"#
);

/// Saves the caller's stack pointer into `*prev_rsp`, clears `*prev_busy`,
/// and resumes execution at `next_rsp` (a pointer previously produced by
/// [`crate::task::build_initial_frame`] or by a prior call to `switch`).
///
/// # Safety
/// `next_rsp` must be a live stack pointer previously saved by `switch` or
/// `switch_to_idle` for a task that is not already running elsewhere, and
/// `prev_rsp`/`prev_busy` must be valid for writes.
pub unsafe fn switch(prev_rsp: *mut usize, next_rsp: usize, prev_busy: *const std::sync::atomic::AtomicBool) {
    skyloft_switch(prev_rsp, next_rsp, prev_busy.cast());
}

/// Saves the caller's context, clears `*prev_busy`, then resets the stack to
/// `idle_rsp` and calls `entry(core)`.
///
/// This call returns to its caller exactly like `switch` does: not by
/// falling off the end of `entry` (which never returns — it only ever
/// leaves via [`resume_task`]), but because some later `switch`/
/// `resume_task` call loads the `next_rsp` saved in `*prev_rsp`, which
/// resumes execution right after this call site.
///
/// # Safety
/// `idle_rsp` must be the base of a stack owned exclusively by this worker.
pub unsafe fn switch_to_idle(
    prev_rsp: *mut usize,
    prev_busy: *const std::sync::atomic::AtomicBool,
    idle_rsp: usize,
    entry: extern "C" fn(CoreId) -> !,
    core: CoreId,
) {
    skyloft_switch_to_idle(prev_rsp, prev_busy.cast(), idle_rsp, entry, core)
}

/// Jumps into a previously saved task context without saving anything for
/// the caller. Used by the idle loop to dispatch the task it picked.
///
/// # Safety
/// Same contract as `switch`'s `next_rsp`, and the caller must have no state
/// on its current stack worth preserving (the idle loop never resumes this
/// exact call site; it restarts fresh via [`enter_idle`]).
pub unsafe fn resume_task(next_rsp: usize) -> ! {
    skyloft_resume_task(next_rsp)
}

/// Resets the stack to `idle_rsp` and calls `entry(core)`. Used once at
/// worker startup to enter the scheduling loop on the worker's own (native)
/// stack for the first time.
///
/// # Safety
/// `idle_rsp` must be a valid, currently-unused point within the calling
/// thread's own stack (callers capture it with [`crate::task::capture_rsp`]
/// before doing anything that would make the frames below it load-bearing).
pub unsafe fn enter_idle(idle_rsp: usize, entry: extern "C" fn(CoreId) -> !, core: CoreId) -> ! {
    skyloft_enter_idle(idle_rsp, entry, core)
}

/// Reads the current stack pointer, for capturing the native stack's idle
/// entry point once at worker startup.
#[inline(always)]
pub fn capture_rsp() -> usize {
    let rsp: usize;
    unsafe {
        std::arch::asm!("mov {}, rsp", out(reg) rsp, options(nomem, nostack, preserves_flags));
    }
    rsp
}
