//! Platform glue: CPU pinning, memory mapping for stacks and shared-memory
//! regions, and the `park`/`wakeup`/`switch_to` primitives spec §6 assigns
//! to a kernel module.
//!
//! Grounded in `original_source/libos/platform/{cpu,mem}.c` and
//! `kmod/main.c`'s three ioctl verbs. The real kernel module is out of
//! scope (spec §1); this module implements the POSIX fallback spec §6
//! explicitly allows: `park`/`wakeup`/`switch_to` become condition-variable
//! operations on a per-CPU ownership slot rather than a real-time signal
//! plus `sigwait`, since both give the same "block the calling OS thread
//! until woken by another thread" contract for a single host process.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Result, SkyloftError};
use crate::id::AppId;

/// Pins the calling OS thread to a single logical CPU.
///
/// On platforms without `sched_setaffinity` (anything but Linux) this is a
/// best-effort no-op: correctness of the scheduler does not depend on the
/// OS actually honoring the pin, only on each worker consistently treating
/// one `CoreId` as "its own".
pub fn pin_current_thread(cpu: u32) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(cpu as usize, &mut set);
            let rc = libc::sched_setaffinity(
                0,
                std::mem::size_of::<libc::cpu_set_t>(),
                &set as *const _,
            );
            if rc != 0 {
                return Err(SkyloftError::InvalidArgument("sched_setaffinity failed"));
            }
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = cpu;
    }
    Ok(())
}

/// Number of logical CPUs visible to the process.
pub fn available_parallelism() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

/// Monotonic microsecond clock, shared by the timer heap and the RCU worker.
pub fn now_micros() -> u64 {
    static EPOCH: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_micros() as u64
}

/// A single CPU's ownership slot: which app currently holds the right to
/// run its worker thread there, plus the condvar used to hand off control.
///
/// This is the POSIX-fallback stand-in for the kernel's per-CPU `park`
/// queue: at most one app's worker thread is ever runnable on a given slot
/// at a time, matching spec §4.3's "only point at which two OS threads
/// contend for one CPU".
pub struct CpuSlot {
    state: Mutex<SlotState>,
    cond: Condvar,
}

struct SlotState {
    owner: AppId,
    /// Set when `owner`'s thread should wake up and run.
    runnable: bool,
    parked: bool,
}

impl CpuSlot {
    pub fn new(owner: AppId) -> Self {
        Self {
            state: Mutex::new(SlotState {
                owner,
                runnable: true,
                parked: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn owner(&self) -> AppId {
        self.state.lock().unwrap().owner
    }

    /// `PARK(cpu)`: block the calling thread until it is woken, or until the
    /// CPU is handed to a different app (in which case the caller must stop
    /// running on this CPU).
    pub fn park(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.parked = true;
        while !guard.runnable {
            guard = self.cond.wait(guard).unwrap();
        }
        guard.parked = false;
    }

    /// `PARK(cpu)` with a timeout, used by idle loops that must still poll
    /// softirq work. Returns `true` if woken, `false` on timeout.
    pub fn park_timeout(&self, timeout: Duration) -> bool {
        let mut guard = self.state.lock().unwrap();
        guard.parked = true;
        let (mut guard, result) = self
            .cond
            .wait_timeout_while(guard, timeout, |s| !s.runnable)
            .unwrap();
        guard.parked = false;
        !result.timed_out()
    }

    /// `WAKEUP(tid)`: wake the current owner's parked thread without
    /// changing ownership.
    pub fn wakeup(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.runnable = true;
        self.cond.notify_all();
    }

    /// `SWITCH_TO(tid)`: hand the CPU to `new_owner` and wake its thread,
    /// parking the previous owner's thread in the process.
    pub fn switch_to(&self, new_owner: AppId) {
        let mut guard = self.state.lock().unwrap();
        guard.owner = new_owner;
        guard.runnable = true;
        self.cond.notify_all();
    }

    /// Clears the runnable flag so the next `park()` call actually blocks.
    pub fn clear_runnable(&self) {
        self.state.lock().unwrap().runnable = false;
    }
}

pub mod mmap;
pub mod uintr;
