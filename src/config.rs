//! Runtime configuration: the policy choice and the SQ / SQ-LCBE options of
//! spec §6, plus the stack and allocator sizing knobs of spec §4.1.
//!
//! Grounded in `original_source/include/skyloft/sched/policy/{sq,sq_lcbe}.h`
//! for the option names and defaults.

use std::time::Duration;

use crate::error::{Result, SkyloftError};
use crate::task::EntryFn;

/// Default stack size for a task, per spec §3 ("~256 KiB").
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// Default per-CPU magazine size for the task/stack allocator (spec §4.1).
pub const DEFAULT_MAGAZINE_SIZE: usize = 8;

/// Default host-timer preemption tick. The source's `utimer` ticks at
/// `TIMER_HZ` (1 MHz, `original_source/microbench/utimer_recv.c`) via a
/// dedicated kernel timer; a userspace polling thread at that rate would
/// burn a whole CPU on ticking alone, so this crate defaults two orders of
/// magnitude slower and treats the constant as a tunable, not a promise of
/// source parity (spec §4.5's "host timer" backend).
pub const DEFAULT_PREEMPT_TICK: Duration = Duration::from_micros(100);

/// Which scheduling policy a worker pool runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Per-CPU FIFO ring with work-stealing (spec §4.4.1).
    FifoSteal,
    /// Per-CPU round-robin MPSC ring (spec §4.4.2).
    RoundRobin,
    /// Per-CPU CFS-style virtual-time tree (spec §4.4.3).
    Cfs,
    /// Per-CPU EEVDF tree (spec §4.4.4).
    Eevdf,
    /// Centralized single-queue c-FCFS (spec §4.4.5).
    SingleQueue,
    /// Single-queue with LC/BE co-execution (spec §4.4.6).
    SingleQueueLcBe,
}

/// Options recognized for the SQ and SQ-LCBE policies (spec §6).
#[derive(Debug, Clone, Copy)]
pub struct SqParams {
    /// Worker CPU count (excludes the dispatcher), must be `<= total - 1`.
    pub num_workers: u32,
    /// `0` disables time-based preemption.
    pub preemption_quantum: Duration,
    /// SQ-LCBE only: the floor of LC-owned CPUs.
    pub guaranteed_cpus: u32,
    /// SQ-LCBE only: how often the dispatcher re-evaluates congestion.
    pub adjust_quantum: Duration,
    /// SQ-LCBE only: active/elapsed ratio below which LC is "congested".
    pub congestion_thresh: f64,
}

impl Default for SqParams {
    fn default() -> Self {
        Self {
            num_workers: 1,
            preemption_quantum: Duration::from_micros(50),
            guaranteed_cpus: 0,
            adjust_quantum: Duration::from_micros(500),
            congestion_thresh: 0.9,
        }
    }
}

impl SqParams {
    pub fn validate(&self, total_cpus: u32) -> Result<()> {
        if self.num_workers == 0 || self.num_workers > total_cpus.saturating_sub(1) {
            return Err(SkyloftError::InvalidArgument(
                "num_workers must be in 1..total_cpus",
            ));
        }
        if self.guaranteed_cpus > self.num_workers {
            return Err(SkyloftError::InvalidArgument(
                "guaranteed_cpus cannot exceed num_workers",
            ));
        }
        if !(0.0..=1.0).contains(&self.congestion_thresh) {
            return Err(SkyloftError::InvalidArgument(
                "congestion_thresh must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Opaque, policy-specific parameters passed to `sched_set_params`.
#[derive(Debug, Clone, Copy)]
pub enum PolicyParams {
    Sq(SqParams),
    SqLcBe(SqParams),
    /// Policies without tunables accept `None` and ignore `set_params`.
    None,
}

/// Top-level runtime configuration consumed by `libos_start`.
#[derive(Debug, Clone)]
pub struct Config {
    pub policy: PolicyKind,
    pub cpus: Vec<u32>,
    pub stack_size: usize,
    pub magazine_size: usize,
    pub sq_params: SqParams,
    pub log_level: log::LevelFilter,
    /// How often the host-timer preemption backend re-evaluates whether the
    /// running task on each CPU should yield (spec §4.5). `None` disables
    /// timer-driven preemption entirely, leaving only cooperative yields.
    pub preempt_tick: Option<Duration>,
    /// The first task spawned on `cpus[0]` once bootstrap completes, mirroring
    /// `skyloft_init`'s `saved_app_main` (`original_source/libos/libos.c`):
    /// the caller hands the runtime its own entry point rather than racing
    /// it against `libos_start`'s CPU-0 worker thread, which never returns
    /// control to spawn anything itself.
    pub app_main: Option<(EntryFn, usize)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy: PolicyKind::FifoSteal,
            cpus: vec![0],
            stack_size: DEFAULT_STACK_SIZE,
            magazine_size: DEFAULT_MAGAZINE_SIZE,
            sq_params: SqParams::default(),
            log_level: log::LevelFilter::Info,
            preempt_tick: Some(DEFAULT_PREEMPT_TICK),
            app_main: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.cpus.is_empty() {
            return Err(SkyloftError::InvalidArgument("cpus must be non-empty"));
        }
        if self.stack_size < 4096 || !self.stack_size.is_power_of_two() {
            return Err(SkyloftError::InvalidArgument(
                "stack_size must be a power-of-two >= 4096",
            ));
        }
        if matches!(
            self.policy,
            PolicyKind::SingleQueue | PolicyKind::SingleQueueLcBe
        ) {
            self.sq_params.validate(self.cpus.len() as u32)?;
        }
        if matches!(self.preempt_tick, Some(d) if d.is_zero()) {
            return Err(SkyloftError::InvalidArgument(
                "preempt_tick must be None or a positive duration",
            ));
        }
        Ok(())
    }
}
