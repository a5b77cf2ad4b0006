//! Skyloft: a user-level, microsecond-scale task runtime meant to share a
//! pinned CPU pool between latency-critical and best-effort applications
//! without going through the OS scheduler for every context switch.
//!
//! Most callers only need [`runtime`]'s free functions — [`runtime::libos_start`]
//! to boot a worker pool under a chosen [`config::PolicyKind`], then
//! [`runtime::task_spawn`], [`runtime::task_yield`], [`runtime::sleep`], and
//! the primitives in [`synch`] from inside a running task.

pub mod app;
pub mod config;
pub mod error;
pub mod id;
pub mod logging;
pub mod platform;
pub mod preempt;
pub mod rcu;
pub mod runtime;
pub mod scheduler;
pub mod shim;
pub mod softirq;
pub mod synch;
pub mod task;
pub mod timer;

pub use config::{Config, PolicyKind, PolicyParams, SqParams};
pub use error::{Result, SkyloftError};
pub use id::{AppId, CoreId, TaskId};
pub use runtime::{
    cpu_handoff, current_app_id, current_cpu_id, current_task_id, libos_start, maybe_yield,
    nic_ring_push, rcu_free, register_app, sched_poll, sched_set_params, sleep, synchronize_rcu,
    task_exit, task_spawn, task_spawn_oncpu, task_yield, unregister_app, usleep,
    wait_for_cpu_ownership, wake_task,
};
